//! Point builders shared by the unit tests.

use lotes_models::{
    ClusterId, NOT_APPLICABLE, PRIMARY_DATASET, PointRecord, UNASSIGNED_CLUSTER,
    UNASSIGNED_LABEL, new_cluster_label,
};

use crate::RecordStore;

/// A primary-dataset point labelled `<unit>-C<cluster>`.
pub fn point(id: &str, cluster: ClusterId, unit: &str) -> PointRecord {
    PointRecord {
        id: id.to_string(),
        lat: 0.0,
        lon: 0.0,
        cluster,
        cluster_label: if cluster == UNASSIGNED_CLUSTER {
            UNASSIGNED_LABEL.to_string()
        } else {
            new_cluster_label(unit, cluster)
        },
        unidade_local: unit.to_string(),
        sge: 0,
        cod_pro: NOT_APPLICABLE.to_string(),
        id_oae: NOT_APPLICABLE.to_string(),
        largura: 0.0,
        extensao: 0.0,
        nota: 0,
        custo: 0.0,
        rodovia: NOT_APPLICABLE.to_string(),
        km: NOT_APPLICABLE.to_string(),
        municipio: NOT_APPLICABLE.to_string(),
        status_geral: NOT_APPLICABLE.to_string(),
        status_detalhado: NOT_APPLICABLE.to_string(),
        dataset: PRIMARY_DATASET,
    }
}

/// Like [`point`], with a position and a cost.
pub fn located_point(
    id: &str,
    cluster: ClusterId,
    unit: &str,
    (lat, lon): (f64, f64),
    custo: f64,
) -> PointRecord {
    PointRecord {
        lat,
        lon,
        custo,
        ..point(id, cluster, unit)
    }
}

/// A reindexed store holding `points`.
pub fn store_of(points: Vec<PointRecord>) -> RecordStore {
    let mut store = RecordStore::new();
    store.append(points);
    store.reindex();
    store
}

/// Asserts the invariants every write must preserve.
pub fn assert_consistent(store: &RecordStore) {
    assert!(store.index_is_consistent(), "unit index drifted from points");
    for p in store.points() {
        assert_eq!(
            p.cluster == UNASSIGNED_CLUSTER,
            p.cluster_label == UNASSIGNED_LABEL,
            "label out of sync for point {}",
            p.id
        );
    }
}
