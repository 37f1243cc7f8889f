//! Read-side cluster statistics over a [`RecordStore`].
//!
//! This is the single source of truth for whether a cluster exists: a
//! cluster with no members yields `None`, which callers must keep distinct
//! from a cluster whose costs sum to zero.

use lotes_models::{
    Centroid, ClusterId, ClusterStats, NOT_APPLICABLE, PRIMARY_DATASET, SessionSummary,
    UNASSIGNED_CLUSTER, UNASSIGNED_LABEL,
};

use crate::RecordStore;

/// Statistics of a cluster, or `None` when it has no members.
///
/// The label and unit of a regular cluster are read from its first member
/// in store order. The unassigned pseudo-cluster always reports
/// [`UNASSIGNED_LABEL`] and [`NOT_APPLICABLE`], whichever units its points
/// belong to.
#[must_use]
pub fn cluster_stats(store: &RecordStore, cluster: ClusterId) -> Option<ClusterStats> {
    let members = store.filter_by_cluster(cluster);
    let first = members.first()?;

    let total_cost: f64 = members.iter().map(|p| p.custo).sum();
    #[allow(clippy::cast_precision_loss)]
    let average_cost = total_cost / members.len() as f64;

    let (label, unit) = if cluster == UNASSIGNED_CLUSTER {
        (UNASSIGNED_LABEL.to_string(), NOT_APPLICABLE.to_string())
    } else {
        (first.cluster_label.clone(), first.unidade_local.clone())
    };

    Some(ClusterStats {
        cluster,
        count: members.len(),
        total_cost,
        average_cost,
        label,
        unit,
    })
}

/// Whether the cluster currently has at least one member.
#[must_use]
pub fn cluster_exists(store: &RecordStore, cluster: ClusterId) -> bool {
    store.points().iter().any(|p| p.cluster == cluster)
}

/// Mean latitude and longitude of a cluster's members, or `None` when the
/// cluster is empty.
#[must_use]
pub fn centroid(store: &RecordStore, cluster: ClusterId) -> Option<Centroid> {
    let members = store.filter_by_cluster(cluster);
    if members.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let count = members.len() as f64;
    let lat = members.iter().map(|p| p.lat).sum::<f64>() / count;
    let lon = members.iter().map(|p| p.lon).sum::<f64>() / count;

    Some(Centroid { lat, lon })
}

/// Statistics of every cluster present, ordered by id.
#[must_use]
pub fn all_cluster_stats(store: &RecordStore) -> Vec<ClusterStats> {
    store
        .cluster_ids()
        .into_iter()
        .filter_map(|cluster| cluster_stats(store, cluster))
        .collect()
}

/// Session-wide counters.
#[must_use]
pub fn session_summary(store: &RecordStore) -> SessionSummary {
    let points = store.points();
    let primary_points = points
        .iter()
        .filter(|p| p.dataset == PRIMARY_DATASET)
        .count();

    SessionSummary {
        total_points: points.len(),
        primary_points,
        overlay_points: points.len() - primary_points,
        total_clusters: store.cluster_ids().len(),
        total_cost: points.iter().map(|p| p.custo).sum(),
    }
}
