//! Read models behind the lots panel, the reassignment dropdown and the
//! merge dialog. All labels come from [`aggregate::cluster_stats`].

use lotes_models::{
    ClusterId, LotEntry, MergeCandidate, ReassignOption, ReassignOptionGroup,
    ReassignOptions, ReassignPreview, ReassignTarget, UNASSIGNED_CLUSTER, UNASSIGNED_LABEL,
};

use crate::{RecordStore, SessionError, aggregate, style::ClusterPalette};

/// Display label of a lot, falling back to `Lote <id>` when it has no
/// members.
fn lot_label(store: &RecordStore, cluster: ClusterId) -> String {
    aggregate::cluster_stats(store, cluster).map_or_else(
        || {
            if cluster == UNASSIGNED_CLUSTER {
                UNASSIGNED_LABEL.to_string()
            } else {
                format!("Lote {cluster}")
            }
        },
        |stats| stats.label,
    )
}

/// Every lot present, by ascending id, followed by the unassigned lot,
/// which is listed even when empty.
#[must_use]
pub fn lot_panel(store: &RecordStore, palette: &ClusterPalette) -> Vec<LotEntry> {
    store
        .cluster_ids()
        .into_iter()
        .filter(|cluster| *cluster != UNASSIGNED_CLUSTER)
        .chain(std::iter::once(UNASSIGNED_CLUSTER))
        .map(|cluster| {
            let (count, total_cost) = aggregate::cluster_stats(store, cluster)
                .map_or((0, 0.0), |stats| (stats.count, stats.total_cost));
            LotEntry {
                cluster,
                label: lot_label(store, cluster),
                count,
                total_cost,
                color: palette.color_for(cluster).to_string(),
                unassigned: cluster == UNASSIGNED_CLUSTER,
            }
        })
        .collect()
}

/// Destinations offered for a point: the unassigned lot, then per unit (in
/// name order) a new-lot entry and the unit's lots other than the point's
/// current one.
///
/// # Errors
///
/// * [`SessionError::PointNotFound`] if no point has this id
pub fn reassign_options(store: &RecordStore, point_id: &str) -> Result<ReassignOptions, SessionError> {
    let point = store
        .find_by_id(point_id)
        .ok_or_else(|| SessionError::PointNotFound {
            id: point_id.to_string(),
        })?;

    let groups = store
        .unit_index()
        .iter()
        .map(|(unit, clusters)| {
            let new_lot = ReassignOption {
                target: ReassignTarget::NewInUnit(unit.clone()),
                label: format!("Criar Novo Lote em {unit}"),
            };
            let existing = clusters
                .iter()
                .filter(|cluster| **cluster != point.cluster)
                .map(|cluster| ReassignOption {
                    target: if *cluster == UNASSIGNED_CLUSTER {
                        ReassignTarget::Unassigned
                    } else {
                        ReassignTarget::Existing(*cluster)
                    },
                    label: lot_label(store, *cluster),
                });

            ReassignOptionGroup {
                unit: unit.clone(),
                options: std::iter::once(new_lot).chain(existing).collect(),
            }
        })
        .collect();

    Ok(ReassignOptions {
        point_id: point.id.clone(),
        current: point.cluster,
        unassigned: ReassignOption {
            target: ReassignTarget::Unassigned,
            label: format!("{UNASSIGNED_LABEL} (Excluir da Análise)"),
        },
        groups,
    })
}

/// Count and total cost of `cluster` before and after the point joins it.
///
/// # Errors
///
/// * [`SessionError::PointNotFound`] if no point has this id
/// * [`SessionError::ClusterNotFound`] if the lot has no members
pub fn reassign_preview(
    store: &RecordStore,
    point_id: &str,
    cluster: ClusterId,
) -> Result<ReassignPreview, SessionError> {
    let point = store
        .find_by_id(point_id)
        .ok_or_else(|| SessionError::PointNotFound {
            id: point_id.to_string(),
        })?;
    let stats =
        aggregate::cluster_stats(store, cluster).ok_or(SessionError::ClusterNotFound { cluster })?;

    Ok(ReassignPreview {
        cluster,
        label: stats.label,
        unit: stats.unit,
        count_before: stats.count,
        count_after: stats.count + 1,
        total_cost_before: stats.total_cost,
        total_cost_after: stats.total_cost + point.custo,
    })
}

/// Lots a source lot can be merged into: every lot present except the
/// source and the unassigned lot.
///
/// # Errors
///
/// * [`SessionError::ClusterNotFound`] if the source has no members
pub fn merge_candidates(
    store: &RecordStore,
    source: ClusterId,
) -> Result<Vec<MergeCandidate>, SessionError> {
    if !aggregate::cluster_exists(store, source) {
        return Err(SessionError::ClusterNotFound { cluster: source });
    }

    Ok(store
        .cluster_ids()
        .into_iter()
        .filter(|cluster| *cluster != source && *cluster != UNASSIGNED_CLUSTER)
        .map(|cluster| MergeCandidate {
            cluster,
            label: lot_label(store, cluster),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{located_point, point, store_of};

    fn store() -> RecordStore {
        store_of(vec![
            located_point("p1", 2, "UL-B", (0.0, 0.0), 100.0),
            located_point("p2", 0, "UL-A", (0.0, 0.0), 40.0),
            located_point("p3", 0, "UL-A", (0.0, 0.0), 60.0),
            located_point("p4", 1, "UL-A", (0.0, 0.0), 5.0),
        ])
    }

    #[test]
    fn panel_lists_unassigned_last_even_when_empty() {
        let entries = lot_panel(&store(), &ClusterPalette::default());

        let ids: Vec<ClusterId> = entries.iter().map(|e| e.cluster).collect();
        assert_eq!(ids, vec![0, 1, 2, -1]);

        let last = entries.last().unwrap();
        assert!(last.unassigned);
        assert_eq!(last.count, 0);
        assert_eq!(last.label, UNASSIGNED_LABEL);
        assert_eq!(last.color, "#999999");

        assert_eq!(entries[0].count, 2);
        assert!((entries[0].total_cost - 100.0).abs() < f64::EPSILON);
        assert_eq!(entries[0].label, "UL-A-C0");
    }

    #[test]
    fn options_group_units_and_skip_current_lot() {
        let store = store();
        let options = reassign_options(&store, "p2").unwrap();

        assert_eq!(options.current, 0);
        assert_eq!(options.unassigned.target, ReassignTarget::Unassigned);

        let units: Vec<&str> = options.groups.iter().map(|g| g.unit.as_str()).collect();
        assert_eq!(units, ["UL-A", "UL-B"]);

        let ul_a: Vec<String> = options.groups[0]
            .options
            .iter()
            .map(|o| o.target.to_string())
            .collect();
        assert_eq!(ul_a, ["NEW_UL-A", "1"]);
        assert_eq!(options.groups[0].options[1].label, "UL-A-C1");
        assert_eq!(options.groups[1].options.len(), 2);
    }

    #[test]
    fn options_for_unknown_point_fail() {
        assert!(matches!(
            reassign_options(&store(), "missing"),
            Err(SessionError::PointNotFound { .. })
        ));
    }

    #[test]
    fn preview_adds_point_cost() {
        let preview = reassign_preview(&store(), "p1", 0).unwrap();
        assert_eq!(preview.count_before, 2);
        assert_eq!(preview.count_after, 3);
        assert!((preview.total_cost_before - 100.0).abs() < f64::EPSILON);
        assert!((preview.total_cost_after - 200.0).abs() < f64::EPSILON);
        assert_eq!(preview.unit, "UL-A");

        assert!(matches!(
            reassign_preview(&store(), "p1", 9),
            Err(SessionError::ClusterNotFound { cluster: 9 })
        ));
    }

    #[test]
    fn merge_candidates_exclude_source_and_unassigned() {
        let mut points = vec![point("u1", -1, "UL-A")];
        points.extend(store().points().iter().cloned());
        let store = store_of(points);

        let candidates = merge_candidates(&store, 1).unwrap();
        let ids: Vec<ClusterId> = candidates.iter().map(|c| c.cluster).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(candidates[1].label, "UL-B-C2");

        assert!(merge_candidates(&store, 5).is_err());
    }
}
