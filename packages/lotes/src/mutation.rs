//! Reassign, merge and delete.
//!
//! Every operation validates against the current store first and only then
//! writes, so an `Err` always leaves the store as it was. Successful
//! operations end with [`RecordStore::reindex`].

use lotes_models::{
    ClusterId, ClusterTransfer, MAX_CLUSTER_ID, ParseTargetError, ReassignTarget, Reassignment,
    UNASSIGNED_CLUSTER, UNASSIGNED_LABEL, new_cluster_label,
};

use crate::{RecordStore, SessionError, aggregate};

/// Moves one point to `target`.
///
/// * [`ReassignTarget::Unassigned`] (or `Existing(-1)`) excludes the point;
///   its unit is kept.
/// * [`ReassignTarget::NewInUnit`] creates the lot
///   [`RecordStore::next_cluster_id`] labelled `<unit>-C<id>` and moves the
///   point into `unit`.
/// * [`ReassignTarget::Existing`] copies the label of another member of the
///   lot, or synthesizes `<point unit>-C<id>` when the point would be its
///   only member. The unit is kept even when it differs from the lot's.
///
/// # Errors
///
/// * [`SessionError::PointNotFound`] if no point has this id
/// * [`SessionError::InvalidTarget`] for a new lot without a unit
/// * [`SessionError::ClusterNotFound`] for a negative id other than `-1`
/// * [`SessionError::ClusterIdOutOfRange`] for an id above
///   [`MAX_CLUSTER_ID`]
/// * [`SessionError::ClusterIdsExhausted`] when no new lot id is left
pub fn reassign(
    store: &mut RecordStore,
    point_id: &str,
    target: &ReassignTarget,
) -> Result<Reassignment, SessionError> {
    let index = store
        .position(point_id)
        .ok_or_else(|| SessionError::PointNotFound {
            id: point_id.to_string(),
        })?;
    let point = &store.points()[index];
    let from = point.cluster;

    let (to, label, unit) = match target {
        ReassignTarget::Unassigned | ReassignTarget::Existing(UNASSIGNED_CLUSTER) => (
            UNASSIGNED_CLUSTER,
            UNASSIGNED_LABEL.to_string(),
            point.unidade_local.clone(),
        ),
        ReassignTarget::NewInUnit(unit) => {
            let unit = unit.trim();
            if unit.is_empty() {
                return Err(ParseTargetError::EmptyUnit.into());
            }
            let cluster = store
                .next_cluster_id()
                .ok_or(SessionError::ClusterIdsExhausted)?;
            (cluster, new_cluster_label(unit, cluster), unit.to_string())
        }
        ReassignTarget::Existing(cluster) if *cluster < UNASSIGNED_CLUSTER => {
            return Err(SessionError::ClusterNotFound { cluster: *cluster });
        }
        ReassignTarget::Existing(cluster) if *cluster > MAX_CLUSTER_ID => {
            return Err(SessionError::ClusterIdOutOfRange { cluster: *cluster });
        }
        ReassignTarget::Existing(cluster) => {
            let label = store
                .points()
                .iter()
                .find(|p| p.cluster == *cluster && p.id != point_id)
                .map_or_else(
                    || new_cluster_label(&point.unidade_local, *cluster),
                    |member| member.cluster_label.clone(),
                );
            (*cluster, label, point.unidade_local.clone())
        }
    };

    let point = store.point_mut(index);
    point.assign(to, label.clone());
    point.unidade_local.clone_from(&unit);
    store.reindex();

    log::info!("Reassigned point {point_id} from lot {from} to lot {to} ({label})");

    Ok(Reassignment {
        point_id: point_id.to_string(),
        from,
        to,
        label,
        unit,
    })
}

/// Moves every point of `source` into `target`, labelled with the target's
/// label as it was before the merge. Units are kept.
///
/// Merging into the unassigned lot is allowed and behaves like
/// [`delete`].
///
/// # Errors
///
/// * [`SessionError::MergeIntoSelf`] if `source == target`
/// * [`SessionError::ClusterNotFound`] if `source` has no members, or
///   `target` is a regular lot with no members
pub fn merge(
    store: &mut RecordStore,
    source: ClusterId,
    target: ClusterId,
) -> Result<ClusterTransfer, SessionError> {
    if source == target {
        return Err(SessionError::MergeIntoSelf { cluster: source });
    }
    if !aggregate::cluster_exists(store, source) {
        return Err(SessionError::ClusterNotFound { cluster: source });
    }
    let label = aggregate::cluster_stats(store, target)
        .map(|stats| stats.label)
        .or_else(|| (target == UNASSIGNED_CLUSTER).then(|| UNASSIGNED_LABEL.to_string()))
        .ok_or(SessionError::ClusterNotFound { cluster: target })?;

    let moved = move_members(store, source, target, &label);
    store.reindex();

    log::info!("Merged lot {source} into lot {target} ({label}): {moved} points moved");

    Ok(ClusterTransfer {
        source,
        target,
        label,
        moved,
    })
}

/// Moves every point of `cluster` to the unassigned lot. Equivalent to
/// `merge(cluster, -1)` in the resulting point distribution.
///
/// # Errors
///
/// * [`SessionError::ClusterNotFound`] if the lot has no members
pub fn delete(store: &mut RecordStore, cluster: ClusterId) -> Result<ClusterTransfer, SessionError> {
    if !aggregate::cluster_exists(store, cluster) {
        return Err(SessionError::ClusterNotFound { cluster });
    }

    let moved = move_members(store, cluster, UNASSIGNED_CLUSTER, UNASSIGNED_LABEL);
    store.reindex();

    log::info!("Deleted lot {cluster}: {moved} points unassigned");

    Ok(ClusterTransfer {
        source: cluster,
        target: UNASSIGNED_CLUSTER,
        label: UNASSIGNED_LABEL.to_string(),
        moved,
    })
}

fn move_members(store: &mut RecordStore, source: ClusterId, target: ClusterId, label: &str) -> usize {
    let mut moved = 0;
    for point in store.points_mut().filter(|p| p.cluster == source) {
        point.assign(target, label);
        moved += 1;
    }
    moved
}
