//! Point collection, derived unit→cluster index and dataset registry.
//!
//! The unit index is a materialised view of the points: writers call
//! [`RecordStore::reindex`] after every batch of changes and the index is
//! rebuilt from scratch. It is never patched in place.

use std::collections::{BTreeMap, BTreeSet};

use lotes_models::{
    ClusterId, DatasetId, MAX_CLUSTER_ID, PRIMARY_DATASET, PointRecord, UNASSIGNED_CLUSTER,
    dataset_label,
};

/// Unit name → sorted, deduplicated cluster ids present in that unit.
pub type UnitIndex = BTreeMap<String, Vec<ClusterId>>;

/// Builds the unit index from scratch.
#[must_use]
pub fn build_unit_index(points: &[PointRecord]) -> UnitIndex {
    let mut grouped: BTreeMap<&str, BTreeSet<ClusterId>> = BTreeMap::new();
    for point in points {
        grouped
            .entry(point.unidade_local.as_str())
            .or_default()
            .insert(point.cluster);
    }

    grouped
        .into_iter()
        .map(|(unit, clusters)| (unit.to_string(), clusters.into_iter().collect()))
        .collect()
}

/// Authoritative list of point records plus the unit index.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    points: Vec<PointRecord>,
    unit_index: UnitIndex,
    /// Highest cluster id ever present since the last clear.
    highest_observed: Option<ClusterId>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All points in import order.
    #[must_use]
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends records. The index is left stale until [`Self::reindex`].
    pub fn append(&mut self, points: impl IntoIterator<Item = PointRecord>) -> usize {
        let before = self.points.len();
        self.points.extend(points);
        self.observe_present_clusters();
        self.points.len() - before
    }

    /// Rebuilds the unit→cluster index from the current points.
    pub fn reindex(&mut self) {
        self.unit_index = build_unit_index(&self.points);
        self.observe_present_clusters();
        log::debug!(
            "Reindexed {} points across {} units",
            self.points.len(),
            self.unit_index.len()
        );
    }

    fn observe_present_clusters(&mut self) {
        self.highest_observed = self.highest_observed.max(self.max_cluster_id());
    }

    #[must_use]
    pub const fn unit_index(&self) -> &UnitIndex {
        &self.unit_index
    }

    /// Cluster ids present in a unit, empty for unknown units.
    #[must_use]
    pub fn clusters_in_unit(&self, unit: &str) -> &[ClusterId] {
        self.unit_index
            .get(unit)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the held index equals a fresh rebuild.
    #[must_use]
    pub fn index_is_consistent(&self) -> bool {
        self.unit_index == build_unit_index(&self.points)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&PointRecord> {
        self.points.iter().find(|p| p.id == id)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    pub(crate) fn point_mut(&mut self, index: usize) -> &mut PointRecord {
        &mut self.points[index]
    }

    pub(crate) fn points_mut(&mut self) -> impl Iterator<Item = &mut PointRecord> {
        self.points.iter_mut()
    }

    /// Members of a cluster, in store order.
    #[must_use]
    pub fn filter_by_cluster(&self, cluster: ClusterId) -> Vec<&PointRecord> {
        self.points.iter().filter(|p| p.cluster == cluster).collect()
    }

    /// Sorted distinct cluster ids present among the points.
    #[must_use]
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.points
            .iter()
            .map(|p| p.cluster)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Highest cluster id currently present, if any point is loaded.
    #[must_use]
    pub fn max_cluster_id(&self) -> Option<ClusterId> {
        self.points.iter().map(|p| p.cluster).max()
    }

    /// Id for a brand new lot: one above every id present now or at any
    /// earlier point of the session. `None` once that would pass
    /// [`MAX_CLUSTER_ID`].
    #[must_use]
    pub fn next_cluster_id(&self) -> Option<ClusterId> {
        self.highest_observed
            .max(self.max_cluster_id())
            .map_or(UNASSIGNED_CLUSTER, |id| id.max(UNASSIGNED_CLUSTER))
            .checked_add(1)
            .filter(|id| *id <= MAX_CLUSTER_ID)
    }

    /// Drops every point and the index.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Dataset provenance → source filename, for display.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    filenames: BTreeMap<DatasetId, Option<String>>,
    overlays: DatasetId,
}

impl DatasetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the primary dataset's filename.
    pub fn register_primary(&mut self, filename: Option<String>) {
        self.filenames.insert(PRIMARY_DATASET, filename);
    }

    /// Number the next overlay import will receive.
    #[must_use]
    pub const fn next_overlay(&self) -> DatasetId {
        self.overlays + 1
    }

    /// Registers an overlay and returns its number.
    pub fn register_overlay(&mut self, filename: Option<String>) -> DatasetId {
        self.overlays += 1;
        self.filenames.insert(self.overlays, filename);
        self.overlays
    }

    #[must_use]
    pub const fn overlay_count(&self) -> DatasetId {
        self.overlays
    }

    #[must_use]
    pub fn filename(&self, dataset: DatasetId) -> Option<&str> {
        self.filenames.get(&dataset).and_then(Option::as_deref)
    }

    /// Human-readable provenance of a dataset.
    #[must_use]
    pub fn label(&self, dataset: DatasetId) -> String {
        dataset_label(dataset, self.filename(dataset))
    }

    /// Registered datasets in provenance order.
    pub fn datasets(&self) -> impl Iterator<Item = (DatasetId, Option<&str>)> {
        self.filenames
            .iter()
            .map(|(dataset, filename)| (*dataset, filename.as_deref()))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
