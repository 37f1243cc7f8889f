//! The editing session: store, dataset registry and lot palette behind one
//! owner, plus [`SharedSession`], the mutex-guarded handle used by
//! concurrent callers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use lotes_models::{
    Centroid, ClusterId, ClusterStats, ClusterTransfer, DatasetInfo, ImportKind, ImportSummary,
    LotEntry, MergeCandidate, PointRecord, PointStyle, ReassignOptions, ReassignPreview,
    ReassignTarget, Reassignment, SessionSummary,
};
use lotes_workbook::Workbook;

use crate::{
    DatasetRegistry, RecordStore, SessionError, aggregate, export, import, mutation, panel,
    style::{self, ClusterPalette},
};

/// One analyst's editing session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    store: RecordStore,
    datasets: DatasetRegistry,
    palette: ClusterPalette,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    #[must_use]
    pub const fn datasets(&self) -> &DatasetRegistry {
        &self.datasets
    }

    #[must_use]
    pub const fn palette(&self) -> &ClusterPalette {
        &self.palette
    }

    #[must_use]
    pub fn points(&self) -> &[PointRecord] {
        self.store.points()
    }

    /// Merges a workbook's "All Points" sheet into the session.
    ///
    /// # Errors
    ///
    /// * [`SessionError::Import`] if the dataset is rejected
    pub fn import_workbook(
        &mut self,
        workbook: &Workbook,
        kind: ImportKind,
        filename: Option<&str>,
    ) -> Result<ImportSummary, SessionError> {
        Ok(import::merge_workbook(
            &mut self.store,
            &mut self.datasets,
            workbook,
            kind,
            filename,
        )?)
    }

    /// # Errors
    ///
    /// See [`mutation::reassign`].
    pub fn reassign_point(
        &mut self,
        point_id: &str,
        target: &ReassignTarget,
    ) -> Result<Reassignment, SessionError> {
        mutation::reassign(&mut self.store, point_id, target)
    }

    /// # Errors
    ///
    /// See [`mutation::merge`].
    pub fn merge_clusters(
        &mut self,
        source: ClusterId,
        target: ClusterId,
    ) -> Result<ClusterTransfer, SessionError> {
        mutation::merge(&mut self.store, source, target)
    }

    /// # Errors
    ///
    /// See [`mutation::delete`].
    pub fn delete_cluster(&mut self, cluster: ClusterId) -> Result<ClusterTransfer, SessionError> {
        mutation::delete(&mut self.store, cluster)
    }

    /// # Errors
    ///
    /// See [`ClusterPalette::recolor`].
    pub fn recolor(&mut self, cluster: ClusterId, color: &str) -> Result<(), SessionError> {
        self.palette.recolor(cluster, color)
    }

    #[must_use]
    pub fn cluster_stats(&self, cluster: ClusterId) -> Option<ClusterStats> {
        aggregate::cluster_stats(&self.store, cluster)
    }

    /// # Errors
    ///
    /// * [`SessionError::ClusterNotFound`] if the lot has no members
    pub fn centroid(&self, cluster: ClusterId) -> Result<Centroid, SessionError> {
        aggregate::centroid(&self.store, cluster).ok_or(SessionError::ClusterNotFound { cluster })
    }

    /// Members of a lot.
    ///
    /// # Errors
    ///
    /// * [`SessionError::ClusterNotFound`] if the lot has no members
    pub fn cluster_points(&self, cluster: ClusterId) -> Result<Vec<PointRecord>, SessionError> {
        let members: Vec<PointRecord> = self
            .store
            .filter_by_cluster(cluster)
            .into_iter()
            .cloned()
            .collect();
        if members.is_empty() {
            return Err(SessionError::ClusterNotFound { cluster });
        }
        Ok(members)
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        aggregate::session_summary(&self.store)
    }

    #[must_use]
    pub fn lots(&self) -> Vec<LotEntry> {
        panel::lot_panel(&self.store, &self.palette)
    }

    /// # Errors
    ///
    /// See [`panel::reassign_options`].
    pub fn reassign_options(&self, point_id: &str) -> Result<ReassignOptions, SessionError> {
        panel::reassign_options(&self.store, point_id)
    }

    /// # Errors
    ///
    /// See [`panel::reassign_preview`].
    pub fn reassign_preview(
        &self,
        point_id: &str,
        cluster: ClusterId,
    ) -> Result<ReassignPreview, SessionError> {
        panel::reassign_preview(&self.store, point_id, cluster)
    }

    /// # Errors
    ///
    /// See [`panel::merge_candidates`].
    pub fn merge_candidates(&self, source: ClusterId) -> Result<Vec<MergeCandidate>, SessionError> {
        panel::merge_candidates(&self.store, source)
    }

    /// Unit name → lots present in the unit.
    #[must_use]
    pub fn units(&self) -> BTreeMap<String, Vec<ClusterId>> {
        self.store.unit_index().clone()
    }

    /// Unit name → legend colour.
    #[must_use]
    pub fn unit_colors(&self) -> BTreeMap<String, String> {
        style::unit_colors(&self.store)
    }

    #[must_use]
    pub fn dataset_infos(&self) -> Vec<DatasetInfo> {
        style::dataset_infos(&self.store, &self.datasets)
    }

    /// Every point with its rendering attributes, in store order.
    #[must_use]
    pub fn styled_points(&self) -> Vec<(PointRecord, PointStyle)> {
        let unit_colors = style::unit_colors(&self.store);
        self.store
            .points()
            .iter()
            .map(|point| {
                let point_style = style::point_style(point, &self.palette, &unit_colors);
                (point.clone(), point_style)
            })
            .collect()
    }

    /// The edited workbook and its timestamped file name.
    ///
    /// # Errors
    ///
    /// * [`SessionError::NothingToExport`] if no point is loaded
    pub fn export(&self) -> Result<(String, Workbook), SessionError> {
        let workbook = export::export_workbook(&self.store, &self.datasets)?;
        Ok((export::export_filename(Utc::now()), workbook))
    }

    /// Drops every point, dataset and custom colour.
    pub fn clear(&mut self) {
        let points = self.store.len();
        self.store.clear();
        self.datasets.clear();
        self.palette.reset();
        log::info!("Session cleared ({points} points dropped)");
    }
}

/// Cloneable handle to a [`Session`] behind a single mutex. Every call
/// takes the lock once, so mutations never interleave and reads never
/// observe a half-applied mutation.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Runs `f` with shared access to the session.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        let session = self.inner.lock().expect("session mutex poisoned");
        f(&session)
    }

    /// Runs `f` with exclusive access to the session.
    ///
    /// # Panics
    ///
    /// Panics if the session mutex is poisoned.
    pub fn write<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut session = self.inner.lock().expect("session mutex poisoned");
        f(&mut session)
    }
}
