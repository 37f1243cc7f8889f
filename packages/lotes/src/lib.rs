#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory lot editing session.
//!
//! Holds the imported OAE point records and keeps point membership, cached
//! cluster labels and the per-unit cluster index consistent across every
//! edit:
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Point collection, unit→cluster index, dataset registry |
//! | [`aggregate`] | Cluster statistics, centroids, session counters |
//! | [`import`] | Sheet rows → point records, overlay id offsetting |
//! | [`mutation`] | Reassign, merge and delete |
//! | [`panel`] | Lots panel, reassignment options, merge candidates |
//! | [`style`] | Cluster/unit colours and dataset marker shapes |
//! | [`export`] | "All Points" / "Cluster Summary" workbook |
//! | [`session`] | The owned session and its mutex-guarded handle |
//!
//! The store is only written by [`import`] and [`mutation`]; both rebuild
//! the unit index before returning.

pub mod aggregate;
pub mod export;
pub mod import;
pub mod mutation;
pub mod panel;
pub mod session;
pub mod store;
pub mod style;

#[cfg(test)]
pub(crate) mod testing;

pub use import::ImportError;
pub use lotes_models as models;
pub use lotes_workbook::{Sheet, Workbook, WorkbookError, WorkbookFormat};
pub use session::{Session, SharedSession};
pub use store::{DatasetRegistry, RecordStore};

use lotes_models::{ClusterId, ParseTargetError};

/// Errors returned by session operations. None of them leave the session
/// partially modified.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No point with this id is loaded.
    #[error("Point not found: {id}")]
    PointNotFound {
        /// Requested point id.
        id: String,
    },

    /// The cluster has no members.
    #[error("Lot {cluster} not found")]
    ClusterNotFound {
        /// Requested cluster id.
        cluster: ClusterId,
    },

    /// The selected target could not be interpreted.
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] ParseTargetError),

    /// A lot id above [`models::MAX_CLUSTER_ID`].
    #[error("Lot id {cluster} is out of range")]
    ClusterIdOutOfRange {
        /// The rejected id.
        cluster: ClusterId,
    },

    /// Every lot id up to [`models::MAX_CLUSTER_ID`] has been handed out.
    #[error("No lot ids left for a new lot")]
    ClusterIdsExhausted,

    /// Source and target of a merge are the same lot.
    #[error("Cannot merge lot {cluster} into itself")]
    MergeIntoSelf {
        /// The lot given as both source and target.
        cluster: ClusterId,
    },

    /// A colour that is not `#rrggbb`.
    #[error("Invalid colour {value:?}: expected #rrggbb")]
    InvalidColor {
        /// The rejected value.
        value: String,
    },

    /// The unassigned pseudo-cluster always uses the neutral colour.
    #[error("The unassigned lot cannot be recoloured")]
    UnassignedColor,

    /// Export requested on an empty session.
    #[error("No data to export")]
    NothingToExport,

    /// The dataset was rejected as a whole.
    #[error("Import rejected: {0}")]
    Import(#[from] ImportError),

    /// Workbook encoding or decoding failed.
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

impl SessionError {
    /// Whether the error refers to a point or lot that does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PointNotFound { .. } | Self::ClusterNotFound { .. }
        )
    }
}
