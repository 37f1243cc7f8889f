#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the lote editor server.
//!
//! Domain results (cluster statistics, reassignment outcomes, panel rows)
//! are serialized straight from [`lotes_models`]; this crate only holds the
//! request bodies and the few envelopes specific to the HTTP surface.

use lotes_models::{ClusterId, ImportKind, PointRecord, PointStyle};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query parameters for the import endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportParams {
    /// Import as an overlay on top of the loaded data.
    pub overlay: Option<bool>,
    /// Name of the uploaded file, shown in the dataset legend.
    pub filename: Option<String>,
}

impl ImportParams {
    #[must_use]
    pub fn kind(&self) -> ImportKind {
        if self.overlay.unwrap_or(false) {
            ImportKind::Overlay
        } else {
            ImportKind::Primary
        }
    }
}

/// Body of `POST /api/points/{id}/reassign`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignBody {
    /// Dropdown value: `-1`, `NEW_<unit>` or a lot id.
    pub target: String,
}

/// Body of `POST /api/clusters/{id}/merge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeBody {
    /// Selected destination lot id.
    pub target: String,
}

/// Body of `PUT /api/clusters/{id}/color`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorBody {
    /// `#rrggbb`
    pub color: String,
}

/// Result of a recolour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiColor {
    pub cluster: ClusterId,
    pub color: String,
}

/// A point as drawn on the map: the record plus its colours and shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMarker {
    #[serde(flatten)]
    pub point: PointRecord,
    #[serde(flatten)]
    pub style: PointStyle,
}

impl From<(PointRecord, PointStyle)> for ApiMarker {
    fn from((point, style): (PointRecord, PointStyle)) -> Self {
        Self { point, style }
    }
}

/// Units and the lots present in each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUnit {
    pub unit: String,
    pub clusters: Vec<ClusterId>,
    pub color: String,
}
