#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point record, cluster and selection types for the lote editor.
//!
//! An OAE (an inspected structure such as a bridge) is represented by a
//! [`PointRecord`]. Clusters ("lotes") are not stored entities: a cluster
//! is the set of points sharing a [`ClusterId`]. The reserved id
//! [`UNASSIGNED_CLUSTER`] marks points excluded from the analysis, and
//! every such point carries [`UNASSIGNED_LABEL`] as its cluster label.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Cluster identifier. Negative values are never real clusters.
pub type ClusterId = i64;

/// Dataset provenance: `0` is the primary import, `k > 0` the k-th overlay.
pub type DatasetId = u32;

/// Provenance of the primary import.
pub const PRIMARY_DATASET: DatasetId = 0;

/// The "unassigned / excluded from analysis" pseudo-cluster.
pub const UNASSIGNED_CLUSTER: ClusterId = -1;

/// Display label of the unassigned pseudo-cluster.
pub const UNASSIGNED_LABEL: &str = "Sem Lote";

/// Placeholder for missing text fields and for the unit of the unassigned
/// pseudo-cluster.
pub const NOT_APPLICABLE: &str = "N/A";

/// Prefix prepended (together with the overlay number) to point ids of
/// overlay imports.
pub const OVERLAY_ID_PREFIX: &str = "sobreposicao_";

/// Distance between the cluster id ranges of consecutive overlays. A single
/// dataset is expected to hold fewer clusters than this.
pub const OVERLAY_CLUSTER_STRIDE: ClusterId = 1000;

/// Largest cluster id a session holds. Imported ids above it are treated
/// as unassigned, and new lots are never numbered past it.
pub const MAX_CLUSTER_ID: ClusterId = 2_147_483_647;

/// Value used by the UI to request a brand new lot in a unit
/// (`NEW_<unit>`).
pub const NEW_CLUSTER_PREFIX: &str = "NEW_";

/// Column names of the "All Points" and "Cluster Summary" sheets.
///
/// Slices list accepted alternatives in priority order; the first
/// non-empty cell wins.
pub mod columns {
    pub const ALL_POINTS_SHEET: &str = "All Points";
    pub const CLUSTER_SUMMARY_SHEET: &str = "Cluster Summary";

    pub const POINT_ID: &[&str] = &["Point ID"];
    pub const LATITUDE: &[&str] = &["Latitude", "LAT"];
    pub const LONGITUDE: &[&str] = &["Longitude", "LONG"];
    pub const CLUSTER_ID: &[&str] = &["Cluster ID"];
    pub const UNIDADE_LOCAL: &[&str] = &["Unidade Local"];
    pub const SGE: &[&str] = &["SGE", "Código (SGE)"];
    pub const COD_PRO: &[&str] = &["CodPro"];
    pub const ID_OAE: &[&str] = &["Identificação da OAE", "IdOAE"];
    pub const LARGURA: &[&str] = &["Largura"];
    pub const EXTENSAO: &[&str] = &["Extensão", "Extensao"];
    pub const NOTA: &[&str] = &["Nota Consolidada", "NOTA CONSOLIDADA"];
    pub const CUSTO: &[&str] = &["Custo Final (R$)", "Custo final"];
    pub const CLUSTER_LABEL: &[&str] = &["Cluster Label"];
    pub const RODOVIA: &[&str] = &["Rodovia"];
    pub const KM: &[&str] = &["km"];
    pub const MUNICIPIO: &[&str] = &["Município"];
    pub const STATUS_GERAL: &[&str] = &["Status Geral"];
    pub const STATUS_DETALHADO: &[&str] = &["Status Detalhado"];
    pub const DATASET: &str = "Dataset";

    pub const NUMBER_OF_POINTS: &str = "Number of Points";
    pub const TOTAL_COST: &str = "Total Cost (R$)";
    pub const AVG_COST: &str = "Avg Cost (R$)";
}

/// One inspected structure (OAE) and its current lot assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    /// Session-unique identifier. Overlay points are prefixed with
    /// [`OVERLAY_ID_PREFIX`] and the overlay number.
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Current cluster, or [`UNASSIGNED_CLUSTER`].
    pub cluster: ClusterId,
    /// Cached label of `cluster`; always [`UNASSIGNED_LABEL`] for
    /// unassigned points.
    pub cluster_label: String,
    /// Administrative unit ("Unidade Local").
    pub unidade_local: String,
    /// SGE code.
    pub sge: i64,
    pub cod_pro: String,
    /// "Identificação da OAE".
    pub id_oae: String,
    /// Width in metres.
    pub largura: f64,
    /// Length in metres.
    pub extensao: f64,
    /// Consolidated condition score.
    pub nota: i64,
    /// Final cost in R$.
    pub custo: f64,
    pub rodovia: String,
    pub km: String,
    pub municipio: String,
    pub status_geral: String,
    pub status_detalhado: String,
    /// Dataset provenance.
    pub dataset: DatasetId,
}

impl PointRecord {
    /// Whether the point is excluded from the analysis.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.cluster == UNASSIGNED_CLUSTER
    }

    /// Moves the point into `cluster`, replacing its cached label.
    ///
    /// Assigning [`UNASSIGNED_CLUSTER`] always uses [`UNASSIGNED_LABEL`],
    /// whatever `label` says.
    pub fn assign(&mut self, cluster: ClusterId, label: impl Into<String>) {
        self.cluster = cluster;
        self.cluster_label = if cluster == UNASSIGNED_CLUSTER {
            UNASSIGNED_LABEL.to_string()
        } else {
            label.into()
        };
    }

    /// Moves the point into the unassigned pseudo-cluster. The unit is kept.
    pub fn unassign(&mut self) {
        self.assign(UNASSIGNED_CLUSTER, UNASSIGNED_LABEL);
    }
}

/// Label synthesized for a lot created in (or falling back to) `unit`.
#[must_use]
pub fn new_cluster_label(unit: &str, cluster: ClusterId) -> String {
    format!("{unit}-C{cluster}")
}

/// Human-readable provenance of a dataset: its source filename when known,
/// otherwise `Principal` / `Sobreposto <k>`.
#[must_use]
pub fn dataset_label(dataset: DatasetId, filename: Option<&str>) -> String {
    match filename {
        Some(name) if !name.is_empty() => name.to_string(),
        _ if dataset == PRIMARY_DATASET => "Principal".to_string(),
        _ => format!("Sobreposto {dataset}"),
    }
}

/// Read-only snapshot of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub cluster: ClusterId,
    /// Number of member points (always at least one).
    pub count: usize,
    pub total_cost: f64,
    pub average_cost: f64,
    pub label: String,
    /// Unit of the first member, or [`NOT_APPLICABLE`] for the unassigned
    /// pseudo-cluster.
    pub unit: String,
}

/// Arithmetic mean position of a cluster's members.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

/// Whether an import is the session's primary dataset or an overlay.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportKind {
    #[default]
    Primary,
    Overlay,
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub kind: ImportKind,
    /// Provenance assigned to the imported points.
    pub dataset: DatasetId,
    /// Number of points appended.
    pub imported: usize,
    /// Offset added to every assigned source cluster id (`0` for primary).
    pub cluster_offset: ClusterId,
}

/// Result of a single-point reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reassignment {
    pub point_id: String,
    pub from: ClusterId,
    pub to: ClusterId,
    pub label: String,
    pub unit: String,
}

/// Result of a merge or delete: every point of `source` now sits in
/// `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTransfer {
    pub source: ClusterId,
    pub target: ClusterId,
    pub label: String,
    pub moved: usize,
}

/// Session-wide counters shown next to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_points: usize,
    pub primary_points: usize,
    pub overlay_points: usize,
    /// Distinct cluster ids present, the unassigned one included when it
    /// has members.
    pub total_clusters: usize,
    pub total_cost: f64,
}

/// Error returned when a UI selection cannot be turned into a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTargetError {
    /// Nothing was selected.
    NoSelection,
    /// The selection is neither a cluster id nor a new-lot request.
    NotNumeric(String),
    /// A new-lot request without a unit name.
    EmptyUnit,
}

impl std::fmt::Display for ParseTargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSelection => write!(f, "no target lot selected"),
            Self::NotNumeric(value) => write!(f, "invalid target lot {value:?}"),
            Self::EmptyUnit => write!(f, "new lot requested without a unit"),
        }
    }
}

impl std::error::Error for ParseTargetError {}

/// Parses a cluster selection (`"5"`, `"-1"`). Used for merge targets.
///
/// # Errors
///
/// Returns [`ParseTargetError::NoSelection`] for an empty selection and
/// [`ParseTargetError::NotNumeric`] for anything that is not an integer.
pub fn parse_cluster_selection(value: &str) -> Result<ClusterId, ParseTargetError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseTargetError::NoSelection);
    }
    value
        .parse()
        .map_err(|_| ParseTargetError::NotNumeric(value.to_string()))
}

/// Destination of a point reassignment.
///
/// The string form matches the values of the reassignment dropdown: `-1`,
/// `NEW_<unit>` or a cluster id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ReassignTarget {
    /// Exclude the point from the analysis.
    Unassigned,
    /// Create a new lot in the given unit and move the point there.
    NewInUnit(String),
    /// Move the point into an existing lot.
    Existing(ClusterId),
}

impl std::str::FromStr for ReassignTarget {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(unit) = s.strip_prefix(NEW_CLUSTER_PREFIX) {
            if unit.trim().is_empty() {
                return Err(ParseTargetError::EmptyUnit);
            }
            return Ok(Self::NewInUnit(unit.to_string()));
        }
        match parse_cluster_selection(s)? {
            UNASSIGNED_CLUSTER => Ok(Self::Unassigned),
            cluster => Ok(Self::Existing(cluster)),
        }
    }
}

impl std::fmt::Display for ReassignTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "{UNASSIGNED_CLUSTER}"),
            Self::NewInUnit(unit) => write!(f, "{NEW_CLUSTER_PREFIX}{unit}"),
            Self::Existing(cluster) => write!(f, "{cluster}"),
        }
    }
}

impl From<ReassignTarget> for String {
    fn from(target: ReassignTarget) -> Self {
        target.to_string()
    }
}

impl TryFrom<String> for ReassignTarget {
    type Error = ParseTargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One entry of the reassignment dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignOption {
    pub target: ReassignTarget,
    pub label: String,
}

/// Reassignment options of one unit: a new-lot entry followed by the
/// unit's existing lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignOptionGroup {
    pub unit: String,
    pub options: Vec<ReassignOption>,
}

/// Every destination offered for a selected point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignOptions {
    pub point_id: String,
    pub current: ClusterId,
    pub unassigned: ReassignOption,
    pub groups: Vec<ReassignOptionGroup>,
}

/// Effect of adding a point to a lot, shown before confirming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignPreview {
    pub cluster: ClusterId,
    pub label: String,
    pub unit: String,
    pub count_before: usize,
    pub count_after: usize,
    pub total_cost_before: f64,
    pub total_cost_after: f64,
}

/// A lot offered as merge destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCandidate {
    pub cluster: ClusterId,
    pub label: String,
}

/// One row of the lots panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotEntry {
    pub cluster: ClusterId,
    pub label: String,
    pub count: usize,
    pub total_cost: f64,
    pub color: String,
    pub unassigned: bool,
}

/// Marker outline used for a dataset on the map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarkerShape {
    Circle,
    Square,
    Triangle,
    Diamond,
    Pentagon,
    Hexagon,
    Star,
}

impl MarkerShape {
    /// Returns all variants of this enum, in dataset order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Circle,
            Self::Square,
            Self::Triangle,
            Self::Diamond,
            Self::Pentagon,
            Self::Hexagon,
            Self::Star,
        ]
    }

    /// Shape for a dataset; shapes cycle once every variant is used.
    #[must_use]
    pub const fn for_dataset(dataset: DatasetId) -> Self {
        let all = Self::all();
        all[dataset as usize % all.len()]
    }

    /// Name shown in the dataset legend.
    #[must_use]
    pub const fn legend_name(self) -> &'static str {
        match self {
            Self::Circle => "Círculo",
            Self::Square => "Quadrado",
            Self::Triangle => "Triângulo",
            Self::Diamond => "Diamante",
            Self::Pentagon => "Pentágono",
            Self::Hexagon => "Hexágono",
            Self::Star => "Estrela",
        }
    }
}

/// Rendering attributes of one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointStyle {
    pub cluster_color: String,
    pub unit_color: String,
    pub shape: MarkerShape,
}

/// A loaded dataset as shown in the legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub dataset: DatasetId,
    pub filename: Option<String>,
    pub label: String,
    pub shape: MarkerShape,
    pub points: usize,
}
