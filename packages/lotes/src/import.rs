//! Turns an "All Points" sheet into point records and merges them into the
//! store.
//!
//! Gating is strict at the dataset level (missing sheet or columns, empty
//! sheet, duplicate ids reject the whole import and leave the store
//! untouched) and lenient at the cell level (an unparseable number becomes
//! `0`, a missing text becomes `N/A`).
//!
//! Overlay imports shift every assigned cluster id by `M + 1000 * k`, where
//! `M` is the highest cluster id loaded before the import and `k` the
//! overlay number, so overlay lots never collide with existing ones as long
//! as a dataset holds fewer than 1000 lots. Ids are bounded by
//! [`MAX_CLUSTER_ID`]: larger source ids count as unassigned, and an overlay
//! that would be numbered past it is rejected.

use std::collections::HashSet;

use lotes_models::{
    ClusterId, DatasetId, ImportKind, ImportSummary, MAX_CLUSTER_ID, NOT_APPLICABLE,
    OVERLAY_CLUSTER_STRIDE, OVERLAY_ID_PREFIX, PRIMARY_DATASET, PointRecord, UNASSIGNED_CLUSTER,
    UNASSIGNED_LABEL, columns,
};
use lotes_workbook::{Row, Sheet, Workbook};

use crate::{DatasetRegistry, RecordStore};

/// Reasons a dataset is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// The workbook has no sheet with the expected name.
    #[error("Sheet \"{sheet}\" not found in workbook")]
    MissingSheet {
        /// Expected sheet name.
        sheet: String,
    },

    /// A required column is absent.
    #[error("Required column \"{column}\" not found")]
    MissingColumn {
        /// Accepted header names, joined with ` / `.
        column: String,
    },

    /// The sheet has a header but no rows.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Two points would share an id.
    #[error("Duplicate point id {id}")]
    DuplicatePointId {
        /// The repeated id (after overlay prefixing).
        id: String,
    },

    /// Offsetting the dataset's lots would number them past
    /// [`MAX_CLUSTER_ID`].
    #[error("Lot id {cluster} would exceed the largest supported lot id")]
    ClusterIdOutOfRange {
        /// The first adjusted id past the limit.
        cluster: ClusterId,
    },

    /// A primary dataset is already loaded; further datasets must be
    /// overlays.
    #[error("A primary dataset is already loaded; clear the session or import as overlay")]
    PrimaryAlreadyLoaded,
}

/// Columns without which a sheet is rejected.
const REQUIRED_COLUMNS: &[&[&str]] = &[columns::CLUSTER_ID, columns::LATITUDE, columns::LONGITUDE];

/// Imports the "All Points" sheet of a workbook.
///
/// # Errors
///
/// Returns [`ImportError::MissingSheet`] if the sheet is absent, otherwise
/// see [`merge_sheet`].
pub fn merge_workbook(
    store: &mut RecordStore,
    datasets: &mut DatasetRegistry,
    workbook: &Workbook,
    kind: ImportKind,
    filename: Option<&str>,
) -> Result<ImportSummary, ImportError> {
    let sheet = workbook
        .sheet(columns::ALL_POINTS_SHEET)
        .ok_or_else(|| ImportError::MissingSheet {
            sheet: columns::ALL_POINTS_SHEET.to_string(),
        })?;

    merge_sheet(store, datasets, sheet, kind, filename)
}

/// Validates a sheet, builds its point records and appends them to the
/// store, registering the dataset and reindexing.
///
/// # Errors
///
/// Returns [`ImportError`] when the dataset is rejected; the store and
/// registry are then unchanged.
pub fn merge_sheet(
    store: &mut RecordStore,
    datasets: &mut DatasetRegistry,
    sheet: &Sheet,
    kind: ImportKind,
    filename: Option<&str>,
) -> Result<ImportSummary, ImportError> {
    if kind == ImportKind::Primary && !store.is_empty() {
        return Err(ImportError::PrimaryAlreadyLoaded);
    }
    if sheet.is_empty() {
        return Err(ImportError::EmptyDataset);
    }
    check_required_columns(sheet)?;

    let dataset = match kind {
        ImportKind::Primary => PRIMARY_DATASET,
        ImportKind::Overlay => datasets.next_overlay(),
    };
    let cluster_offset = match kind {
        ImportKind::Primary => 0,
        ImportKind::Overlay => overlay_offset(store.max_cluster_id(), dataset)?,
    };

    let points = sheet
        .records()
        .iter()
        .enumerate()
        .map(|(index, row)| parse_row(row, index, dataset, cluster_offset))
        .collect::<Result<Vec<PointRecord>, ImportError>>()?;

    let mut seen: HashSet<&str> = store.points().iter().map(|p| p.id.as_str()).collect();
    for point in &points {
        if !seen.insert(point.id.as_str()) {
            return Err(ImportError::DuplicatePointId {
                id: point.id.clone(),
            });
        }
    }

    let filename = filename.map(ToString::to_string);
    match kind {
        ImportKind::Primary => datasets.register_primary(filename),
        ImportKind::Overlay => {
            datasets.register_overlay(filename);
        }
    }

    let imported = store.append(points);
    store.reindex();

    log::info!(
        "Imported {imported} points as {kind} dataset {dataset} (cluster offset {cluster_offset})"
    );

    Ok(ImportSummary {
        kind,
        dataset,
        imported,
        cluster_offset,
    })
}

fn check_required_columns(sheet: &Sheet) -> Result<(), ImportError> {
    for alternatives in REQUIRED_COLUMNS {
        if !alternatives.iter().any(|name| sheet.has_column(name)) {
            return Err(ImportError::MissingColumn {
                column: alternatives.join(" / "),
            });
        }
    }
    Ok(())
}

/// `M + 1000 * k`, or an error when that passes [`MAX_CLUSTER_ID`].
fn overlay_offset(
    existing_max: Option<ClusterId>,
    overlay: DatasetId,
) -> Result<ClusterId, ImportError> {
    let existing_max = existing_max.unwrap_or(UNASSIGNED_CLUSTER);
    let offset = OVERLAY_CLUSTER_STRIDE
        .saturating_mul(ClusterId::from(overlay))
        .saturating_add(existing_max);
    if offset > MAX_CLUSTER_ID {
        return Err(ImportError::ClusterIdOutOfRange { cluster: offset });
    }
    Ok(offset)
}

/// Builds one point record. Bad cells fall back to defaults; the only
/// failure is an offset cluster id past [`MAX_CLUSTER_ID`].
fn parse_row(
    row: &Row,
    index: usize,
    dataset: DatasetId,
    cluster_offset: ClusterId,
) -> Result<PointRecord, ImportError> {
    let source_id = field(row, columns::POINT_ID).map_or_else(|| index.to_string(), str::to_string);
    let id = if dataset == PRIMARY_DATASET {
        source_id
    } else {
        format!("{OVERLAY_ID_PREFIX}{dataset}_{source_id}")
    };

    let cluster = match source_cluster(row, &id) {
        Some(cluster) => cluster
            .checked_add(cluster_offset)
            .filter(|adjusted| *adjusted <= MAX_CLUSTER_ID)
            .ok_or(ImportError::ClusterIdOutOfRange {
                cluster: cluster.saturating_add(cluster_offset),
            })?,
        None => UNASSIGNED_CLUSTER,
    };
    let cluster_label = if cluster == UNASSIGNED_CLUSTER {
        UNASSIGNED_LABEL.to_string()
    } else {
        match field(row, columns::CLUSTER_LABEL) {
            Some(label) if label != UNASSIGNED_LABEL => label.to_string(),
            _ => format!("Cluster {cluster}"),
        }
    };

    Ok(PointRecord {
        lat: decimal(row, columns::LATITUDE, &id),
        lon: decimal(row, columns::LONGITUDE, &id),
        cluster,
        cluster_label,
        unidade_local: text(row, columns::UNIDADE_LOCAL),
        sge: integer(row, columns::SGE, &id),
        cod_pro: text(row, columns::COD_PRO),
        id_oae: text(row, columns::ID_OAE),
        largura: decimal(row, columns::LARGURA, &id),
        extensao: decimal(row, columns::EXTENSAO, &id),
        nota: integer(row, columns::NOTA, &id),
        custo: decimal(row, columns::CUSTO, &id),
        rodovia: text(row, columns::RODOVIA),
        km: text(row, columns::KM),
        municipio: text(row, columns::MUNICIPIO),
        status_geral: text(row, columns::STATUS_GERAL),
        status_detalhado: text(row, columns::STATUS_DETALHADO),
        dataset,
        id,
    })
}

/// The row's own cluster id, or `None` when the point is unassigned
/// (negative, missing, unparseable or out of range id).
fn source_cluster(row: &Row, point_id: &str) -> Option<ClusterId> {
    let value = field(row, columns::CLUSTER_ID)?;
    match parse_integer(value) {
        Some(cluster) if cluster > MAX_CLUSTER_ID => {
            log::warn!("Point {point_id}: cluster id {cluster} out of range, treating as unassigned");
            None
        }
        Some(cluster) if cluster >= 0 => Some(cluster),
        Some(UNASSIGNED_CLUSTER) => None,
        Some(cluster) => {
            log::warn!("Point {point_id}: negative cluster id {cluster}, treating as unassigned");
            None
        }
        None => {
            log::warn!("Point {point_id}: invalid cluster id {value:?}, treating as unassigned");
            None
        }
    }
}

/// First non-empty cell among the accepted column names.
fn field<'a>(row: &'a Row, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn text(row: &Row, names: &[&str]) -> String {
    field(row, names).map_or_else(|| NOT_APPLICABLE.to_string(), str::to_string)
}

fn decimal(row: &Row, names: &[&str], point_id: &str) -> f64 {
    let Some(value) = field(row, names) else {
        return 0.0;
    };
    parse_decimal(value).unwrap_or_else(|| {
        log::warn!("Point {point_id}: invalid {} {value:?}, using 0", names[0]);
        0.0
    })
}

fn integer(row: &Row, names: &[&str], point_id: &str) -> i64 {
    let Some(value) = field(row, names) else {
        return 0;
    };
    parse_integer(value).unwrap_or_else(|| {
        log::warn!("Point {point_id}: invalid {} {value:?}, using 0", names[0]);
        0
    })
}

/// Parses `1234.5`, and the comma-decimal form `1.234,5` used by
/// hand-edited sheets.
fn parse_decimal(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .or_else(|| {
            value
                .contains(',')
                .then(|| value.replace('.', "").replace(',', "."))
                .and_then(|v| v.parse().ok())
        })
        .filter(|v: &f64| v.is_finite())
}

/// Parses an integer, truncating decimal forms such as `3.0` or `7,5`.
/// Values outside the `i64` range are rejected, never saturated.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        parse_decimal(value)
            .map(f64::trunc)
            .filter(|v| v.abs() < i64::MAX as f64)
            .map(|v| v as i64)
    })
}
