//! Builds the edited workbook: every point with its current lot in
//! "All Points", one row per lot present in "Cluster Summary".
//!
//! Numbers are written with their shortest exact representation, so a
//! re-import reproduces the same values.

use chrono::{DateTime, Utc};
use lotes_models::{PointRecord, columns};
use lotes_workbook::{Sheet, Workbook, WorkbookFormat};

use crate::{DatasetRegistry, RecordStore, SessionError, aggregate};

/// Prefix of exported workbook file names.
pub const EXPORT_FILE_PREFIX: &str = "clusters_edited_";

const POINT_HEADERS: [&str; 19] = [
    columns::POINT_ID[0],
    columns::CLUSTER_ID[0],
    columns::CLUSTER_LABEL[0],
    columns::UNIDADE_LOCAL[0],
    columns::SGE[0],
    columns::COD_PRO[0],
    columns::ID_OAE[1],
    columns::LATITUDE[0],
    columns::LONGITUDE[0],
    columns::LARGURA[0],
    columns::EXTENSAO[1],
    columns::NOTA[0],
    columns::CUSTO[0],
    columns::RODOVIA[0],
    columns::KM[0],
    columns::MUNICIPIO[0],
    columns::STATUS_GERAL[0],
    columns::STATUS_DETALHADO[0],
    columns::DATASET,
];

const SUMMARY_HEADERS: [&str; 6] = [
    columns::CLUSTER_ID[0],
    columns::CLUSTER_LABEL[0],
    columns::UNIDADE_LOCAL[0],
    columns::NUMBER_OF_POINTS,
    columns::TOTAL_COST,
    columns::AVG_COST,
];

fn point_row(point: &PointRecord, datasets: &DatasetRegistry) -> Vec<String> {
    vec![
        point.id.clone(),
        point.cluster.to_string(),
        point.cluster_label.clone(),
        point.unidade_local.clone(),
        point.sge.to_string(),
        point.cod_pro.clone(),
        point.id_oae.clone(),
        point.lat.to_string(),
        point.lon.to_string(),
        point.largura.to_string(),
        point.extensao.to_string(),
        point.nota.to_string(),
        point.custo.to_string(),
        point.rodovia.clone(),
        point.km.clone(),
        point.municipio.clone(),
        point.status_geral.clone(),
        point.status_detalhado.clone(),
        datasets.label(point.dataset),
    ]
}

/// Builds the "All Points" and "Cluster Summary" sheets.
///
/// # Errors
///
/// * [`SessionError::NothingToExport`] if no point is loaded
pub fn export_workbook(
    store: &RecordStore,
    datasets: &DatasetRegistry,
) -> Result<Workbook, SessionError> {
    if store.is_empty() {
        return Err(SessionError::NothingToExport);
    }

    let mut points = Sheet::with_headers(columns::ALL_POINTS_SHEET, &POINT_HEADERS);
    for point in store.points() {
        points.push_row(point_row(point, datasets));
    }

    let mut summary = Sheet::with_headers(columns::CLUSTER_SUMMARY_SHEET, &SUMMARY_HEADERS);
    for stats in aggregate::all_cluster_stats(store) {
        summary.push_row(vec![
            stats.cluster.to_string(),
            stats.label,
            stats.unit,
            stats.count.to_string(),
            stats.total_cost.to_string(),
            stats.average_cost.to_string(),
        ]);
    }

    log::info!(
        "Exported {} points in {} lots",
        points.len(),
        summary.len()
    );

    let mut workbook = Workbook::new();
    workbook.add_sheet(points);
    workbook.add_sheet(summary);
    Ok(workbook)
}

/// Format exports are written in.
pub const EXPORT_FORMAT: WorkbookFormat = WorkbookFormat::Xlsx;

/// `clusters_edited_<YYYY-MM-DDTHH-MM-SS>.xlsx`
#[must_use]
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!(
        "{EXPORT_FILE_PREFIX}{}.{}",
        at.format("%Y-%m-%dT%H-%M-%S"),
        EXPORT_FORMAT.extension()
    )
}
