//! HTTP handler functions for the lote editor API.
//!
//! Every handler takes the session lock exactly once. Session errors map to
//! `404` when the point or lot does not exist and to `400` otherwise.

use actix_web::{HttpResponse, http::header, web};
use lotes::{SessionError, Workbook, export::EXPORT_FORMAT, models};
use lotes_server_models::{
    ApiColor, ApiError, ApiHealth, ApiMarker, ApiUnit, ColorBody, ImportParams, MergeBody,
    ReassignBody,
};
use models::{ClusterId, ReassignTarget, parse_cluster_selection};
use serde::Serialize;

use crate::AppState;

fn error_response(e: &SessionError) -> HttpResponse {
    let body = ApiError::new(e.to_string());
    if e.is_not_found() {
        log::debug!("Not found: {e}");
        HttpResponse::NotFound().json(body)
    } else {
        log::warn!("Rejected request: {e}");
        HttpResponse::BadRequest().json(body)
    }
}

fn respond<T: Serialize>(result: Result<T, SessionError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/import?overlay=&filename=`
///
/// The body is the workbook, `.xlsx` or zip-of-CSV. It is decoded before
/// the session is locked.
pub async fn import(
    state: web::Data<AppState>,
    params: web::Query<ImportParams>,
    body: web::Bytes,
) -> HttpResponse {
    let workbook = match Workbook::from_bytes(&body) {
        Ok(workbook) => workbook,
        Err(e) => return error_response(&SessionError::from(e)),
    };

    let kind = params.kind();
    let filename = params.filename.as_deref();
    respond(
        state
            .session
            .write(|session| session.import_workbook(&workbook, kind, filename)),
    )
}

/// `GET /api/points`
///
/// Every point with its lot colour, unit colour and dataset shape.
pub async fn points(state: web::Data<AppState>) -> HttpResponse {
    let markers: Vec<ApiMarker> = state.session.read(|session| {
        session
            .styled_points()
            .into_iter()
            .map(ApiMarker::from)
            .collect()
    });
    HttpResponse::Ok().json(markers)
}

/// `GET /api/units`
pub async fn units(state: web::Data<AppState>) -> HttpResponse {
    let units: Vec<ApiUnit> = state.session.read(|session| {
        let colors = session.unit_colors();
        session
            .units()
            .into_iter()
            .map(|(unit, clusters)| ApiUnit {
                color: colors.get(&unit).cloned().unwrap_or_default(),
                unit,
                clusters,
            })
            .collect()
    });
    HttpResponse::Ok().json(units)
}

/// `GET /api/datasets`
pub async fn datasets(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.read(lotes::Session::dataset_infos))
}

/// `GET /api/summary`
pub async fn summary(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.read(lotes::Session::summary))
}

/// `GET /api/lots`
pub async fn lots(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.read(lotes::Session::lots))
}

/// `GET /api/clusters/{id}`
pub async fn cluster(state: web::Data<AppState>, path: web::Path<ClusterId>) -> HttpResponse {
    let cluster = path.into_inner();
    respond(state.session.read(|session| {
        session
            .cluster_stats(cluster)
            .ok_or(SessionError::ClusterNotFound { cluster })
    }))
}

/// `GET /api/clusters/{id}/centroid`
pub async fn centroid(state: web::Data<AppState>, path: web::Path<ClusterId>) -> HttpResponse {
    let cluster = path.into_inner();
    respond(state.session.read(|session| session.centroid(cluster)))
}

/// `GET /api/clusters/{id}/points`
pub async fn cluster_points(
    state: web::Data<AppState>,
    path: web::Path<ClusterId>,
) -> HttpResponse {
    let cluster = path.into_inner();
    respond(state.session.read(|session| session.cluster_points(cluster)))
}

/// `GET /api/clusters/{id}/merge-candidates`
pub async fn merge_candidates(
    state: web::Data<AppState>,
    path: web::Path<ClusterId>,
) -> HttpResponse {
    let source = path.into_inner();
    respond(state.session.read(|session| session.merge_candidates(source)))
}

/// `GET /api/points/{id}/options`
pub async fn point_options(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    respond(state.session.read(|session| session.reassign_options(&path)))
}

/// `GET /api/points/{id}/preview/{cluster}`
pub async fn point_preview(
    state: web::Data<AppState>,
    path: web::Path<(String, ClusterId)>,
) -> HttpResponse {
    let (point_id, cluster) = path.into_inner();
    respond(
        state
            .session
            .read(|session| session.reassign_preview(&point_id, cluster)),
    )
}

/// `POST /api/points/{id}/reassign`
pub async fn reassign(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReassignBody>,
) -> HttpResponse {
    let target = match body.target.parse::<ReassignTarget>() {
        Ok(target) => target,
        Err(e) => return error_response(&SessionError::from(e)),
    };
    respond(
        state
            .session
            .write(|session| session.reassign_point(&path, &target)),
    )
}

/// `POST /api/clusters/{id}/merge`
pub async fn merge(
    state: web::Data<AppState>,
    path: web::Path<ClusterId>,
    body: web::Json<MergeBody>,
) -> HttpResponse {
    let source = path.into_inner();
    let target = match parse_cluster_selection(&body.target) {
        Ok(target) => target,
        Err(e) => return error_response(&SessionError::from(e)),
    };
    respond(
        state
            .session
            .write(|session| session.merge_clusters(source, target)),
    )
}

/// `DELETE /api/clusters/{id}`
pub async fn delete_cluster(
    state: web::Data<AppState>,
    path: web::Path<ClusterId>,
) -> HttpResponse {
    let cluster = path.into_inner();
    respond(state.session.write(|session| session.delete_cluster(cluster)))
}

/// `PUT /api/clusters/{id}/color`
pub async fn recolor(
    state: web::Data<AppState>,
    path: web::Path<ClusterId>,
    body: web::Json<ColorBody>,
) -> HttpResponse {
    let cluster = path.into_inner();
    respond(state.session.write(|session| -> Result<ApiColor, SessionError> {
        session.recolor(cluster, &body.color)?;
        Ok(ApiColor {
            cluster,
            color: session.palette().color_for(cluster).to_string(),
        })
    }))
}

/// `POST /api/clear`
///
/// Returns the (now empty) session summary.
pub async fn clear(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.write(|session| {
        session.clear();
        session.summary()
    }))
}

/// `GET /api/export`
///
/// Responds with the edited workbook as an attachment. When an export
/// directory is configured the workbook is also written there.
pub async fn export(state: web::Data<AppState>) -> HttpResponse {
    let (filename, workbook) = match state.session.read(lotes::Session::export) {
        Ok(export) => export,
        Err(e) => return error_response(&e),
    };

    let bytes = match workbook.to_bytes(EXPORT_FORMAT) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Failed to encode export: {e}");
            return HttpResponse::InternalServerError().json(ApiError::new("Failed to encode export"));
        }
    };

    if let Some(dir) = &state.export_dir {
        let path = dir.join(&filename);
        if let Err(e) = workbook.write_path(&path) {
            log::error!("Failed to write export {}: {e}", path.display());
            return HttpResponse::InternalServerError().json(ApiError::new("Failed to write export"));
        }
    }

    HttpResponse::Ok()
        .content_type(EXPORT_FORMAT.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(bytes)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use lotes::{Session, Sheet, WorkbookFormat};
    use models::{ClusterStats, ClusterTransfer, LotEntry, Reassignment, SessionSummary};

    use super::*;

    fn workbook_bytes(rows: &[[&str; 5]], format: WorkbookFormat) -> Vec<u8> {
        let mut sheet = Sheet::with_headers(
            "All Points",
            &["Point ID", "Cluster ID", "Unidade Local", "Latitude", "Longitude"],
        );
        for row in rows {
            sheet.push_row(row.iter().map(ToString::to_string).collect());
        }
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);
        workbook.to_bytes(format).unwrap()
    }

    fn base_workbook() -> Vec<u8> {
        workbook_bytes(
            &[
                ["p1", "0", "U", "-10", "-40"],
                ["p2", "0", "U", "-12", "-44"],
                ["p3", "1", "U", "-11", "-41"],
            ],
            WorkbookFormat::Xlsx,
        )
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(crate::configure),
            )
            .await
        };
    }

    fn loaded_state() -> AppState {
        let mut session = Session::new();
        session
            .import_workbook(
                &Workbook::from_bytes(&base_workbook()).unwrap(),
                models::ImportKind::Primary,
                Some("base.xlsx"),
            )
            .unwrap();
        AppState::new(session, None)
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = app!(AppState::new(Session::new(), None));
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let health: ApiHealth = test::call_and_read_body_json(&app, req).await;
        assert!(health.healthy);
    }

    #[actix_web::test]
    async fn import_then_list_lots() {
        let app = app!(AppState::new(Session::new(), None));

        let req = test::TestRequest::post()
            .uri("/api/import?filename=base.xlsx")
            .set_payload(base_workbook())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/lots").to_request();
        let lots: Vec<LotEntry> = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<ClusterId> = lots.iter().map(|l| l.cluster).collect();
        assert_eq!(ids, vec![0, 1, -1]);

        let req = test::TestRequest::post()
            .uri("/api/import?overlay=true")
            .set_payload(workbook_bytes(
                &[["x", "0", "V", "0", "0"]],
                WorkbookFormat::CsvArchive,
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/summary").to_request();
        let summary: SessionSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.total_points, 4);
        assert_eq!(summary.overlay_points, 1);

        let req = test::TestRequest::get().uri("/api/points").to_request();
        let markers: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(markers.len(), 4);
        assert_eq!(markers[3]["id"], "sobreposicao_1_x");
        assert_eq!(markers[3]["cluster"], 1001);
        assert_eq!(markers[3]["shape"], "square");
    }

    #[actix_web::test]
    async fn rejects_invalid_uploads() {
        let app = app!(loaded_state());

        let req = test::TestRequest::post()
            .uri("/api/import?overlay=true")
            .set_payload("not a workbook")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = test::read_body_json(resp).await;
        assert!(body.error.starts_with("Invalid workbook archive"));

        let req = test::TestRequest::post()
            .uri("/api/import?overlay=true")
            .set_payload(workbook_bytes(&[], WorkbookFormat::Xlsx))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "Import rejected: Dataset is empty");

        let req = test::TestRequest::get().uri("/api/summary").to_request();
        let summary: SessionSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.total_points, 3);
        assert_eq!(summary.overlay_points, 0);
    }

    #[actix_web::test]
    async fn reassign_and_merge_flow() {
        let app = app!(loaded_state());

        let req = test::TestRequest::post()
            .uri("/api/points/p3/reassign")
            .set_json(ReassignBody {
                target: "NEW_U".to_string(),
            })
            .to_request();
        let moved: Reassignment = test::call_and_read_body_json(&app, req).await;
        assert_eq!(moved.to, 2);
        assert_eq!(moved.label, "U-C2");

        let req = test::TestRequest::post()
            .uri("/api/clusters/2/merge")
            .set_json(MergeBody {
                target: "0".to_string(),
            })
            .to_request();
        let merged: ClusterTransfer = test::call_and_read_body_json(&app, req).await;
        assert_eq!(merged.moved, 1);

        let req = test::TestRequest::get().uri("/api/clusters/0").to_request();
        let stats: ClusterStats = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.count, 3);

        let req = test::TestRequest::get().uri("/api/clusters/2").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn validation_errors_are_bad_requests() {
        let app = app!(loaded_state());

        for (uri, target, status) in [
            ("/api/points/p1/reassign", "", StatusCode::BAD_REQUEST),
            ("/api/points/p1/reassign", "abc", StatusCode::BAD_REQUEST),
            ("/api/points/missing/reassign", "-1", StatusCode::NOT_FOUND),
            ("/api/clusters/0/merge", "0", StatusCode::BAD_REQUEST),
            ("/api/clusters/0/merge", "x", StatusCode::BAD_REQUEST),
            ("/api/clusters/7/merge", "0", StatusCode::NOT_FOUND),
        ] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(serde_json::json!({ "target": target }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status, "{uri} with {target:?}");
        }
    }

    #[actix_web::test]
    async fn delete_moves_points_to_unassigned() {
        let app = app!(loaded_state());

        let req = test::TestRequest::delete().uri("/api/clusters/0").to_request();
        let deleted: ClusterTransfer = test::call_and_read_body_json(&app, req).await;
        assert_eq!(deleted.moved, 2);
        assert_eq!(deleted.target, -1);

        let req = test::TestRequest::get()
            .uri("/api/clusters/-1/points")
            .to_request();
        let members: Vec<models::PointRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|p| p.cluster_label == "Sem Lote"));

        let req = test::TestRequest::get()
            .uri("/api/clusters/0/centroid")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn options_preview_and_candidates() {
        let app = app!(loaded_state());

        let req = test::TestRequest::get().uri("/api/points/p1/options").to_request();
        let options: models::ReassignOptions = test::call_and_read_body_json(&app, req).await;
        assert_eq!(options.groups.len(), 1);
        assert_eq!(options.groups[0].options.len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/points/p3/preview/0")
            .to_request();
        let preview: models::ReassignPreview = test::call_and_read_body_json(&app, req).await;
        assert_eq!((preview.count_before, preview.count_after), (2, 3));

        let req = test::TestRequest::get()
            .uri("/api/clusters/1/merge-candidates")
            .to_request();
        let candidates: Vec<models::MergeCandidate> =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cluster, 0);
    }

    #[actix_web::test]
    async fn recolor_validates_color() {
        let app = app!(loaded_state());

        let req = test::TestRequest::put()
            .uri("/api/clusters/1/color")
            .set_json(ColorBody {
                color: "#112233".to_string(),
            })
            .to_request();
        let color: ApiColor = test::call_and_read_body_json(&app, req).await;
        assert_eq!(color.color, "#112233");

        let req = test::TestRequest::put()
            .uri("/api/clusters/1/color")
            .set_json(ColorBody {
                color: "blue".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn out_of_range_lot_id_is_rejected_and_session_stays_usable() {
        let app = app!(loaded_state());

        let req = test::TestRequest::post()
            .uri("/api/points/p1/reassign")
            .set_json(ReassignBody {
                target: i64::MAX.to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/points/p2/reassign")
            .set_json(ReassignBody {
                target: "NEW_U".to_string(),
            })
            .to_request();
        let moved: Reassignment = test::call_and_read_body_json(&app, req).await;
        assert_eq!(moved.to, 2);
    }

    #[actix_web::test]
    async fn export_returns_attachment_and_writes_copy() {
        let dir = std::env::temp_dir().join("lotes_server_export_test");
        let _ = std::fs::remove_dir_all(&dir);
        let mut state = loaded_state();
        state.export_dir = Some(dir.clone());
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/export").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(disposition.contains("clusters_edited_"));
        assert!(disposition.ends_with(".xlsx\""));
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some(EXPORT_FORMAT.content_type())
        );

        let body = test::read_body(resp).await;
        let workbook = Workbook::from_bytes(&body).unwrap();
        assert_eq!(workbook.sheet("All Points").unwrap().len(), 3);
        assert!(workbook.sheet("Cluster Summary").is_some());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[actix_web::test]
    async fn clear_empties_session() {
        let app = app!(loaded_state());

        let req = test::TestRequest::post().uri("/api/clear").to_request();
        let summary: SessionSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.total_points, 0);

        let req = test::TestRequest::get().uri("/api/export").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
