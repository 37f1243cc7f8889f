#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the lote editor.
//!
//! Exposes one editing session over a JSON API under `/api`: workbook
//! upload (primary or overlay), the map point list with styling, lot
//! statistics, point reassignment, lot merge/delete/recolour and the
//! workbook export.

pub mod config;
mod handlers;
pub mod interactive;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use lotes::{Session, SharedSession};

pub use config::{ConfigError, ServerConfig};

/// Shared application state.
pub struct AppState {
    /// The editing session; every handler locks it once.
    pub session: SharedSession,
    /// Directory receiving a copy of every export, if configured.
    pub export_dir: Option<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session, export_dir: Option<PathBuf>) -> Self {
        Self {
            session: SharedSession::new(session),
            export_dir,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/import", web::post().to(handlers::import))
            .route("/points", web::get().to(handlers::points))
            .route("/units", web::get().to(handlers::units))
            .route("/datasets", web::get().to(handlers::datasets))
            .route("/summary", web::get().to(handlers::summary))
            .route("/lots", web::get().to(handlers::lots))
            .route("/clear", web::post().to(handlers::clear))
            .route("/export", web::get().to(handlers::export))
            .route("/clusters/{id}", web::get().to(handlers::cluster))
            .route("/clusters/{id}", web::delete().to(handlers::delete_cluster))
            .route("/clusters/{id}/centroid", web::get().to(handlers::centroid))
            .route("/clusters/{id}/points", web::get().to(handlers::cluster_points))
            .route(
                "/clusters/{id}/merge-candidates",
                web::get().to(handlers::merge_candidates),
            )
            .route("/clusters/{id}/merge", web::post().to(handlers::merge))
            .route("/clusters/{id}/color", web::put().to(handlers::recolor))
            .route("/points/{id}/options", web::get().to(handlers::point_options))
            .route(
                "/points/{id}/preview/{cluster}",
                web::get().to(handlers::point_preview),
            )
            .route("/points/{id}/reassign", web::post().to(handlers::reassign)),
    );
}

/// Starts the lote editor API server.
///
/// This is a regular async function; the caller provides the runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig, session: Session) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(session, config.export_dir.clone()));
    let upload_limit = config.max_upload_bytes;

    if let Some(dir) = &config.export_dir {
        log::info!("Exports will also be written to {}", dir.display());
    }
    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(upload_limit))
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
