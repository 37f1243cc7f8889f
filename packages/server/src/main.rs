#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Lote editor server binary.
//!
//! ```text
//! lotes_server [--config lotes.toml] [--bind 0.0.0.0] [--port 8080]
//!              [--export-dir data/exports] [--load clusters.xlsx]
//! lotes_server --interactive
//! ```

use std::path::PathBuf;

use clap::Parser;
use lotes::{Session, Workbook, models::ImportKind};
use lotes_server::ServerConfig;

#[derive(Parser)]
#[command(name = "lotes_server", about = "Serve the lote editor API")]
struct Cli {
    /// TOML configuration file with a `[server]` table
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to bind (overrides config and `BIND_ADDR`)
    #[arg(long)]
    bind: Option<String>,
    /// Port to listen on (overrides config and `PORT`)
    #[arg(long)]
    port: Option<u16>,
    /// Directory receiving a copy of every export
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Workbook to load as the primary dataset at startup
    #[arg(long)]
    load: Option<PathBuf>,
    /// Prompt for settings before starting
    #[arg(long)]
    interactive: bool,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    }
    .with_env();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.export_dir {
        config.export_dir = Some(dir);
    }

    if cli.interactive {
        return Ok(lotes_server::interactive::run(config).await?);
    }

    let mut session = Session::new();
    if let Some(path) = &cli.load {
        let workbook = Workbook::read_path(path)?;
        let filename = path.file_name().and_then(|n| n.to_str());
        let summary = session.import_workbook(&workbook, ImportKind::Primary, filename)?;
        log::info!("Loaded {} points from {}", summary.imported, path.display());
    }

    Ok(lotes_server::run_server(config, session).await?)
}
