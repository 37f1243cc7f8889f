//! Interactive mode for the server.
//!
//! Prompts for the bind address, port and an optional workbook to load
//! before starting the server.

use std::path::PathBuf;

use dialoguer::{Confirm, Input};
use lotes::{Session, Workbook, models::ImportKind};

use crate::ServerConfig;

/// Runs the server in interactive mode, starting from `config` and asking
/// for each setting.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run(mut config: ServerConfig) -> std::io::Result<()> {
    println!("Lote Editor Server");
    println!();

    config.bind_addr = Input::new()
        .with_prompt("Bind address")
        .default(config.bind_addr.clone())
        .interact_text()
        .unwrap_or_else(|_| config.bind_addr.clone());

    config.port = Input::new()
        .with_prompt("Port")
        .default(config.port)
        .interact_text()
        .unwrap_or(config.port);

    let workbook_path: String = Input::new()
        .with_prompt("Workbook to load (empty for none)")
        .allow_empty(true)
        .interact_text()
        .unwrap_or_default();

    let mut session = Session::new();
    if !workbook_path.trim().is_empty() {
        let path = PathBuf::from(workbook_path.trim());
        let filename = path.file_name().and_then(|n| n.to_str());
        let loaded = Workbook::read_path(&path)
            .map_err(lotes::SessionError::from)
            .and_then(|workbook| session.import_workbook(&workbook, ImportKind::Primary, filename));
        match loaded {
            Ok(summary) => println!("Loaded {} points from {}", summary.imported, path.display()),
            Err(e) => println!("Could not load {}: {e}", path.display()),
        }
    }

    if !Confirm::new()
        .with_prompt(format!(
            "Start server on {}:{}?",
            config.bind_addr, config.port
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server(config, session).await
}
