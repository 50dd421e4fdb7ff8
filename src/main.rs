//! Binary entry point that glues the SQLite-backed library to the TUI.
use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use downbeat::config::{Args, Config, Storage};
use downbeat::{
    ensure_schema, open_in_memory, run_app, App, LaunchLink, RecordStore, ShowLibrary,
    ViewStateStore,
};

/// Initialize logging and persistence, load the library, and launch the
/// Ratatui event loop.
fn main() -> Result<()> {
    let config = Config::resolve(Args::parse())?;
    init_logging(&config.log_file)?;
    info!(storage = ?config.storage, "starting downbeat");

    let conn = match &config.storage {
        Storage::File(path) => ensure_schema(path)?,
        Storage::InMemory => open_in_memory()?,
    };
    let store = RecordStore::new(conn);
    let library = ShowLibrary::open(store.clone()).context("failed to load show library")?;
    let views = ViewStateStore::new(store);

    let mut app = App::new(
        library,
        views,
        LaunchLink::new(config.import),
        config.share_url,
    );
    run_app(&mut app)
}

/// The terminal runs in raw mode, so log lines go to a file instead.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("downbeat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
