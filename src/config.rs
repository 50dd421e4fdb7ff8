//! Command-line and environment configuration.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".downbeat";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "downbeat.sqlite";
/// Log file written inside the data directory unless overridden.
const LOG_FILE_NAME: &str = "downbeat.log";
/// Passing this as the data directory keeps everything in memory.
pub const IN_MEMORY: &str = ":memory:";

/// Conductor metronome for the terminal.
#[derive(Debug, Parser)]
#[command(name = "downbeat", version, about)]
pub struct Args {
    /// Directory holding the library database and log file
    #[arg(long, env = "DOWNBEAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Share link (or bare `#import=` fragment) to import on startup
    #[arg(long, env = "DOWNBEAT_IMPORT")]
    pub import: Option<String>,

    /// Base address placed in front of `#import=` when sharing a show
    #[arg(long, env = "DOWNBEAT_SHARE_URL", default_value = "https://downbeat.app/")]
    pub share_url: String,

    /// Log file path (defaults to downbeat.log in the data directory)
    #[arg(long, env = "DOWNBEAT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Where persistent state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    File(PathBuf),
    InMemory,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: Storage,
    pub log_file: PathBuf,
    pub share_url: String,
    pub import: Option<String>,
}

impl Config {
    /// Resolve defaults that depend on the user's home directory.
    pub fn resolve(args: Args) -> Result<Self> {
        let data_dir = match args.data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };

        let storage = if data_dir == Path::new(IN_MEMORY) {
            Storage::InMemory
        } else {
            Storage::File(data_dir.join(DB_FILE_NAME))
        };

        let log_file = match args.log_file {
            Some(path) => path,
            None if storage == Storage::InMemory => std::env::temp_dir().join(LOG_FILE_NAME),
            None => data_dir.join(LOG_FILE_NAME),
        };

        Ok(Self {
            storage,
            log_file,
            share_url: args.share_url,
            import: args.import.filter(|link| !link.trim().is_empty()),
        })
    }
}

/// Resolve `~/.downbeat`.
fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_places_files_inside_it() {
        let args = Args::parse_from(["downbeat", "--data-dir", "/tmp/db-test"]);
        let config = Config::resolve(args).unwrap();
        assert_eq!(
            config.storage,
            Storage::File(PathBuf::from("/tmp/db-test/downbeat.sqlite"))
        );
        assert_eq!(config.log_file, PathBuf::from("/tmp/db-test/downbeat.log"));
        assert_eq!(config.share_url, "https://downbeat.app/");
    }

    #[test]
    fn memory_marker_selects_volatile_storage() {
        let args = Args::parse_from(["downbeat", "--data-dir", ":memory:", "--import", "  "]);
        let config = Config::resolve(args).unwrap();
        assert_eq!(config.storage, Storage::InMemory);
        assert_eq!(config.import, None);
    }
}
