//! Core library surface for the Downbeat conductor metronome.
//!
//! The binary only wires these pieces together; everything that touches the
//! library, share links, playback, or view restoration lives here so it can be
//! exercised without a terminal.
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod playback;
pub mod ui;
pub mod view_state;

/// Persistence entry points used by `main.rs` to open the store.
pub use db::{ensure_schema, open_in_memory, RecordStore, ShowLibrary};

pub use error::{DownbeatError, Result};

/// The two primary domain types that other layers manipulate.
pub use models::{Show, Song};

pub use codec::LaunchLink;
pub use playback::{PlaybackEngine, TransportState};
pub use view_state::{ViewState, ViewStateStore};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
