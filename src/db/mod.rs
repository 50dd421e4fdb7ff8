//! Persistence module split across logical submodules.

mod connection;
mod library;
mod store;

pub use connection::{ensure_schema, open_in_memory};
pub use library::{ShowLibrary, LEGACY_SONGS_KEY, SHOWS_KEY};
pub use store::RecordStore;
