//! Remembers which screen, show, and song the user was on so the next launch
//! resumes in the same place.
//!
//! Restoring a screen replays the same navigation calls that normally save the
//! view state, which would overwrite the record with half-applied states. The
//! store therefore runs a small phase machine, `Idle -> Restoring -> Idle`, and
//! ignores saves while restoring.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{RecordStore, ShowLibrary};
use crate::error::{DownbeatError, Result};

/// Record holding the last view.
pub const VIEW_STATE_KEY: &str = "downbeat_view_state";

/// Top-level screens that can be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewScreen {
    #[serde(rename = "shows")]
    Library,
    #[serde(rename = "songs")]
    Show,
    #[serde(rename = "playback")]
    Playback,
}

/// Persisted position. `song_index` tracks the playback pointer even on the
/// show screen so resuming playback lands on the same song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(rename = "view")]
    pub screen: ViewScreen,
    pub show_index: Option<usize>,
    #[serde(default)]
    pub song_index: usize,
}

impl ViewState {
    pub fn library() -> Self {
        Self {
            screen: ViewScreen::Library,
            show_index: None,
            song_index: 0,
        }
    }

    pub fn show(show_index: usize, song_index: usize) -> Self {
        Self {
            screen: ViewScreen::Show,
            show_index: Some(show_index),
            song_index,
        }
    }

    pub fn playback(show_index: usize, song_index: usize) -> Self {
        Self {
            screen: ViewScreen::Playback,
            show_index: Some(show_index),
            song_index,
        }
    }

    /// Check the referenced show/song still exist.
    fn validate(self, library: &ShowLibrary) -> Result<Self> {
        match (self.screen, self.show_index) {
            (ViewScreen::Library, _) => Ok(Self::library()),
            (ViewScreen::Show, Some(show)) => {
                library.show(show)?;
                Ok(self)
            }
            (ViewScreen::Playback, Some(show)) => {
                library.song(show, self.song_index)?;
                Ok(self)
            }
            (screen, None) => Err(DownbeatError::stale(format!(
                "{screen:?} view saved without a show"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestorePhase {
    Idle,
    Restoring,
}

pub struct ViewStateStore {
    store: RecordStore,
    phase: RestorePhase,
}

impl ViewStateStore {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            phase: RestorePhase::Idle,
        }
    }

    pub fn is_restoring(&self) -> bool {
        self.phase == RestorePhase::Restoring
    }

    /// Persist `state`. Returns false without writing while a restore is in
    /// progress.
    pub fn save(&self, state: &ViewState) -> Result<bool> {
        if self.is_restoring() {
            debug!(?state, "skipping view state save during restore");
            return Ok(false);
        }
        let body = serde_json::to_string(state)?;
        self.store.put(VIEW_STATE_KEY, &body)?;
        debug!(?state, "view state saved");
        Ok(true)
    }

    /// Read the raw record without validation.
    pub fn load(&self) -> Result<Option<ViewState>> {
        let Some(raw) = self.store.get(VIEW_STATE_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| DownbeatError::StorageCorrupt {
                key: VIEW_STATE_KEY.to_string(),
                source,
            })
    }

    /// Enter the restoring phase and return the state to apply. Missing,
    /// corrupt, or stale records fall back to the library screen; the failure
    /// is logged and never surfaced. Call [`finish_restore`] once every
    /// deferred step of applying the state has run.
    ///
    /// [`finish_restore`]: ViewStateStore::finish_restore
    pub fn begin_restore(&mut self, library: &ShowLibrary) -> ViewState {
        self.phase = RestorePhase::Restoring;

        let target = match self.load() {
            Ok(Some(state)) => state.validate(library),
            Ok(None) => Ok(ViewState::library()),
            Err(err) => Err(err),
        };

        match target {
            Ok(state) => {
                debug!(?state, "restoring view");
                state
            }
            Err(err) => {
                warn!(error = %err, "falling back to library screen");
                ViewState::library()
            }
        }
    }

    pub fn finish_restore(&mut self) {
        self.phase = RestorePhase::Idle;
    }
}
