use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DownbeatError, Result};
use crate::models::{validate_name, Show, Song, DEFAULT_BPM};

use super::store::RecordStore;

/// Record holding the whole library.
pub const SHOWS_KEY: &str = "downbeat_shows";
/// Flat song list written by releases that predate shows.
pub const LEGACY_SONGS_KEY: &str = "downbeat_songs";

const SEED_SHOW_NAME: &str = "My Show";
const SEED_SONG_NAME: &str = "My First Song";
const MIGRATED_SHOW_NAME: &str = "Default Show";
/// Name given to a stored show whose own name is blank.
const UNTITLED_SHOW_NAME: &str = "Untitled Show";

#[derive(Serialize)]
struct LibraryRecordRef<'a> {
    shows: &'a [Show],
}

/// Song as found on disk, before the tempo and name rules are applied.
#[derive(Deserialize)]
struct StoredSong {
    #[serde(default)]
    name: String,
    bpm: i64,
}

#[derive(Deserialize)]
struct StoredShow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    songs: Vec<StoredSong>,
}

/// Accept both the wrapped document this crate writes and a bare array of
/// shows, which is how older exports stored the library.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLibrary {
    Wrapped { shows: Vec<StoredShow> },
    Bare(Vec<StoredShow>),
}

impl From<StoredLibrary> for Vec<StoredShow> {
    fn from(stored: StoredLibrary) -> Self {
        match stored {
            StoredLibrary::Wrapped { shows } => shows,
            StoredLibrary::Bare(shows) => shows,
        }
    }
}

/// In-memory library plus its backing record. Every mutating call validates,
/// persists, and only then publishes the new state, so memory never runs ahead
/// of the last completed save.
pub struct ShowLibrary {
    store: RecordStore,
    shows: Vec<Show>,
}

impl ShowLibrary {
    /// Build a library over `store` and hydrate it immediately.
    pub fn open(store: RecordStore) -> Result<Self> {
        let mut library = Self {
            store,
            shows: Vec::new(),
        };
        library.load()?;
        Ok(library)
    }

    /// Re-read the library record. A corrupt record is logged and treated as
    /// absent; an absent record triggers the legacy migration and, failing
    /// that, a seeded starter show.
    pub fn load(&mut self) -> Result<()> {
        let stored = match self.store.get(SHOWS_KEY)? {
            Some(raw) => match parse_library(&raw) {
                Ok((shows, dropped)) => {
                    if dropped {
                        persist(&self.store, &shows)?;
                    }
                    Some(shows)
                }
                Err(err) => {
                    warn!(error = %err, "discarding corrupt show library");
                    None
                }
            },
            None => self.migrate_legacy()?,
        };

        match stored {
            Some(shows) => self.shows = shows,
            None => {
                self.shows = vec![seed_show()];
                info!("seeded library with starter show");
                self.save()?;
            }
        }

        debug!(shows = self.shows.len(), "library loaded");
        Ok(())
    }

    /// Persist the current library as one document.
    pub fn save(&self) -> Result<()> {
        persist(&self.store, &self.shows)
    }

    pub fn list(&self) -> &[Show] {
        &self.shows
    }

    pub fn get(&self, index: usize) -> Option<&Show> {
        self.shows.get(index)
    }

    pub fn len(&self) -> usize {
        self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }

    /// Song lookup that reports a stale index instead of panicking.
    pub fn song(&self, show_index: usize, song_index: usize) -> Result<&Song> {
        self.show(show_index)?
            .songs
            .get(song_index)
            .ok_or_else(|| missing_song(show_index, song_index))
    }

    /// Show lookup that reports a stale index instead of panicking.
    pub fn show(&self, index: usize) -> Result<&Show> {
        self.shows.get(index).ok_or_else(|| missing_show(index))
    }

    /// Append a show, returning its index.
    pub fn add(&mut self, show: Show) -> Result<usize> {
        let show = show.validated()?;
        self.commit(|shows| {
            shows.push(show);
            Ok(shows.len() - 1)
        })
    }

    /// Rename the show at `index`.
    pub fn update(&mut self, index: usize, name: &str) -> Result<()> {
        let name = Show::new(name)?.name;
        self.commit(|shows| {
            let show = shows.get_mut(index).ok_or_else(|| missing_show(index))?;
            show.name = name;
            Ok(())
        })
    }

    /// Delete the show at `index` together with its songs.
    pub fn remove(&mut self, index: usize) -> Result<Show> {
        self.commit(|shows| {
            if index >= shows.len() {
                return Err(missing_show(index));
            }
            Ok(shows.remove(index))
        })
    }

    /// Append a song to a show, returning the song's index.
    pub fn add_song(&mut self, show_index: usize, song: Song) -> Result<usize> {
        let song = Song::new(&song.name, i64::from(song.bpm))?;
        self.commit(|shows| {
            let show = shows
                .get_mut(show_index)
                .ok_or_else(|| missing_show(show_index))?;
            show.songs.push(song);
            Ok(show.songs.len() - 1)
        })
    }

    /// Replace the name and tempo of an existing song.
    pub fn update_song(&mut self, show_index: usize, song_index: usize, song: Song) -> Result<()> {
        let song = Song::new(&song.name, i64::from(song.bpm))?;
        self.commit(|shows| {
            let slot = song_slot(shows, show_index, song_index)?;
            *slot = song;
            Ok(())
        })
    }

    /// Store a new tempo on an existing song, keeping its name.
    pub fn set_song_bpm(&mut self, show_index: usize, song_index: usize, bpm: u16) -> Result<()> {
        let name = self.song(show_index, song_index)?.name.clone();
        self.update_song(show_index, song_index, Song { name, bpm })
    }

    /// Delete one song from a show.
    pub fn remove_song(&mut self, show_index: usize, song_index: usize) -> Result<Song> {
        self.commit(|shows| {
            let show = shows
                .get_mut(show_index)
                .ok_or_else(|| missing_show(show_index))?;
            if song_index >= show.songs.len() {
                return Err(missing_song(show_index, song_index));
            }
            Ok(show.songs.remove(song_index))
        })
    }

    /// Move a song from `from` to `to`, shifting the songs in between. The
    /// reorder and its save form one step.
    pub fn move_song(&mut self, show_index: usize, from: usize, to: usize) -> Result<()> {
        let show = self.show(show_index)?;
        if from >= show.songs.len() {
            return Err(missing_song(show_index, from));
        }
        if to >= show.songs.len() {
            return Err(missing_song(show_index, to));
        }
        if from == to {
            return Ok(());
        }

        self.commit(|shows| {
            let songs = &mut shows[show_index].songs;
            let song = songs.remove(from);
            songs.insert(to, song);
            Ok(())
        })
    }

    /// Apply `edit` to a staged copy, persist it, then swap it in.
    fn commit<T>(&mut self, edit: impl FnOnce(&mut Vec<Show>) -> Result<T>) -> Result<T> {
        let mut staged = self.shows.clone();
        let outcome = edit(&mut staged)?;
        persist(&self.store, &staged)?;
        self.shows = staged;
        Ok(outcome)
    }

    /// Fold a pre-show flat song list into a synthesized show. Returns `None`
    /// when there was nothing to migrate. Once the legacy key is gone a second
    /// run finds nothing, so the step is idempotent.
    fn migrate_legacy(&mut self) -> Result<Option<Vec<Show>>> {
        let Some(raw) = self.store.get(LEGACY_SONGS_KEY)? else {
            return Ok(None);
        };

        let stored: Vec<StoredSong> = match serde_json::from_str(&raw) {
            Ok(songs) => songs,
            Err(err) => {
                warn!(error = %err, "could not migrate legacy song list");
                return Ok(None);
            }
        };

        let (songs, _) = sanitize_songs(stored, MIGRATED_SHOW_NAME);
        if songs.is_empty() {
            self.store.remove(LEGACY_SONGS_KEY)?;
            return Ok(None);
        }

        let shows = vec![Show {
            name: MIGRATED_SHOW_NAME.to_string(),
            songs,
        }];
        let body = serde_json::to_string(&LibraryRecordRef { shows: &shows })?;
        self.store.put_and_remove(SHOWS_KEY, &body, LEGACY_SONGS_KEY)?;
        info!(
            songs = shows[0].songs.len(),
            "migrated legacy song list into a default show"
        );
        Ok(Some(shows))
    }
}

/// Parse the library record and apply the write-boundary rules to it. The flag
/// reports whether anything had to be dropped or renamed.
fn parse_library(raw: &str) -> Result<(Vec<Show>, bool)> {
    let stored: Vec<StoredShow> = serde_json::from_str::<StoredLibrary>(raw)
        .map(Vec::from)
        .map_err(|source| DownbeatError::StorageCorrupt {
            key: SHOWS_KEY.to_string(),
            source,
        })?;

    let mut changed = false;
    let shows = stored
        .into_iter()
        .map(|show| {
            let name = validate_name(&show.name, "Show name is missing").unwrap_or_else(|_| {
                warn!("stored show has no name; renaming it");
                UNTITLED_SHOW_NAME.to_string()
            });
            let (songs, dropped) = sanitize_songs(show.songs, &name);
            changed |= dropped || name != show.name;
            Show { name, songs }
        })
        .collect();
    Ok((shows, changed))
}

/// Keep the songs that pass [`Song::new`] and log the rest.
fn sanitize_songs(stored: Vec<StoredSong>, show: &str) -> (Vec<Song>, bool) {
    let total = stored.len();
    let songs: Vec<Song> = stored
        .into_iter()
        .filter_map(|song| match Song::new(&song.name, song.bpm) {
            Ok(song) => Some(song),
            Err(err) => {
                warn!(
                    show,
                    song = %song.name,
                    bpm = song.bpm,
                    error = %err,
                    "dropping invalid stored song"
                );
                None
            }
        })
        .collect();
    let dropped = songs.len() != total;
    (songs, dropped)
}

fn persist(store: &RecordStore, shows: &[Show]) -> Result<()> {
    let body = serde_json::to_string(&LibraryRecordRef { shows })?;
    store.put(SHOWS_KEY, &body)?;
    debug!(shows = shows.len(), "library saved");
    Ok(())
}

fn seed_show() -> Show {
    Show {
        name: SEED_SHOW_NAME.to_string(),
        songs: vec![Song {
            name: SEED_SONG_NAME.to_string(),
            bpm: DEFAULT_BPM,
        }],
    }
}

fn song_slot(shows: &mut [Show], show_index: usize, song_index: usize) -> Result<&mut Song> {
    shows
        .get_mut(show_index)
        .ok_or_else(|| missing_show(show_index))?
        .songs
        .get_mut(song_index)
        .ok_or_else(|| missing_song(show_index, song_index))
}

fn missing_show(index: usize) -> DownbeatError {
    DownbeatError::stale(format!("Show {} no longer exists.", index + 1))
}

fn missing_song(show_index: usize, song_index: usize) -> DownbeatError {
    DownbeatError::stale(format!(
        "Song {} of show {} no longer exists.",
        song_index + 1,
        show_index + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn empty_store() -> RecordStore {
        RecordStore::new(open_in_memory().unwrap())
    }

    fn song(name: &str, bpm: u16) -> Song {
        Song {
            name: name.into(),
            bpm,
        }
    }

    #[test]
    fn empty_storage_is_seeded_and_saved() {
        let store = empty_store();
        let library = ShowLibrary::open(store.clone()).unwrap();
        assert_eq!(library.list(), &[seed_show()]);
        assert!(store.get(SHOWS_KEY).unwrap().is_some());
    }

    #[test]
    fn corrupt_record_resets_to_seed() {
        let store = empty_store();
        store.put(SHOWS_KEY, "{not json").unwrap();
        let library = ShowLibrary::open(store).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.list()[0].name, "My Show");
        assert_eq!(library.list()[0].songs, vec![song("My First Song", 120)]);
    }

    #[test]
    fn bare_array_record_is_accepted() {
        let store = empty_store();
        store
            .put(SHOWS_KEY, r#"[{"name":"Set A","songs":[{"name":"Intro","bpm":100}]}]"#)
            .unwrap();
        let library = ShowLibrary::open(store).unwrap();
        assert_eq!(library.list()[0].songs[0], song("Intro", 100));
    }

    #[test]
    fn legacy_songs_migrate_once() {
        let store = empty_store();
        store
            .put(
                LEGACY_SONGS_KEY,
                r#"[{"name":"Intro","bpm":100},{"name":"Outro","bpm":140}]"#,
            )
            .unwrap();

        let mut library = ShowLibrary::open(store.clone()).unwrap();
        let first = library.list().to_vec();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "Default Show");
        assert_eq!(first[0].songs.len(), 2);
        assert_eq!(store.get(LEGACY_SONGS_KEY).unwrap(), None);

        library.load().unwrap();
        assert_eq!(library.list(), first.as_slice());
    }

    #[test]
    fn deleting_every_show_does_not_reseed() {
        let mut library = ShowLibrary::open(empty_store()).unwrap();
        library.remove(0).unwrap();
        library.load().unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn invalid_song_is_rejected_without_mutation() {
        let store = empty_store();
        let mut library = ShowLibrary::open(store.clone()).unwrap();
        let before = store.get(SHOWS_KEY).unwrap();

        let err = library.add_song(0, song("Too slow", 5)).unwrap_err();
        assert!(matches!(err, DownbeatError::Validation(_)));
        assert_eq!(library.list()[0].songs.len(), 1);
        assert_eq!(store.get(SHOWS_KEY).unwrap(), before);
    }

    #[test]
    fn move_song_reorders_and_persists() {
        let store = empty_store();
        let mut library = ShowLibrary::open(store.clone()).unwrap();
        library.add_song(0, song("Second", 90)).unwrap();
        library.add_song(0, song("Third", 95)).unwrap();

        library.move_song(0, 2, 0).unwrap();
        let names: Vec<_> = library.list()[0]
            .songs
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, ["Third", "My First Song", "Second"]);

        let reloaded = ShowLibrary::open(store).unwrap();
        assert_eq!(reloaded.list(), library.list());
    }

    #[test]
    fn stale_indices_are_reported() {
        let mut library = ShowLibrary::open(empty_store()).unwrap();
        assert!(matches!(
            library.remove_song(0, 5),
            Err(DownbeatError::StaleReference(_))
        ));
        assert!(matches!(
            library.move_song(3, 0, 1),
            Err(DownbeatError::StaleReference(_))
        ));
        assert!(matches!(
            library.update(9, "Nope"),
            Err(DownbeatError::StaleReference(_))
        ));
    }

    #[test]
    fn set_song_bpm_keeps_name() {
        let mut library = ShowLibrary::open(empty_store()).unwrap();
        library.set_song_bpm(0, 0, 95).unwrap();
        assert_eq!(library.song(0, 0).unwrap(), &song("My First Song", 95));
    }

    #[test]
    fn legacy_songs_out_of_range_are_dropped() {
        let store = empty_store();
        store
            .put(
                LEGACY_SONGS_KEY,
                r#"[{"name":"","bpm":5},{"name":"Fast","bpm":900},{"name":"Intro","bpm":100}]"#,
            )
            .unwrap();

        let library = ShowLibrary::open(store.clone()).unwrap();
        assert_eq!(library.list()[0].name, "Default Show");
        assert_eq!(library.list()[0].songs, vec![song("Intro", 100)]);
        assert_eq!(store.get(LEGACY_SONGS_KEY).unwrap(), None);
    }

    #[test]
    fn legacy_list_with_nothing_valid_seeds() {
        let store = empty_store();
        store
            .put(LEGACY_SONGS_KEY, r#"[{"name":"","bpm":5},{"name":"Fast","bpm":900}]"#)
            .unwrap();

        let library = ShowLibrary::open(store.clone()).unwrap();
        assert_eq!(library.list(), &[seed_show()]);
        assert_eq!(store.get(LEGACY_SONGS_KEY).unwrap(), None);
    }

    #[test]
    fn stored_record_is_cleaned_on_load() {
        let store = empty_store();
        store
            .put(
                SHOWS_KEY,
                r#"{"shows":[{"name":"  ","songs":[{"name":"Slow","bpm":3},{"name":"Ok","bpm":60}]}]}"#,
            )
            .unwrap();

        let library = ShowLibrary::open(store.clone()).unwrap();
        assert_eq!(library.list()[0].name, "Untitled Show");
        assert_eq!(library.list()[0].songs, vec![song("Ok", 60)]);

        let reloaded = ShowLibrary::open(store).unwrap();
        assert_eq!(reloaded.list(), library.list());
    }
}
