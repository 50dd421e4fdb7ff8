//! Domain models shared by persistence, the transfer codec, playback, and the
//! TUI. They stay light-weight data holders; the write-boundary checks live
//! here so every path that stores a song or show applies the same rules.

use serde::{Deserialize, Serialize};

use crate::error::{DownbeatError, Result};

/// Slowest tempo a song may be stored with.
pub const MIN_BPM: u16 = 20;
/// Fastest tempo a song may be stored with.
pub const MAX_BPM: u16 = 300;
/// Tempo pre-filled for new songs.
pub const DEFAULT_BPM: u16 = 120;

/// A named tempo belonging to exactly one show. Its identity is its position
/// in the owning show's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    pub bpm: u16,
}

impl Song {
    /// Build a song after trimming the name and checking the tempo range.
    /// Out-of-range tempos are rejected rather than clamped so the user sees
    /// why the edit did not stick.
    pub fn new(name: &str, bpm: i64) -> Result<Self> {
        let name = validate_name(name, "Please enter a song name")?;
        let bpm = validate_bpm(bpm)?;
        Ok(Self { name, bpm })
    }
}

/// A named, ordered setlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub name: String,
    #[serde(default)]
    pub songs: Vec<Song>,
}

impl Show {
    /// Create an empty show with a validated name.
    pub fn new(name: &str) -> Result<Self> {
        let name = validate_name(name, "Please enter a show name")?;
        Ok(Self {
            name,
            songs: Vec::new(),
        })
    }

    /// Human-friendly song count, e.g. `1 song` or `3 songs`.
    pub fn song_count_label(&self) -> String {
        let count = self.songs.len();
        if count == 1 {
            "1 song".to_string()
        } else {
            format!("{count} songs")
        }
    }

    /// Check every field of an externally sourced show (imports) against the
    /// same rules the forms enforce.
    pub fn validated(self) -> Result<Self> {
        let name = validate_name(&self.name, "Show name is missing")?;
        let songs = self
            .songs
            .iter()
            .map(|song| Song::new(&song.name, i64::from(song.bpm)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name, songs })
    }
}

/// Trim a name and reject it when nothing is left.
pub fn validate_name(raw: &str, message: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(DownbeatError::validation(message))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Accept a tempo only when it lies within `[MIN_BPM, MAX_BPM]`.
pub fn validate_bpm(bpm: i64) -> Result<u16> {
    if bpm < i64::from(MIN_BPM) || bpm > i64::from(MAX_BPM) {
        Err(DownbeatError::validation(format!(
            "BPM must be between {MIN_BPM} and {MAX_BPM}"
        )))
    } else {
        Ok(bpm as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_rejects_out_of_range_tempo() {
        assert!(Song::new("Intro", 19).is_err());
        assert!(Song::new("Intro", 301).is_err());
        assert_eq!(Song::new("Intro", 20).unwrap().bpm, 20);
        assert_eq!(Song::new("Intro", 300).unwrap().bpm, 300);
    }

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(Song::new("  Outro ", 140).unwrap().name, "Outro");
        assert!(matches!(
            Show::new("   "),
            Err(DownbeatError::Validation(_))
        ));
    }

    #[test]
    fn song_count_label_pluralizes() {
        let mut show = Show::new("Set A").unwrap();
        assert_eq!(show.song_count_label(), "0 songs");
        show.songs.push(Song::new("Intro", 100).unwrap());
        assert_eq!(show.song_count_label(), "1 song");
    }

    #[test]
    fn validated_rejects_bad_imported_song() {
        let show = Show {
            name: "Set A".into(),
            songs: vec![Song {
                name: "Too fast".into(),
                bpm: 999,
            }],
        };
        assert!(show.validated().is_err());
    }
}
