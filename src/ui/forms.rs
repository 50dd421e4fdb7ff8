use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::error::Result;
use crate::models::{validate_name, Show, Song, DEFAULT_BPM};

/// Longest BPM input accepted by the form; anything longer is out of range.
const MAX_BPM_DIGITS: usize = 3;

/// Single-field form used to add, rename, and import shows.
#[derive(Default, Clone)]
pub(crate) struct ShowForm {
    pub(crate) name: String,
    pub(crate) error: Option<String>,
}

impl ShowForm {
    /// Pre-fill the form, e.g. with the current name or an import proposal.
    pub(crate) fn with_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.name.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.name.pop();
    }

    /// Validate the name before it reaches the library.
    pub(crate) fn parse_inputs(&self) -> Result<String> {
        validate_name(&self.name, "Please enter a show name")
    }

    pub(crate) fn build_line(&self) -> Line<'static> {
        field_line("Name", &self.name, true, "<required>")
    }

    pub(crate) fn value_len(&self) -> usize {
        self.name.chars().count()
    }
}

/// Fields available within the song form.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum SongField {
    #[default]
    Name,
    Bpm,
}

/// Form state for song creation/editing.
#[derive(Clone)]
pub(crate) struct SongForm {
    pub(crate) name: String,
    pub(crate) bpm: String,
    pub(crate) active: SongField,
    pub(crate) error: Option<String>,
}

impl Default for SongForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            bpm: DEFAULT_BPM.to_string(),
            active: SongField::Name,
            error: None,
        }
    }
}

impl SongForm {
    /// Populate the form from an existing song when entering edit mode.
    pub(crate) fn from_song(song: &Song) -> Self {
        Self {
            name: song.name.clone(),
            bpm: song.bpm.to_string(),
            active: SongField::Name,
            error: None,
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SongField::Name => SongField::Bpm,
            SongField::Bpm => SongField::Name,
        };
    }

    /// Append a character to the active field. The BPM field only takes
    /// digits.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        match self.active {
            SongField::Name => {
                if ch.is_control() {
                    return false;
                }
                self.name.push(ch);
                true
            }
            SongField::Bpm => {
                if ch.is_ascii_digit() && self.bpm.len() < MAX_BPM_DIGITS {
                    self.bpm.push(ch);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SongField::Name => {
                self.name.pop();
            }
            SongField::Bpm => {
                self.bpm.pop();
            }
        }
    }

    /// Validate the inputs and build the song. A blank tempo falls back to the
    /// default; anything outside the allowed range is rejected.
    pub(crate) fn parse_inputs(&self) -> Result<Song> {
        let bpm = match self.bpm.trim() {
            "" => i64::from(DEFAULT_BPM),
            raw => raw.parse::<i64>().unwrap_or(i64::MAX),
        };
        Song::new(&self.name, bpm)
    }

    pub(crate) fn build_line(&self, field: SongField) -> Line<'static> {
        match field {
            SongField::Name => field_line(
                "Name",
                &self.name,
                self.active == SongField::Name,
                "<required>",
            ),
            SongField::Bpm => field_line(
                "BPM",
                &self.bpm,
                self.active == SongField::Bpm,
                "<20-300>",
            ),
        }
    }

    pub(crate) fn value_len(&self, field: SongField) -> usize {
        match field {
            SongField::Name => self.name.chars().count(),
            SongField::Bpm => self.bpm.chars().count(),
        }
    }
}

/// Render `label: value` with the focus and placeholder styling shared by
/// every form.
fn field_line(label: &str, value: &str, is_active: bool, placeholder: &str) -> Line<'static> {
    let display = if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(display, style),
    ])
}

/// State for confirming show deletion.
pub(crate) struct ConfirmShowDelete {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) song_count: usize,
}

impl ConfirmShowDelete {
    pub(crate) fn from(index: usize, show: &Show) -> Self {
        Self {
            index,
            name: show.name.clone(),
            song_count: show.songs.len(),
        }
    }
}

/// State for confirming song deletion.
pub(crate) struct ConfirmSongDelete {
    pub(crate) show_index: usize,
    pub(crate) song_index: usize,
    pub(crate) song: Song,
}

/// Share link ready to be copied.
pub(crate) struct SharePopup {
    pub(crate) show_name: String,
    pub(crate) link: String,
    /// Pre-rendered QR code, `None` when the link is too long for one.
    pub(crate) qr: Option<String>,
}

/// A decoded show waiting for the user to confirm the import and its name.
pub(crate) struct ImportPrompt {
    pub(crate) show: Show,
    pub(crate) form: ShowForm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_field_accepts_only_three_digits() {
        let mut form = SongForm::default();
        form.toggle_field();
        form.bpm.clear();
        assert!(!form.push_char('x'));
        for ch in "1234".chars() {
            form.push_char(ch);
        }
        assert_eq!(form.bpm, "123");
    }

    #[test]
    fn blank_bpm_uses_default_tempo() {
        let form = SongForm {
            name: "Intro".into(),
            bpm: String::new(),
            active: SongField::Bpm,
            error: None,
        };
        assert_eq!(form.parse_inputs().unwrap().bpm, DEFAULT_BPM);
    }

    #[test]
    fn out_of_range_bpm_is_rejected() {
        let form = SongForm {
            name: "Intro".into(),
            bpm: "999".into(),
            active: SongField::Bpm,
            error: None,
        };
        let err = form.parse_inputs().unwrap_err();
        assert_eq!(err.to_string(), "BPM must be between 20 and 300");
    }

    #[test]
    fn show_form_requires_a_name() {
        let form = ShowForm::with_name("   ");
        assert_eq!(
            form.parse_inputs().unwrap_err().to_string(),
            "Please enter a show name"
        );
    }
}
