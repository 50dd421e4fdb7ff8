use std::mem;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{info, warn};

use crate::codec::{share_link, unique_show_name, LaunchLink};
use crate::db::ShowLibrary;
use crate::models::Show;
use crate::playback::{ClockScheduler, PlaybackEngine, SystemClock, TransportState};
use crate::view_state::{ViewScreen, ViewState, ViewStateStore};

use super::forms::{
    ConfirmShowDelete, ConfirmSongDelete, ImportPrompt, SharePopup, ShowForm, SongField, SongForm,
};
use super::helpers::{
    beat_color, centered_rect, cursor_position, share_qr, surface_error, upcoming_label,
};
use super::screens::ShowScreen;

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Poll timeout while the metronome runs, roughly one frame at 60 Hz.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Poll timeout while nothing animates.
const IDLE_INTERVAL: Duration = Duration::from_millis(250);
/// Rows skipped by PageUp/PageDown.
const PAGE_SIZE: isize = 5;

/// Footer key hints per screen, as `(key, label)` pairs.
type Hints = &'static [(&'static str, &'static str)];

const LIBRARY_HINTS: Hints = &[
    ("[↑↓]", " Navigate   "),
    ("[Enter]", " Open   "),
    ("[+]", " Add   "),
    ("[e]", " Rename   "),
    ("[-]", " Delete   "),
    ("[x]", " Share   "),
    ("[q]", " Quit"),
];
const SHOW_HINTS: Hints = &[
    ("[↑↓]", " Navigate   "),
    ("[Enter]", " Play song   "),
    ("[p]", " Play show   "),
    ("[+]", " Add   "),
    ("[e]", " Edit   "),
    ("[-]", " Delete   "),
    ("[[ ]]", " Move   "),
    ("[r]", " Rename show   "),
    ("[x]", " Share   "),
    ("[Esc]", " Back"),
];
const PLAYBACK_HINTS: Hints = &[
    ("[Space]", " Start/Stop   "),
    ("[←→]", " Prev/Next   "),
    ("[↑↓]", " Tempo   "),
    ("[s]", " Save tempo   "),
    ("[Esc]", " Back"),
];
const SHARE_HINTS: Hints = &[("[c]", " Copy link   "), ("[any key]", " Close")];

type Engine = PlaybackEngine<ClockScheduler<SystemClock>>;

/// High-level navigation states. Screens only carry indices; shows and songs
/// are always read back from the library.
enum Screen {
    Library,
    Show(ShowScreen),
    Playback(ShowScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingShow(ShowForm),
    EditingShow {
        index: usize,
        form: ShowForm,
    },
    ConfirmShowDelete(ConfirmShowDelete),
    AddingSong {
        show_index: usize,
        form: SongForm,
    },
    EditingSong {
        show_index: usize,
        song_index: usize,
        form: SongForm,
    },
    ConfirmSongDelete(ConfirmSongDelete),
    Sharing(SharePopup),
    ConfirmImport(ImportPrompt),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    library: ShowLibrary,
    views: ViewStateStore,
    engine: Engine,
    launch: LaunchLink,
    share_url: String,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    /// Playback entry postponed until the first frame has been drawn.
    pending_playback: Option<(usize, usize)>,
}

impl App {
    pub fn new(
        library: ShowLibrary,
        views: ViewStateStore,
        launch: LaunchLink,
        share_url: String,
    ) -> Self {
        Self {
            library,
            views,
            engine: PlaybackEngine::new(ClockScheduler::new(SystemClock::new())),
            launch,
            share_url,
            selected: 0,
            screen: Screen::Library,
            mode: Mode::Normal,
            status: None,
            pending_playback: None,
        }
    }

    /// Resume the last view and offer any launch import. Playback is only
    /// re-entered from [`App::on_frame`] so the song list is on screen first.
    pub fn start(&mut self) {
        self.restore_view();
        self.check_launch_import();
    }

    fn restore_view(&mut self) {
        let target = self.views.begin_restore(&self.library);
        match (target.screen, target.show_index) {
            (ViewScreen::Show, Some(show_index)) => {
                self.open_show(show_index, target.song_index);
                self.views.finish_restore();
            }
            (ViewScreen::Playback, Some(show_index)) => {
                self.open_show(show_index, target.song_index);
                self.pending_playback = Some((show_index, target.song_index));
            }
            _ => {
                self.screen = Screen::Library;
                self.views.finish_restore();
            }
        }
    }

    fn check_launch_import(&mut self) {
        match self.launch.take_import() {
            None => {}
            Some(Ok(show)) => {
                let proposed = unique_show_name(self.library.list(), &show.name);
                info!(show = %show.name, songs = show.songs.len(), "import link decoded");
                self.mode = Mode::ConfirmImport(ImportPrompt {
                    form: ShowForm::with_name(&proposed),
                    show,
                });
            }
            Some(Err(err)) => {
                warn!(error = %err, "import link rejected");
                self.set_status(
                    "Failed to import show. The link may be invalid or corrupted.",
                    StatusKind::Error,
                );
            }
        }
    }

    /// Runs after every drawn frame.
    pub(crate) fn on_frame(&mut self) {
        if let Some((show_index, song_index)) = self.pending_playback.take() {
            if let Err(err) = self.enter_playback(show_index, song_index) {
                warn!(error = %err, "could not resume playback");
                self.set_status(surface_error(&err), StatusKind::Error);
            }
            self.views.finish_restore();
        }
    }

    /// How long the event loop may block before the next redraw.
    pub(crate) fn poll_interval(&self) -> Duration {
        if self.engine.state() == TransportState::Running {
            FRAME_INTERVAL
        } else {
            IDLE_INTERVAL
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mut mode = mem::replace(&mut self.mode, Mode::Normal);

        mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingShow(form) => self.handle_add_show(code, form)?,
            Mode::EditingShow { index, form } => self.handle_edit_show(code, index, form)?,
            Mode::ConfirmShowDelete(confirm) => self.handle_confirm_show_delete(code, confirm)?,
            Mode::AddingSong { show_index, form } => {
                self.handle_add_song(code, show_index, form)?
            }
            Mode::EditingSong {
                show_index,
                song_index,
                form,
            } => self.handle_edit_song(code, show_index, song_index, form)?,
            Mode::ConfirmSongDelete(confirm) => self.handle_confirm_song_delete(code, confirm)?,
            Mode::Sharing(popup) => self.handle_sharing(code, popup),
            Mode::ConfirmImport(prompt) => self.handle_confirm_import(code, prompt)?,
        };

        self.mode = mode;
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match self.screen {
            Screen::Library => self.handle_library_key(code, exit),
            Screen::Show(_) => self.handle_show_key(code, exit),
            Screen::Playback(_) => {
                self.handle_playback_key(code, exit);
                Ok(Mode::Normal)
            }
        }
    }

    fn handle_library_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                *exit = true;
            }
            KeyCode::Up => self.move_show_selection(-1),
            KeyCode::Down => self.move_show_selection(1),
            KeyCode::PageUp => self.move_show_selection(-PAGE_SIZE),
            KeyCode::PageDown => self.move_show_selection(PAGE_SIZE),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.library.len().saturating_sub(1),
            KeyCode::Enter => {
                if self.library.get(self.selected).is_some() {
                    self.clear_status();
                    self.open_show(self.selected, 0);
                } else {
                    self.set_status("No show selected.", StatusKind::Error);
                }
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingShow(ShowForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(show) = self.library.get(self.selected) {
                    let form = ShowForm::with_name(&show.name);
                    self.clear_status();
                    return Ok(Mode::EditingShow {
                        index: self.selected,
                        form,
                    });
                }
                self.set_status("No show selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') => {
                if let Some(show) = self.library.get(self.selected) {
                    let confirm = ConfirmShowDelete::from(self.selected, show);
                    self.clear_status();
                    return Ok(Mode::ConfirmShowDelete(confirm));
                }
                self.set_status("No show selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                return Ok(self.share_show(self.selected));
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_show_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let (show_index, selected) = match &self.screen {
            Screen::Show(screen) => (screen.show_index, screen.selected),
            _ => return Ok(Mode::Normal),
        };
        let song_count = self.song_count(show_index);

        match code {
            KeyCode::Char('q') => {
                *exit = true;
            }
            KeyCode::Esc => {
                self.clear_status();
                self.show_library();
            }
            KeyCode::Up => self.move_song_selection(-1, song_count),
            KeyCode::Down => self.move_song_selection(1, song_count),
            KeyCode::PageUp => self.move_song_selection(-PAGE_SIZE, song_count),
            KeyCode::PageDown => self.move_song_selection(PAGE_SIZE, song_count),
            KeyCode::Home => {
                if let Screen::Show(ref mut screen) = self.screen {
                    screen.select_first();
                }
            }
            KeyCode::End => {
                if let Screen::Show(ref mut screen) = self.screen {
                    screen.select_last(song_count);
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.play_from(show_index, selected),
            KeyCode::Char('p') | KeyCode::Char('P') => self.play_from(show_index, 0),
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingSong {
                    show_index,
                    form: SongForm::default(),
                });
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Ok(song) = self.library.song(show_index, selected) {
                    let form = SongForm::from_song(song);
                    self.clear_status();
                    return Ok(Mode::EditingSong {
                        show_index,
                        song_index: selected,
                        form,
                    });
                }
                self.set_status("No song selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') => {
                if let Ok(song) = self.library.song(show_index, selected) {
                    let confirm = ConfirmSongDelete {
                        show_index,
                        song_index: selected,
                        song: song.clone(),
                    };
                    self.clear_status();
                    return Ok(Mode::ConfirmSongDelete(confirm));
                }
                self.set_status("No song selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if let Some(show) = self.library.get(show_index) {
                    let form = ShowForm::with_name(&show.name);
                    self.clear_status();
                    return Ok(Mode::EditingShow {
                        index: show_index,
                        form,
                    });
                }
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                return Ok(self.share_show(show_index));
            }
            KeyCode::Char('[') => self.reorder_song(show_index, selected, -1),
            KeyCode::Char(']') => self.reorder_song(show_index, selected, 1),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_playback_key(&mut self, code: KeyCode, exit: &mut bool) {
        match code {
            KeyCode::Char('q') => {
                *exit = true;
            }
            KeyCode::Esc => {
                self.clear_status();
                self.exit_playback();
            }
            KeyCode::Char(' ') => self.engine.toggle(),
            KeyCode::Right | KeyCode::Char('n') => {
                let moved = self.engine.next(&self.library);
                self.after_navigation(moved, "Already at the last song.");
            }
            KeyCode::Left | KeyCode::Char('b') => {
                let moved = self.engine.previous(&self.library);
                self.after_navigation(moved, "Already at the first song.");
            }
            KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('=') => {
                self.engine.tempo_up();
            }
            KeyCode::Down | KeyCode::Char('-') => {
                self.engine.tempo_down();
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                match self.engine.commit_tempo(&mut self.library) {
                    Ok(bpm) => self.set_status(format!("Saved {bpm} BPM."), StatusKind::Info),
                    Err(err) => self.set_status(err.to_string(), StatusKind::Error),
                }
            }
            _ => {}
        }
    }

    fn after_navigation(&mut self, moved: crate::error::Result<bool>, edge_message: &str) {
        match moved {
            Ok(true) => {
                self.clear_status();
                self.sync_playback_screen();
                self.persist_view();
            }
            Ok(false) => self.set_status(edge_message, StatusKind::Info),
            Err(err) => self.set_status(err.to_string(), StatusKind::Error),
        }
    }

    fn handle_add_show(&mut self, code: KeyCode, mut form: ShowForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add show cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_show(&form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::AddingShow(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_show(&mut self, code: KeyCode, index: usize, mut form: ShowForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_show(index, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingShow { index, form })
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_show_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmShowDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_show_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmShowDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmShowDelete(confirm)),
        }
    }

    fn handle_add_song(&mut self, code: KeyCode, show_index: usize, mut form: SongForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Add song cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_song(show_index, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::AddingSong { show_index, form })
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_song(
        &mut self,
        code: KeyCode,
        show_index: usize,
        song_index: usize,
        mut form: SongForm,
    ) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_song(show_index, song_index, &form) {
                Ok(_) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingSong {
                show_index,
                song_index,
                form,
            })
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_song_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmSongDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_song_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmSongDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmSongDelete(confirm)),
        }
    }

    fn handle_confirm_import(&mut self, code: KeyCode, mut prompt: ImportPrompt) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                info!("import cancelled");
                self.set_status("Import cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => prompt.form.backspace(),
            KeyCode::Enter => match self.commit_import(&prompt) {
                Ok(_) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    prompt.form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if prompt.form.push_char(ch) {
                    prompt.form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::ConfirmImport(prompt))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Library => self.draw_library(frame, content_area),
            Screen::Show(screen) => self.draw_show(frame, content_area, screen),
            Screen::Playback(screen) => self.draw_playback(frame, content_area, screen),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingShow(form) => self.draw_show_form(frame, area, "Add Show", form),
            Mode::EditingShow { form, .. } => self.draw_show_form(frame, area, "Edit Show", form),
            Mode::ConfirmShowDelete(confirm) => self.draw_confirm_show_delete(frame, area, confirm),
            Mode::AddingSong { form, .. } => self.draw_song_form(frame, area, "Add Song", form),
            Mode::EditingSong { form, .. } => self.draw_song_form(frame, area, "Edit Song", form),
            Mode::ConfirmSongDelete(confirm) => self.draw_confirm_song_delete(frame, area, confirm),
            Mode::Sharing(popup) => self.draw_share(frame, area, popup),
            Mode::ConfirmImport(prompt) => self.draw_import(frame, area, prompt),
            Mode::Normal => {}
        }
    }

    fn draw_library(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Shows");

        if self.library.is_empty() {
            let message = Paragraph::new("No shows yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = self
            .library
            .list()
            .iter()
            .map(|show| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        show.name.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {}", show.song_count_label()),
                        Style::default().fg(Color::Gray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_show(&self, frame: &mut Frame, area: Rect, screen: &ShowScreen) {
        let Some(show) = self.library.get(screen.show_index) else {
            let message = Paragraph::new("This show no longer exists. Press Esc.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(1)])
            .split(area);

        let header = Paragraph::new(vec![
            Line::from(Span::styled(
                show.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::raw(show.song_count_label())),
        ])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::ALL).title("Show"));
        frame.render_widget(header, chunks[0]);

        if show.songs.is_empty() {
            let message = Paragraph::new("No songs yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[1]);
            return;
        }

        let items: Vec<ListItem> = show
            .songs
            .iter()
            .enumerate()
            .map(|(position, song)| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:>2}. ", position + 1),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(song.name.clone()),
                    Span::styled(
                        format!("  {} BPM", song.bpm),
                        Style::default().fg(Color::Cyan),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Songs"))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(screen.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_playback(&self, frame: &mut Frame, area: Rect, screen: &ShowScreen) {
        let (Some(show), Some(session)) =
            (self.library.get(screen.show_index), self.engine.session())
        else {
            let message = Paragraph::new("Nothing is loaded. Press Esc.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, area);
            return;
        };
        let Some(song) = show.songs.get(session.song_index) else {
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(6),
            ])
            .split(area);

        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                show.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  Song {} of {}",
                session.song_index + 1,
                show.songs.len()
            )),
        ]))
        .block(Block::default().borders(Borders::ALL).title("Playback"));
        frame.render_widget(header, chunks[0]);

        let pulse = self.engine.pulse();
        let level = pulse.map_or(0.0, |pulse| pulse.level);
        let text_color = if level > 0.5 {
            Color::Black
        } else {
            Color::Gray
        };
        let indicator_text = match pulse {
            Some(pulse) => format!("Beat {}", pulse.beat + 1),
            None => "Paused".to_string(),
        };
        let indicator = Paragraph::new(indicator_text)
            .alignment(Alignment::Center)
            .style(Style::default().bg(beat_color(level)).fg(text_color))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(indicator, chunks[1]);

        let mut tempo = vec![Span::styled(
            format!("{} BPM", session.live_bpm),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];
        if session.live_bpm != song.bpm {
            tempo.push(Span::styled(
                format!("  (saved {}; press s to keep)", song.bpm),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let (state_label, state_style) = match session.state() {
            TransportState::Running => ("Playing", Style::default().fg(Color::Green)),
            TransportState::Stopped => ("Stopped", Style::default().fg(Color::Red)),
        };

        let names: Vec<&str> = show.songs.iter().map(|song| song.name.as_str()).collect();
        let details = Paragraph::new(vec![
            Line::from(Span::styled(
                song.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(tempo),
            Line::from(Span::styled(state_label, state_style)),
            Line::from(format!(
                "Up next: {}",
                upcoming_label(&names, session.song_index)
            )),
        ])
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(details, chunks[2]);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints = match (&self.screen, &self.mode) {
            (_, Mode::Sharing(_)) => SHARE_HINTS,
            (Screen::Library, Mode::Normal) => LIBRARY_HINTS,
            (Screen::Show(_), Mode::Normal) => SHOW_HINTS,
            (Screen::Playback(_), Mode::Normal) => PLAYBACK_HINTS,
            _ => &[],
        };

        let spans: Vec<Span<'static>> = hints
            .iter()
            .flat_map(|(key, label)| {
                [
                    Span::styled(key.to_string(), key_style),
                    Span::raw(label.to_string()),
                ]
            })
            .collect();
        Line::from(spans)
    }

    fn draw_show_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &ShowForm) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line(), Line::from("")];
        lines.push(form_hint(form.error.as_deref(), "Enter to save • Esc to cancel"));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        frame.set_cursor_position(cursor_position(inner, "Name: ", form.value_len(), 0));
    }

    fn draw_song_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SongForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            form.build_line(SongField::Name),
            form.build_line(SongField::Bpm),
            Line::from(""),
            form_hint(
                form.error.as_deref(),
                "Enter to save • Tab to switch • Esc to cancel",
            ),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let cursor = match form.active {
            SongField::Name => {
                cursor_position(inner, "Name: ", form.value_len(SongField::Name), 0)
            }
            SongField::Bpm => cursor_position(inner, "BPM: ", form.value_len(SongField::Bpm), 1),
        };
        frame.set_cursor_position(cursor);
    }

    fn draw_confirm_show_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmShowDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Show").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Are you sure you want to delete \"{}\"?",
                confirm.name
            )),
            Line::from(format!(
                "Its {} will be removed too.",
                song_count_phrase(confirm.song_count)
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_song_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmSongDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Song").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Are you sure you want to delete \"{}\"?",
                confirm.song.name
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_share(&self, frame: &mut Frame, area: Rect, popup: &SharePopup) {
        let popup_area = centered_rect(90, 90, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Share \"{}\"", popup.show_name))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let width = usize::from(inner.width.max(1));
        let link_rows = popup.link.chars().count().div_ceil(width);
        // Heading, link, blank separators and the closing hint.
        let text_rows = link_rows + 4;

        let mut lines = vec![
            Line::from("Copy this link to share the show:"),
            Line::from(Span::styled(
                popup.link.clone(),
                Style::default().fg(Color::Yellow),
            )),
            Line::from(""),
        ];

        match popup.qr.as_deref() {
            Some(qr) => {
                let qr_width = qr.lines().map(|row| row.chars().count()).max().unwrap_or(0);
                let qr_height = qr.lines().count();
                if qr_width <= width && text_rows + qr_height <= usize::from(inner.height) {
                    lines.extend(qr.lines().map(|row| Line::from(row.to_string())));
                } else {
                    lines.push(Line::from(Span::styled(
                        "Enlarge the terminal to see the QR code.",
                        Style::default().fg(Color::Gray),
                    )));
                }
            }
            None => lines.push(Line::from(Span::styled(
                "Show is too long for a QR code, please use the text link to share.",
                Style::default().fg(Color::Gray),
            ))),
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "c to copy • any other key to close",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, inner);
    }

    fn draw_import(&self, frame: &mut Frame, area: Rect, prompt: &ImportPrompt) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Import Show").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            prompt.form.build_line(),
            Line::from(Span::styled(
                format!(
                    "Shared as \"{}\" with {}.",
                    prompt.show.name,
                    song_count_phrase(prompt.show.songs.len())
                ),
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
            form_hint(
                prompt.form.error.as_deref(),
                "Enter to import • Esc to cancel",
            ),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        frame.set_cursor_position(cursor_position(inner, "Name: ", prompt.form.value_len(), 0));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn current_view(&self) -> ViewState {
        match &self.screen {
            Screen::Library => ViewState::library(),
            Screen::Show(screen) => ViewState::show(screen.show_index, screen.selected),
            Screen::Playback(screen) => ViewState::playback(
                screen.show_index,
                self.engine
                    .session()
                    .map_or(screen.selected, |session| session.song_index),
            ),
        }
    }

    /// Record the current screen. Failures only reach the log and footer.
    fn persist_view(&mut self) {
        let state = self.current_view();
        if let Err(err) = self.views.save(&state) {
            warn!(error = %err, "failed to save view state");
            self.set_status("Could not remember the current screen.", StatusKind::Error);
        }
    }

    fn show_library(&mut self) {
        self.screen = Screen::Library;
        self.persist_view();
    }

    fn open_show(&mut self, show_index: usize, selected: usize) {
        let mut screen = ShowScreen::new(show_index, selected);
        screen.ensure_in_bounds(self.song_count(show_index));
        self.selected = show_index;
        self.screen = Screen::Show(screen);
        self.persist_view();
    }

    fn play_from(&mut self, show_index: usize, song_index: usize) {
        if let Err(err) = self.enter_playback(show_index, song_index) {
            self.set_status(surface_error(&err), StatusKind::Error);
        }
    }

    fn enter_playback(&mut self, show_index: usize, song_index: usize) -> Result<()> {
        let song_index = self
            .engine
            .enter(&self.library, show_index, song_index)?
            .song_index;
        self.engine.start();
        self.screen = Screen::Playback(ShowScreen::new(show_index, song_index));
        self.persist_view();
        info!(show = show_index, song = song_index, "playback started");
        Ok(())
    }

    fn exit_playback(&mut self) {
        let Screen::Playback(ref screen) = self.screen else {
            return;
        };
        let show_index = screen.show_index;
        let song_index = self
            .engine
            .session()
            .map_or(screen.selected, |session| session.song_index);
        self.engine.exit();
        info!(show = show_index, "playback stopped");
        self.open_show(show_index, song_index);
    }

    fn sync_playback_screen(&mut self) {
        let Some(song_index) = self.engine.session().map(|session| session.song_index) else {
            return;
        };
        if let Screen::Playback(ref mut screen) = self.screen {
            screen.selected = song_index;
        }
    }

    fn handle_sharing(&mut self, code: KeyCode, popup: SharePopup) -> Mode {
        match code {
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.copy_link(&popup.link);
                Mode::Sharing(popup)
            }
            _ => Mode::Normal,
        }
    }

    /// Put the share link on the system clipboard. The popup keeps showing
    /// the link either way, so a missing clipboard is only reported.
    fn copy_link(&mut self, link: &str) {
        let copied = arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(link.to_string()));
        match copied {
            Ok(()) => {
                info!("share link copied to clipboard");
                self.set_status("Link copied to clipboard!", StatusKind::Info);
            }
            Err(err) => {
                warn!(error = %err, "clipboard unavailable");
                self.set_status(
                    "Clipboard unavailable. Please copy the link shown above.",
                    StatusKind::Error,
                );
            }
        }
    }

    fn share_show(&mut self, show_index: usize) -> Mode {
        let Some(show) = self.library.get(show_index) else {
            self.set_status("No show selected to share.", StatusKind::Error);
            return Mode::Normal;
        };
        match share_link(&self.share_url, show) {
            Ok(link) => {
                info!(show = %show.name, "share link created");
                let popup = SharePopup {
                    show_name: show.name.clone(),
                    qr: share_qr(&link),
                    link,
                };
                self.clear_status();
                Mode::Sharing(popup)
            }
            Err(err) => {
                warn!(error = %err, "failed to encode show");
                self.set_status(err.to_string(), StatusKind::Error);
                Mode::Normal
            }
        }
    }

    fn save_new_show(&mut self, form: &ShowForm) -> Result<()> {
        let name = form.parse_inputs()?;
        self.selected = self.library.add(Show::new(&name)?)?;
        self.set_status(format!("Added show \"{name}\"."), StatusKind::Info);
        Ok(())
    }

    fn save_existing_show(&mut self, index: usize, form: &ShowForm) -> Result<()> {
        let name = form.parse_inputs()?;
        self.library.update(index, &name)?;
        self.set_status(format!("Renamed show to \"{name}\"."), StatusKind::Info);
        Ok(())
    }

    fn perform_show_delete(&mut self, confirm: &ConfirmShowDelete) -> Result<()> {
        self.library.remove(confirm.index)?;
        if self.selected >= self.library.len() {
            self.selected = self.library.len().saturating_sub(1);
        }
        self.set_status(format!("Deleted show \"{}\".", confirm.name), StatusKind::Info);
        Ok(())
    }

    fn save_new_song(&mut self, show_index: usize, form: &SongForm) -> Result<()> {
        let song = form.parse_inputs()?;
        let name = song.name.clone();
        let index = self.library.add_song(show_index, song)?;
        if let Screen::Show(ref mut screen) = self.screen {
            screen.selected = index;
        }
        self.set_status(format!("Added \"{name}\"."), StatusKind::Info);
        Ok(())
    }

    fn save_existing_song(
        &mut self,
        show_index: usize,
        song_index: usize,
        form: &SongForm,
    ) -> Result<()> {
        let song = form.parse_inputs()?;
        let name = song.name.clone();
        self.library.update_song(show_index, song_index, song)?;
        self.set_status(format!("Updated \"{name}\"."), StatusKind::Info);
        Ok(())
    }

    fn perform_song_delete(&mut self, confirm: &ConfirmSongDelete) -> Result<()> {
        self.library
            .remove_song(confirm.show_index, confirm.song_index)?;
        let remaining = self.song_count(confirm.show_index);
        if let Screen::Show(ref mut screen) = self.screen {
            screen.ensure_in_bounds(remaining);
        }
        self.set_status(
            format!("Deleted \"{}\".", confirm.song.name),
            StatusKind::Info,
        );
        Ok(())
    }

    fn reorder_song(&mut self, show_index: usize, from: usize, offset: isize) {
        let Some(to) = from
            .checked_add_signed(offset)
            .filter(|to| *to < self.song_count(show_index))
        else {
            return;
        };
        match self.library.move_song(show_index, from, to) {
            Ok(()) => {
                if let Screen::Show(ref mut screen) = self.screen {
                    screen.selected = to;
                }
                self.persist_view();
            }
            Err(err) => self.set_status(err.to_string(), StatusKind::Error),
        }
    }

    fn commit_import(&mut self, prompt: &ImportPrompt) -> Result<()> {
        let requested = prompt.form.parse_inputs()?;
        let name = unique_show_name(self.library.list(), &requested);
        let show = Show {
            name: name.clone(),
            songs: prompt.show.songs.clone(),
        };
        let index = self.library.add(show)?;
        if let Screen::Library = self.screen {
            self.selected = index;
        }
        info!(show = %name, "show imported");
        self.set_status(
            format!("Show \"{name}\" imported successfully!"),
            StatusKind::Info,
        );
        Ok(())
    }

    fn move_show_selection(&mut self, offset: isize) {
        let len = self.library.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let last = len as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    fn move_song_selection(&mut self, offset: isize, len: usize) {
        if let Screen::Show(ref mut screen) = self.screen {
            screen.move_selection(offset, len);
        }
    }

    fn song_count(&self, show_index: usize) -> usize {
        self.library.get(show_index).map_or(0, |show| show.songs.len())
    }
}

/// Red error text when present, otherwise the grey key hint.
fn form_hint(error: Option<&str>, hint: &'static str) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(hint, Style::default().fg(Color::Gray))),
    }
}

fn song_count_phrase(count: usize) -> String {
    if count == 1 {
        "1 song".to_string()
    } else {
        format!("{count} songs")
    }
}
