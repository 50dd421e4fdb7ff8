use tracing::{debug, info};

use crate::db::ShowLibrary;
use crate::error::{DownbeatError, Result};
use crate::models::{Song, MAX_BPM, MIN_BPM};

use super::clock::{period_for_bpm, BeatScheduler, Pulse, SignalHandle};

/// Whether the beat signal is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

/// The performer's position in a setlist. `live_bpm` starts at the stored
/// tempo of the loaded song and only reaches the library on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub show_index: usize,
    pub song_index: usize,
    pub live_bpm: u16,
    pub running: bool,
}

/// Transport inputs that move a session from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Start,
    Stop,
    Toggle,
    Next,
    Previous,
    TempoUp,
    TempoDown,
}

/// Side effect the engine must apply to the beat signal after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalCommand {
    None,
    Start(u16),
    Stop,
    /// Cancel the current signal and schedule a fresh one at the new tempo.
    Restart(u16),
    /// Change rate in place, keeping phase.
    Retarget(u16),
}

/// Result of applying one event to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: PlaybackSession,
    pub command: SignalCommand,
}

impl PlaybackSession {
    /// Load `song_index` from `songs`, falling back to the first song when the
    /// index is out of range. Returns `None` for an empty show.
    pub fn load(show_index: usize, song_index: usize, songs: &[Song], running: bool) -> Option<Self> {
        let song_index = if song_index < songs.len() { song_index } else { 0 };
        let song = songs.get(song_index)?;
        Some(Self {
            show_index,
            song_index,
            live_bpm: song.bpm,
            running,
        })
    }

    pub fn state(&self) -> TransportState {
        if self.running {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    /// Pure transition function. `songs` is the current show's song list and
    /// is only consulted by track navigation.
    pub fn apply(self, event: TransportEvent, songs: &[Song]) -> Transition {
        match event {
            TransportEvent::Start if !self.running => {
                let bpm = self.live_bpm;
                self.with(|s| s.running = true, SignalCommand::Start(bpm))
            }
            TransportEvent::Stop if self.running => {
                self.with(|s| s.running = false, SignalCommand::Stop)
            }
            TransportEvent::Toggle => {
                let event = if self.running {
                    TransportEvent::Stop
                } else {
                    TransportEvent::Start
                };
                self.apply(event, songs)
            }
            TransportEvent::Next if self.song_index + 1 < songs.len() => {
                let index = self.song_index + 1;
                self.move_to(index, songs)
            }
            TransportEvent::Previous if self.song_index > 0 && self.song_index <= songs.len() => {
                let index = self.song_index - 1;
                self.move_to(index, songs)
            }
            TransportEvent::TempoUp if self.live_bpm < MAX_BPM => {
                let bpm = self.live_bpm + 1;
                self.retempo(bpm)
            }
            TransportEvent::TempoDown if self.live_bpm > MIN_BPM => {
                let bpm = self.live_bpm - 1;
                self.retempo(bpm)
            }
            _ => Transition {
                session: self,
                command: SignalCommand::None,
            },
        }
    }

    fn with(mut self, edit: impl FnOnce(&mut Self), command: SignalCommand) -> Transition {
        edit(&mut self);
        Transition {
            session: self,
            command,
        }
    }

    fn move_to(self, index: usize, songs: &[Song]) -> Transition {
        let bpm = songs[index].bpm;
        let command = if self.running {
            SignalCommand::Restart(bpm)
        } else {
            SignalCommand::None
        };
        self.with(
            |s| {
                s.song_index = index;
                s.live_bpm = bpm;
            },
            command,
        )
    }

    fn retempo(self, bpm: u16) -> Transition {
        let command = if self.running {
            SignalCommand::Retarget(bpm)
        } else {
            SignalCommand::None
        };
        self.with(|s| s.live_bpm = bpm, command)
    }
}

/// Owns the playback session and drives the beat signal through a scheduler.
pub struct PlaybackEngine<S: BeatScheduler> {
    scheduler: S,
    session: Option<PlaybackSession>,
    signal: Option<SignalHandle>,
}

impl<S: BeatScheduler> PlaybackEngine<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            session: None,
            signal: None,
        }
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> TransportState {
        self.session
            .as_ref()
            .map_or(TransportState::Stopped, PlaybackSession::state)
    }

    pub fn live_bpm(&self) -> Option<u16> {
        self.session.as_ref().map(|s| s.live_bpm)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Current beat indicator state, `None` while stopped.
    pub fn pulse(&self) -> Option<Pulse> {
        self.signal.and_then(|handle| self.scheduler.pulse(handle))
    }

    /// Load a song into the session. The running state is left untouched; a
    /// running signal follows the new song's tempo.
    pub fn enter(
        &mut self,
        library: &ShowLibrary,
        show_index: usize,
        song_index: usize,
    ) -> Result<&PlaybackSession> {
        let show = library.show(show_index)?;
        let running = self.session.as_ref().is_some_and(|s| s.running);
        let session = PlaybackSession::load(show_index, song_index, &show.songs, running)
            .ok_or_else(|| DownbeatError::validation("This show has no songs yet."))?;

        debug!(
            show = show_index,
            song = session.song_index,
            bpm = session.live_bpm,
            "loaded song"
        );
        if running {
            self.execute(SignalCommand::Retarget(session.live_bpm));
        }
        Ok(&*self.session.insert(session))
    }

    pub fn start(&mut self) {
        self.dispatch(TransportEvent::Start, &[]);
    }

    pub fn stop(&mut self) {
        self.dispatch(TransportEvent::Stop, &[]);
    }

    pub fn toggle(&mut self) {
        self.dispatch(TransportEvent::Toggle, &[]);
    }

    /// Advance to the next song. Returns false at the end of the show.
    pub fn next(&mut self, library: &ShowLibrary) -> Result<bool> {
        self.navigate(library, TransportEvent::Next)
    }

    /// Go back one song. Returns false at the start of the show.
    pub fn previous(&mut self, library: &ShowLibrary) -> Result<bool> {
        self.navigate(library, TransportEvent::Previous)
    }

    pub fn tempo_up(&mut self) -> bool {
        self.dispatch(TransportEvent::TempoUp, &[])
    }

    pub fn tempo_down(&mut self) -> bool {
        self.dispatch(TransportEvent::TempoDown, &[])
    }

    /// Store the live tempo on the loaded song and persist it.
    pub fn commit_tempo(&self, library: &mut ShowLibrary) -> Result<u16> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| DownbeatError::stale("No song is loaded."))?;
        library.set_song_bpm(session.show_index, session.song_index, session.live_bpm)?;
        info!(
            show = session.show_index,
            song = session.song_index,
            bpm = session.live_bpm,
            "tempo saved"
        );
        Ok(session.live_bpm)
    }

    /// Stop the signal and forget the session.
    pub fn exit(&mut self) {
        self.stop();
        self.session = None;
    }

    fn navigate(&mut self, library: &ShowLibrary, event: TransportEvent) -> Result<bool> {
        let Some(show_index) = self.session.as_ref().map(|s| s.show_index) else {
            return Ok(false);
        };
        let songs = &library.show(show_index)?.songs;
        Ok(self.dispatch(event, songs))
    }

    /// Run one transition and apply its signal command. Returns whether the
    /// session changed.
    fn dispatch(&mut self, event: TransportEvent, songs: &[Song]) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let before = session.clone();
        let Transition { session, command } = session.apply(event, songs);
        let changed = session != before;
        self.session = Some(session);
        self.execute(command);
        if changed {
            debug!(?event, ?command, "transport transition");
        }
        changed
    }

    fn execute(&mut self, command: SignalCommand) {
        match command {
            SignalCommand::None => {}
            SignalCommand::Start(bpm) => self.schedule(bpm),
            SignalCommand::Stop => self.cancel(),
            SignalCommand::Restart(bpm) => {
                self.cancel();
                self.schedule(bpm);
            }
            SignalCommand::Retarget(bpm) => {
                if let Some(handle) = self.signal {
                    self.scheduler.retarget(handle, period_for_bpm(bpm));
                }
            }
        }
    }

    fn schedule(&mut self, bpm: u16) {
        self.cancel();
        self.signal = Some(self.scheduler.schedule_repeating(period_for_bpm(bpm)));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.signal.take() {
            self.scheduler.cancel(handle);
        }
    }
}
