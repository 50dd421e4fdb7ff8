//! Metronome playback: the session state machine and the beat signal it
//! drives.

mod clock;
mod engine;

pub use clock::{
    period_for_bpm, BeatScheduler, Clock, ClockScheduler, ManualClock, Pulse, SignalHandle,
    SystemClock, FADE_END_FRACTION, FLASH_FRACTION,
};
pub use engine::{
    PlaybackEngine, PlaybackSession, SignalCommand, TransportEvent, TransportState, Transition,
};
