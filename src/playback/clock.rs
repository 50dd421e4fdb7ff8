//! Beat signal scheduling.
//!
//! The signal is not a background timer: it is a phase accumulator evaluated
//! against a clock whenever a frame is drawn. Retargeting folds the phase
//! reached so far into a new anchor before switching rate, so a tempo nudge
//! never jumps the in-flight beat. The scheduler owns at most one live signal;
//! scheduling always tears the previous one down first.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;

/// Share of the beat during which the indicator is fully lit.
pub const FLASH_FRACTION: f64 = 0.1;
/// Point in the beat by which the flash has faded out completely.
pub const FADE_END_FRACTION: f64 = 0.3;

/// Length of one beat at `bpm`: 60000ms / bpm.
pub fn period_for_bpm(bpm: u16) -> Duration {
    Duration::from_secs(60) / u32::from(bpm.max(1))
}

/// Monotonic time source, expressed as time elapsed since the clock's origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for deterministic tests. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Opaque reference to a scheduled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalHandle(u64);

/// Snapshot of the beat signal at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// Completed beats since the signal was scheduled.
    pub beat: u64,
    /// Position inside the current beat, in `[0, 1)`.
    pub position: f64,
    /// Indicator brightness: 1.0 during the flash, fading to 0.0.
    pub level: f64,
}

impl Pulse {
    fn at_phase(phase: f64) -> Self {
        let beat = phase.floor();
        let position = phase - beat;
        let level = if position < FLASH_FRACTION {
            1.0
        } else if position < FADE_END_FRACTION {
            1.0 - (position - FLASH_FRACTION) / (FADE_END_FRACTION - FLASH_FRACTION)
        } else {
            0.0
        };
        Self {
            beat: beat as u64,
            position,
            level,
        }
    }

    pub fn is_flash(&self) -> bool {
        self.position < FLASH_FRACTION
    }
}

/// Operations the playback engine needs from a beat source.
pub trait BeatScheduler {
    /// Start a repeating signal with the given period. Any signal still alive
    /// is cancelled first.
    fn schedule_repeating(&mut self, period: Duration) -> SignalHandle;

    /// Change the period of a live signal without resetting its phase.
    /// Returns false for stale handles.
    fn retarget(&mut self, handle: SignalHandle, period: Duration) -> bool;

    /// Stop a signal. Cancelling twice or with a stale handle is a no-op.
    fn cancel(&mut self, handle: SignalHandle) -> bool;

    /// Current state of the signal, `None` once cancelled.
    fn pulse(&self, handle: SignalHandle) -> Option<Pulse>;

    /// Number of live signals (zero or one).
    fn active_signals(&self) -> usize;
}

struct ActiveSignal {
    handle: SignalHandle,
    period: Duration,
    anchor: Duration,
    anchor_phase: f64,
}

impl ActiveSignal {
    fn phase_at(&self, now: Duration) -> f64 {
        let elapsed = now.saturating_sub(self.anchor).as_secs_f64();
        self.anchor_phase + elapsed / self.period.as_secs_f64()
    }
}

/// Scheduler that evaluates the signal lazily from a `Clock`.
pub struct ClockScheduler<C: Clock> {
    clock: C,
    active: Option<ActiveSignal>,
    next_id: u64,
}

impl<C: Clock> ClockScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            active: None,
            next_id: 0,
        }
    }

    fn live(&self, handle: SignalHandle) -> Option<&ActiveSignal> {
        self.active.as_ref().filter(|signal| signal.handle == handle)
    }
}

impl<C: Clock> BeatScheduler for ClockScheduler<C> {
    fn schedule_repeating(&mut self, period: Duration) -> SignalHandle {
        if let Some(previous) = self.active.take() {
            debug!(handle = previous.handle.0, "tearing down signal before reschedule");
        }

        self.next_id += 1;
        let handle = SignalHandle(self.next_id);
        self.active = Some(ActiveSignal {
            handle,
            period,
            anchor: self.clock.now(),
            anchor_phase: 0.0,
        });
        handle
    }

    fn retarget(&mut self, handle: SignalHandle, period: Duration) -> bool {
        let now = self.clock.now();
        match self.active.as_mut() {
            Some(signal) if signal.handle == handle => {
                signal.anchor_phase = signal.phase_at(now);
                signal.anchor = now;
                signal.period = period;
                true
            }
            _ => false,
        }
    }

    fn cancel(&mut self, handle: SignalHandle) -> bool {
        if self.live(handle).is_some() {
            self.active = None;
            true
        } else {
            false
        }
    }

    fn pulse(&self, handle: SignalHandle) -> Option<Pulse> {
        self.live(handle)
            .map(|signal| Pulse::at_phase(signal.phase_at(self.clock.now())))
    }

    fn active_signals(&self) -> usize {
        usize::from(self.active.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn period_scales_linearly_with_bpm() {
        assert_eq!(period_for_bpm(60), ms(1000));
        assert_eq!(period_for_bpm(120), ms(500));
        assert_eq!(period_for_bpm(300), ms(200));
        assert_eq!(period_for_bpm(20), ms(3000));
    }

    #[test]
    fn flash_occupies_leading_tenth() {
        let clock = ManualClock::new();
        let mut scheduler = ClockScheduler::new(clock.clone());
        let handle = scheduler.schedule_repeating(ms(1000));

        assert_eq!(scheduler.pulse(handle).unwrap().level, 1.0);
        clock.advance(ms(99));
        assert!(scheduler.pulse(handle).unwrap().is_flash());
        clock.advance(ms(101));
        let fading = scheduler.pulse(handle).unwrap();
        assert!(!fading.is_flash());
        assert!(fading.level > 0.0 && fading.level < 1.0);
        clock.advance(ms(500));
        assert_eq!(scheduler.pulse(handle).unwrap().level, 0.0);
        clock.advance(ms(300));
        let next = scheduler.pulse(handle).unwrap();
        assert_eq!(next.beat, 1);
        assert!(next.is_flash());
    }

    #[test]
    fn retarget_preserves_phase() {
        let clock = ManualClock::new();
        let mut scheduler = ClockScheduler::new(clock.clone());
        let handle = scheduler.schedule_repeating(ms(1000));

        clock.advance(ms(500));
        assert!(scheduler.retarget(handle, ms(250)));
        let pulse = scheduler.pulse(handle).unwrap();
        assert_eq!(pulse.beat, 0);
        assert!((pulse.position - 0.5).abs() < 1e-9);

        // The remaining half beat now runs at the faster rate.
        clock.advance(ms(125));
        let pulse = scheduler.pulse(handle).unwrap();
        assert_eq!(pulse.beat, 1);
        assert!(pulse.position.abs() < 1e-9);
    }

    #[test]
    fn stop_then_start_leaves_one_signal() {
        let clock = ManualClock::new();
        let mut scheduler = ClockScheduler::new(clock);
        let first = scheduler.schedule_repeating(ms(500));
        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert_eq!(scheduler.active_signals(), 0);

        let second = scheduler.schedule_repeating(ms(500));
        assert_eq!(scheduler.active_signals(), 1);
        assert!(scheduler.pulse(first).is_none());
        assert!(!scheduler.retarget(first, ms(100)));
        assert!(scheduler.pulse(second).is_some());
    }

    #[test]
    fn rescheduling_without_cancel_replaces_signal() {
        let mut scheduler = ClockScheduler::new(ManualClock::new());
        let first = scheduler.schedule_repeating(ms(500));
        let second = scheduler.schedule_repeating(ms(400));
        assert_ne!(first, second);
        assert_eq!(scheduler.active_signals(), 1);
        assert!(scheduler.pulse(first).is_none());
    }
}
