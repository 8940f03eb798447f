//! Match clock
//!
//! The clock stores only an accumulated offset plus the wall-clock instant the
//! current running span began. Elapsed time is recomputed from wall-clock
//! deltas on every read, so missed display ticks or a suspended process never
//! skew it.

mod ticker;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::unix_timestamp_ms_now;

pub use ticker::{spawn_ticker, ClockDisplay};

/// Source of wall-clock time in Unix milliseconds.
pub trait WallClock {
    fn now_ms(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> i64 {
        unix_timestamp_ms_now()
    }
}

/// Hand-driven wall clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Duration) {
        self.advance_ms(i64::try_from(delta.as_millis()).unwrap_or(i64::MAX));
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Persistable clock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub running: bool,
    /// Wall-clock ms when the current running span began
    pub start_timestamp_ms: Option<i64>,
    /// Match time accumulated by completed running spans
    pub accumulated_offset_ms: u64,
}

impl ClockState {
    /// Check that `running` and `start_timestamp_ms` agree.
    pub fn validate(&self) -> Result<()> {
        match (self.running, self.start_timestamp_ms) {
            (true, Some(_)) | (false, None) => Ok(()),
            (true, None) => Err(Error::validation(
                "running clock is missing its start timestamp",
            )),
            (false, Some(_)) => Err(Error::validation(
                "paused clock must not carry a start timestamp",
            )),
        }
    }
}

/// Running/paused match timer.
#[derive(Debug, Clone)]
pub struct MatchClock<W = SystemClock> {
    state: ClockState,
    wall: W,
}

impl MatchClock<SystemClock> {
    /// Create an idle clock at zero driven by the system wall clock.
    pub fn new() -> Self {
        Self::with_wall_clock(SystemClock)
    }
}

impl Default for MatchClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WallClock> MatchClock<W> {
    pub fn with_wall_clock(wall: W) -> Self {
        Self {
            state: ClockState::default(),
            wall,
        }
    }

    /// Restore a clock from persisted state.
    pub fn from_state(state: ClockState, wall: W) -> Result<Self> {
        state.validate()?;
        Ok(Self { state, wall })
    }

    /// Begin (or resume) counting. No-op while already running.
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        self.state.start_timestamp_ms = Some(self.wall.now_ms());
        self.state.running = true;
    }

    /// Stop counting and fold the running span into the offset. No-op while idle.
    pub fn pause(&mut self) {
        let Some(started) = self.state.start_timestamp_ms.take() else {
            return;
        };
        let span = span_ms(started, self.wall.now_ms());
        self.state.accumulated_offset_ms = self.state.accumulated_offset_ms.saturating_add(span);
        self.state.running = false;
    }

    /// Back to idle at zero, from any state.
    pub fn reset(&mut self) {
        self.state = ClockState::default();
    }

    /// Elapsed match time in milliseconds, computed fresh from the wall clock.
    pub fn elapsed_ms(&self) -> u64 {
        match self.state.start_timestamp_ms {
            Some(started) if self.state.running => self
                .state
                .accumulated_offset_ms
                .saturating_add(span_ms(started, self.wall.now_ms())),
            _ => self.state.accumulated_offset_ms,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms())
    }

    pub const fn is_running(&self) -> bool {
        self.state.running
    }

    pub const fn state(&self) -> ClockState {
        self.state
    }

    pub const fn wall_clock(&self) -> &W {
        &self.wall
    }
}

// A wall clock stepping backwards contributes nothing rather than going negative.
fn span_ms(started_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(now_ms.saturating_sub(started_ms)).unwrap_or(0)
}

/// Render elapsed time as `mm:ss`. Minutes keep counting past 59.
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let minutes = elapsed_ms / 60_000;
    let seconds = (elapsed_ms % 60_000) / 1000;
    format!("{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_750_000_000_000;

    fn clock() -> (ManualClock, MatchClock<ManualClock>) {
        let wall = ManualClock::new(T0);
        (wall.clone(), MatchClock::with_wall_clock(wall))
    }

    #[test]
    fn new_clock_is_idle_at_zero() {
        let (_, clock) = clock();
        assert!(!clock.is_running());
        assert_eq!(clock.elapsed_ms(), 0);
        assert_eq!(clock.state(), ClockState::default());
    }

    #[test]
    fn elapsed_while_running_tracks_wall_clock() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(65_000);
        assert_eq!(clock.elapsed_ms(), 65_000);
    }

    #[test]
    fn pause_excludes_idle_time() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(10_000);
        clock.pause();
        wall.advance_ms(5_000);
        clock.start();
        wall.advance_ms(3_000);
        assert_eq!(clock.elapsed_ms(), 13_000);
    }

    #[test]
    fn elapsed_is_constant_while_idle() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(4_000);
        clock.pause();
        let frozen = clock.elapsed_ms();
        for _ in 0..5 {
            wall.advance_ms(1_000);
            assert_eq!(clock.elapsed_ms(), frozen);
        }
    }

    #[test]
    fn elapsed_is_monotonic_while_running() {
        let (wall, mut clock) = clock();
        let mut previous = clock.elapsed_ms();
        for step in [0, 1, 250, 999, 60_000] {
            clock.start();
            wall.advance_ms(step);
            let current = clock.elapsed_ms();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn start_twice_keeps_original_start() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(2_000);
        clock.start();
        wall.advance_ms(1_000);
        assert_eq!(clock.elapsed_ms(), 3_000);
        assert_eq!(clock.state().start_timestamp_ms, Some(T0));
    }

    #[test]
    fn pause_twice_is_noop() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(2_000);
        clock.pause();
        let once = clock.state();
        wall.advance_ms(7_000);
        clock.pause();
        assert_eq!(clock.state(), once);
        assert_eq!(clock.elapsed_ms(), 2_000);
    }

    #[test]
    fn reset_from_any_state_returns_to_zero() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(30_000);
        clock.reset();
        assert_eq!(clock.elapsed_ms(), 0);
        assert!(!clock.is_running());

        clock.start();
        wall.advance_ms(1_500);
        assert_eq!(clock.elapsed_ms(), 1_500);

        clock.pause();
        clock.reset();
        assert_eq!(clock.state(), ClockState::default());
    }

    #[test]
    fn backwards_wall_clock_never_goes_negative() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(5_000);
        clock.pause();
        clock.start();
        wall.advance_ms(-60_000);
        assert_eq!(clock.elapsed_ms(), 5_000);
        clock.pause();
        assert_eq!(clock.elapsed_ms(), 5_000);
    }

    #[test]
    fn restored_clock_keeps_counting() {
        let (wall, mut clock) = clock();
        clock.start();
        wall.advance_ms(20_000);
        let saved = clock.state();

        let restored = MatchClock::from_state(saved, wall.clone()).unwrap();
        wall.advance_ms(1_000);
        assert_eq!(restored.elapsed_ms(), 21_000);
    }

    #[test]
    fn inconsistent_state_is_rejected() {
        let running_without_start = ClockState {
            running: true,
            start_timestamp_ms: None,
            accumulated_offset_ms: 0,
        };
        assert!(MatchClock::from_state(running_without_start, ManualClock::new(T0)).is_err());

        let idle_with_start = ClockState {
            running: false,
            start_timestamp_ms: Some(T0),
            accumulated_offset_ms: 0,
        };
        assert!(MatchClock::from_state(idle_with_start, ManualClock::new(T0)).is_err());
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = ClockState {
            running: true,
            start_timestamp_ms: Some(T0),
            accumulated_offset_ms: 12_345,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<ClockState>(&json).unwrap(), state);
    }

    #[test]
    fn format_elapsed_pads_minutes_and_seconds() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65_000), "01:05");
        assert_eq!(format_elapsed(125_999), "02:05");
        assert_eq!(format_elapsed(95 * 60_000), "95:00");
    }
}
