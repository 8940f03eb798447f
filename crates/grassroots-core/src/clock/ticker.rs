//! Recurring display refresh for the match clock.
//!
//! The ticker only republishes what the clock computes; it is never the
//! source of elapsed time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{format_elapsed, MatchClock, WallClock};

/// Snapshot of the clock for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDisplay {
    pub elapsed_ms: u64,
    pub running: bool,
    pub text: String,
}

impl ClockDisplay {
    pub fn capture<W: WallClock>(clock: &MatchClock<W>) -> Self {
        let elapsed_ms = clock.elapsed_ms();
        Self {
            elapsed_ms,
            running: clock.is_running(),
            text: format_elapsed(elapsed_ms),
        }
    }
}

impl Default for ClockDisplay {
    fn default() -> Self {
        Self {
            elapsed_ms: 0,
            running: false,
            text: format_elapsed(0),
        }
    }
}

/// Publish a fresh [`ClockDisplay`] every `period` until all receivers are dropped.
pub fn spawn_ticker<W>(
    clock: Arc<Mutex<MatchClock<W>>>,
    period: Duration,
) -> (watch::Receiver<ClockDisplay>, JoinHandle<()>)
where
    W: WallClock + Send + 'static,
{
    let (tx, rx) = watch::channel(ClockDisplay::default());
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let display = {
                let clock = clock.lock().await;
                ClockDisplay::capture(&clock)
            };
            if tx.send(display).is_err() {
                tracing::debug!("Clock display has no subscribers; stopping ticker");
                break;
            }
        }
    });
    (rx, handle)
}
