//! Software frame pacing.

use std::time::{Duration, Instant};

/// Measures one tick against the frame period.
#[derive(Debug, Clone, Copy)]
pub struct ClockSync {
    started: Instant,
}

impl ClockSync {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Self {
        Self { started }
    }

    /// How long to sleep at `now` so the tick ends `headroom` before the
    /// next frame boundary. `None` when the remaining time is within the
    /// headroom.
    pub fn sleep_at(&self, now: Instant, period: Duration, headroom: Duration) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.started);
        let remaining = period.checked_sub(elapsed)?;
        (remaining > headroom).then(|| remaining - headroom)
    }

    /// [`ClockSync::sleep_at`] for the current instant.
    pub fn sleep_time(&self, period: Duration, headroom: Duration) -> Option<Duration> {
        self.sleep_at(Instant::now(), period, headroom)
    }
}
