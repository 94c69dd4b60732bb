//! Rolling frame-rate measurement

use std::time::{Duration, Instant};

/// Counts frames and reports a rate once per measurement window.
///
/// The rate is only computed when a frame arrives after the window has
/// elapsed, so a stalled stream keeps reporting its last value.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: Duration,
    started: Instant,
    frames: u32,
}

impl FpsMeter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        Self { window, started: now, frames: 0 }
    }

    /// Count one frame received at `now`.
    ///
    /// Returns the frame rate when at least one window has elapsed since the
    /// last report, then starts a new window with the counter at zero.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;

        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.window {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.started = now;
        Some(fps)
    }

    /// Frames counted in the current window.
    pub fn pending_frames(&self) -> u32 {
        self.frames
    }
}
