//! Update rate control for frame subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for frame streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every frame the rover delivers
    Native,

    /// Throttled to at most this many frames per second, latest frame wins.
    /// `Max(0)` behaves like `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Normalize rate against the observed source frequency.
    ///
    /// Without a measurement yet the requested rate is kept as is.
    pub fn normalize(self, source_fps: Option<f64>) -> Self {
        match (self, source_fps) {
            (UpdateRate::Max(0), _) => UpdateRate::Native,
            (UpdateRate::Max(hz), Some(fps)) if hz as f64 >= fps => UpdateRate::Native,
            (rate, _) => rate,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self, source_fps: Option<f64>) -> Option<Duration> {
        match self.normalize(source_fps) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
