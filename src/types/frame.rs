//! Video frame packets

use std::sync::Arc;
use std::time::Instant;

/// One video datagram pulled from the rover.
///
/// Each frame owns a fresh allocation, so display code can hold on to it while
/// the puller keeps receiving.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw image payload exactly as received
    pub data: Arc<[u8]>,

    /// Frames received by the puller before this one, across socket resets
    pub sequence: u64,

    /// Local receive time
    pub received_at: Instant,
}

impl VideoFrame {
    /// Create a new frame
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self { data: data.into(), sequence, received_at: Instant::now() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
