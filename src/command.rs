//! Command channel: encodes commands with the current settings and sends them

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

use crate::protocol::{
    encode_deadzone, encode_flash, encode_move, encode_move_set, encode_move_stop,
};
use crate::transport::DatagramSink;
use crate::{Command, Result, Settings};

/// Monotonic message id source.
///
/// The first id handed out is 1. After `u32::MAX` the counter wraps to 0; the
/// rover treats ids as ordering hints only.
#[derive(Debug, Default)]
pub struct MessageIds {
    last: AtomicU32,
}

impl MessageIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose next id will be `last.wrapping_add(1)`.
    pub fn starting_after(last: u32) -> Self {
        Self { last: AtomicU32::new(last) }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> u32 {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Most recently allocated id (0 before the first allocation).
    pub fn last_id(&self) -> u32 {
        self.last.load(Ordering::Relaxed)
    }
}

/// Sends one encoded frame per command.
///
/// Repetition of held commands is the dispatch loop's job; the channel itself
/// never resends.
pub struct CommandChannel<S> {
    sink: S,
    settings: Arc<Settings>,
    ids: Arc<MessageIds>,
}

impl<S: DatagramSink> CommandChannel<S> {
    /// Channel with its own id counter.
    pub fn new(sink: S, settings: Arc<Settings>) -> Self {
        Self::with_ids(sink, settings, Arc::new(MessageIds::new()))
    }

    /// Channel drawing ids from a shared counter, so ids keep increasing across sessions.
    pub fn with_ids(sink: S, settings: Arc<Settings>, ids: Arc<MessageIds>) -> Self {
        Self { sink, settings, ids }
    }

    /// Encode `command` and transmit it, consuming exactly one message id.
    pub async fn send(&self, command: Command) -> Result<u32> {
        let id = self.ids.next_id();
        let frame = self.encode(command, id);

        trace!(id, ?command, len = frame.len(), "Sending command");
        self.sink.send_datagram(&frame).await?;
        Ok(id)
    }

    /// Most recently issued message id.
    pub fn last_id(&self) -> u32 {
        self.ids.last_id()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn encode(&self, command: Command, id: u32) -> Vec<u8> {
        match command {
            Command::Move(direction) => {
                encode_move(direction, self.settings.move_speed_increment(), id)
            }
            Command::Stop => encode_move_stop(id),
            Command::Set => {
                let (speed_l, speed_r) = self.settings.speeds();
                encode_move_set(speed_l, speed_r, id)
            }
            Command::Deadzone => encode_deadzone(self.settings.deadzone(), id),
            Command::Flash => encode_flash(self.settings.camera_flash_duty(), id),
        }
    }
}
