//! Inputs from the controlling collaborator.
//!
//! Callers may be on any thread, including a UI thread, so nothing here blocks:
//! the selected command is a single atomic byte and the wake-ups are
//! [`Notify`] permits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;

use crate::protocol::Opcode;
use crate::{Command, Settings};

const NO_COMMAND: u8 = 0;

/// Currently selected command, stored as its opcode byte.
#[derive(Debug, Default)]
pub struct HeldCommandSlot {
    opcode: AtomicU8,
}

impl HeldCommandSlot {
    pub fn store(&self, command: Option<Command>) {
        let byte = command.map(|c| c.opcode().as_byte()).unwrap_or(NO_COMMAND);
        self.opcode.store(byte, Ordering::Release);
    }

    pub fn load(&self) -> Option<Command> {
        match self.opcode.load(Ordering::Acquire) {
            NO_COMMAND => None,
            byte => Opcode::try_from(byte).ok().and_then(Command::from_opcode),
        }
    }
}

/// Trigger inputs shared between the connection handle and the driver.
#[derive(Debug, Default)]
pub struct Controls {
    pub(crate) held: HeldCommandSlot,
    pub(crate) command_trigger: Notify,
    pub(crate) start_trigger: Notify,
    pub(crate) settings: Arc<Settings>,
}

impl Controls {
    /// Select `command` and wake the dispatch loop.
    ///
    /// A trigger fired while the loop is busy is remembered and consumed on its
    /// next wait; several triggers collapse into one.
    pub fn trigger_command(&self, command: Option<Command>) {
        self.held.store(command);
        self.command_trigger.notify_one();
    }

    /// Ask the driver to start streaming once a rover is discovered.
    pub fn trigger_start(&self) {
        self.start_trigger.notify_one();
    }

    /// Currently selected command.
    pub fn held(&self) -> Option<Command> {
        self.held.load()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn slot_round_trips_every_command() {
        let slot = HeldCommandSlot::default();
        assert_eq!(slot.load(), None);

        for command in [
            Command::FORWARD,
            Command::REVERSE,
            Command::LEFT,
            Command::RIGHT,
            Command::Stop,
            Command::Set,
            Command::Deadzone,
            Command::Flash,
        ] {
            slot.store(Some(command));
            assert_eq!(slot.load(), Some(command));
        }

        slot.store(None);
        assert_eq!(slot.load(), None);
    }

    #[tokio::test]
    async fn early_trigger_is_not_lost() {
        let controls = Controls::default();
        controls.trigger_start();

        tokio::time::timeout(Duration::from_millis(100), controls.start_trigger.notified())
            .await
            .expect("stored permit should complete the wait");
    }

    #[tokio::test]
    async fn repeated_triggers_collapse() {
        let controls = Controls::default();
        controls.trigger_command(Some(Command::FORWARD));
        controls.trigger_command(None);

        controls.command_trigger.notified().await;
        assert_eq!(controls.held(), None);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), controls.command_trigger.notified())
                .await
                .is_err()
        );
    }
}
