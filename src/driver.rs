//! Driver spawns and manages the rover session.
//!
//! One long-lived task walks the session state machine:
//!
//! ```text
//! Discovering -> AwaitingStart -> Active -> Faulted -> Discovering -> ...
//! ```
//!
//! While `Active`, the stream puller and telemetry receiver run as separate
//! tasks on a per-session cancellation token, and the driver task itself runs
//! the command dispatch loop. A failed command send is the only way out of
//! `Active`; everything else is recovered inside the loop that hit it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{CommandChannel, MessageIds};
use crate::config::RoverConfig;
use crate::control::Controls;
use crate::discovery::Discovery;
use crate::protocol::SpeedReading;
use crate::stream::{StreamOutputs, StreamPuller, StreamStats};
use crate::telemetry::TelemetryReceiver;
use crate::transport::{ControlSocket, DatagramSink};
use crate::{LinkError, PeerEndpoint, Result, SessionEvent, SessionState, VideoFrame};

/// Result of spawning the driver
pub struct DriverChannels {
    /// Current session state
    pub state: watch::Receiver<SessionState>,
    /// Lifecycle events; subscribe for a receiver
    pub events: broadcast::Sender<SessionEvent>,
    /// Latest video frame
    pub frames: watch::Receiver<Option<Arc<VideoFrame>>>,
    /// Latest wheel speeds
    pub speeds: watch::Receiver<Option<SpeedReading>>,
    /// Latest measured frame rate
    pub fps: watch::Receiver<Option<f64>>,
    /// Stream counters
    pub stats: Arc<StreamStats>,
    /// Cancellation token for shutting everything down
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the session task
pub struct Driver {
    config: RoverConfig,
    controls: Arc<Controls>,
    ids: Arc<MessageIds>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    stream: StreamOutputs,
    speeds: watch::Sender<Option<SpeedReading>>,
}

/// How a single session ended
enum SessionEnd {
    Cancelled,
    Faulted(LinkError),
}

impl Driver {
    /// Spawn the session task.
    ///
    /// Must be called from within a tokio runtime. The task runs until the
    /// returned cancellation token fires.
    pub fn spawn(
        config: RoverConfig,
        controls: Arc<Controls>,
        ids: Arc<MessageIds>,
    ) -> DriverChannels {
        let (state_tx, state_rx) = watch::channel(SessionState::Discovering);
        let (events_tx, _) = broadcast::channel(config.event_capacity);
        let (frame_tx, frame_rx) = watch::channel(None);
        let (fps_tx, fps_rx) = watch::channel(None);
        let (speed_tx, speed_rx) = watch::channel(None);
        let stats = Arc::new(StreamStats::default());
        let cancel = CancellationToken::new();

        let driver = Driver {
            config,
            controls,
            ids,
            state: state_tx,
            events: events_tx.clone(),
            stream: StreamOutputs { frames: frame_tx, fps: fps_tx, stats: Arc::clone(&stats) },
            speeds: speed_tx,
        };

        let cancel_driver = cancel.clone();
        tokio::spawn(async move {
            driver.run(cancel_driver).await;
        });

        DriverChannels {
            state: state_rx,
            events: events_tx,
            frames: frame_rx,
            speeds: speed_rx,
            fps: fps_rx,
            stats,
            cancel,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        info!("Session driver started");
        let mut sessions = 0u64;

        loop {
            sessions += 1;
            match self.run_session(&cancel).await {
                SessionEnd::Cancelled => break,
                SessionEnd::Faulted(e) => {
                    error!("Session {} faulted: {}", sessions, e);
                    self.publish(SessionEvent::Faulted { reason: e.to_string() });
                    // Stream and telemetry tasks were cancelled when the session returned.

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.fault_backoff) => {}
                    }
                }
            }
        }

        info!("Session driver stopped after {} sessions", sessions);
    }

    async fn run_session(&self, cancel: &CancellationToken) -> SessionEnd {
        self.state.send_replace(SessionState::Discovering);
        self.publish(SessionEvent::DiscoveryStarted);

        let discovery = Discovery::new(&self.config);
        let Some(peer) = discovery.discover(cancel).await else {
            return SessionEnd::Cancelled;
        };

        self.state.send_replace(SessionState::AwaitingStart(peer));
        self.publish(SessionEvent::Discovered(peer));
        info!(peer = %peer, "Waiting for start trigger");

        tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            _ = self.controls.start_trigger.notified() => {}
        }

        let control = match ControlSocket::bind(peer.control_addr()).await {
            Ok(control) => control,
            Err(e) => {
                self.state.send_replace(SessionState::Faulted);
                return SessionEnd::Faulted(e);
            }
        };

        // Cancels the session's stream and telemetry tasks on every exit path.
        let session = cancel.child_token();
        let _session_guard = session.clone().drop_guard();
        self.spawn_session_tasks(peer, &control, &session);

        self.state.send_replace(SessionState::Active(peer));
        self.publish(SessionEvent::StreamingStarted(peer));

        let channel = CommandChannel::with_ids(
            control,
            Arc::clone(&self.controls.settings),
            Arc::clone(&self.ids),
        );

        let cadence = self.config.command_cadence;
        match dispatch_commands(&channel, &self.controls, cadence, cancel).await {
            Ok(()) => SessionEnd::Cancelled,
            Err(e) => {
                self.state.send_replace(SessionState::Faulted);
                SessionEnd::Faulted(e)
            }
        }
    }

    fn spawn_session_tasks(
        &self,
        peer: PeerEndpoint,
        control: &ControlSocket,
        session: &CancellationToken,
    ) {
        let puller = StreamPuller::new(peer.stream_addr(), self.stream.clone(), &self.config);
        tokio::spawn(puller.run(session.clone()));

        let receiver = TelemetryReceiver::new(
            control.socket(),
            self.speeds.clone(),
            self.config.telemetry_backoff,
            self.config.max_datagram_size,
        );
        tokio::spawn(receiver.run(session.clone()));

        debug!(peer = %peer, "Session tasks spawned");
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Command dispatch loop.
///
/// Waits for a command trigger, then sends the selected command. A held move
/// is resent every `cadence` until the selection changes to something that is
/// not a move; other commands go out once per trigger. Returns `Ok(())` when
/// cancelled and the send error when the control path fails.
pub async fn dispatch_commands<S: DatagramSink>(
    channel: &CommandChannel<S>,
    controls: &Controls,
    cadence: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = controls.command_trigger.notified() => {}
        }

        loop {
            if let Some(command) = controls.held() {
                let id = channel.send(command).await.inspect_err(|e| {
                    warn!(?command, "Command send failed: {}", e);
                })?;
                debug!(id, ?command, "Command sent");
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(cadence) => {}
            }

            if !controls.held().is_some_and(|command| command.is_held()) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use crate::command::tests::{FailingSink, RecordingSink};
    use crate::protocol::Opcode;

    const CADENCE: Duration = Duration::from_millis(200);

    fn spawn_dispatch(
        sink: RecordingSink,
        controls: Arc<Controls>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let channel = CommandChannel::new(sink, Arc::clone(&controls.settings));
            dispatch_commands(&channel, &controls, CADENCE, &cancel).await
        })
    }

    #[tokio::test(start_paused = true)]
    async fn held_move_repeats_at_cadence_until_released() {
        let sink = RecordingSink::default();
        let controls = Arc::new(Controls::default());
        let cancel = CancellationToken::new();
        let task = spawn_dispatch(sink.clone(), Arc::clone(&controls), cancel.clone());

        controls.trigger_command(Some(Command::FORWARD));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        controls.trigger_command(None);
        tokio::time::sleep(Duration::from_millis(2000)).await;

        let frames = sink.frames();
        assert_eq!(frames.len(), 6, "sends at 0, 200, ..., 1000 ms");
        assert!(frames.iter().all(|frame| frame.opcode == Opcode::Forward));
        let ids: Vec<u32> = frames.iter().map(|frame| frame.id).collect();
        assert_eq!(ids, (1..=6).collect::<Vec<_>>());

        let times = sink.times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= CADENCE);
        }

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_commands_are_sent_once() {
        let sink = RecordingSink::default();
        let controls = Arc::new(Controls::default());
        let cancel = CancellationToken::new();
        let task = spawn_dispatch(sink.clone(), Arc::clone(&controls), cancel.clone());

        controls.settings.set_speeds(-50, 120);
        controls.trigger_command(Some(Command::Set));
        tokio::time::sleep(Duration::from_secs(2)).await;
        controls.trigger_command(Some(Command::Flash));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let opcodes: Vec<Opcode> = sink.frames().iter().map(|frame| frame.opcode).collect();
        assert_eq!(opcodes, vec![Opcode::Set, Opcode::Flash]);

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_direction_keeps_repeating() {
        let sink = RecordingSink::default();
        let controls = Arc::new(Controls::default());
        let cancel = CancellationToken::new();
        let task = spawn_dispatch(sink.clone(), Arc::clone(&controls), cancel.clone());

        controls.trigger_command(Some(Command::LEFT));
        tokio::time::sleep(Duration::from_millis(500)).await;
        controls.trigger_command(Some(Command::RIGHT));
        tokio::time::sleep(Duration::from_millis(500)).await;
        controls.trigger_command(Some(Command::Stop));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let opcodes: Vec<Opcode> = sink.frames().iter().map(|frame| frame.opcode).collect();
        assert_eq!(opcodes.first(), Some(&Opcode::Left));
        assert!(opcodes.contains(&Opcode::Right));
        assert_eq!(opcodes.last(), Some(&Opcode::Stop));
        assert_eq!(opcodes.iter().filter(|op| **op == Opcode::Stop).count(), 1);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_press_sends_nothing() {
        let sink = RecordingSink::default();
        let controls = Arc::new(Controls::default());
        let cancel = CancellationToken::new();
        let task = spawn_dispatch(sink.clone(), Arc::clone(&controls), cancel.clone());

        controls.trigger_command(None);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.frames().is_empty());

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_ends_dispatch() {
        let controls = Controls::default();
        let channel = CommandChannel::new(FailingSink, Arc::clone(&controls.settings));
        controls.trigger_command(Some(Command::FORWARD));

        let err = dispatch_commands(&channel, &controls, CADENCE, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.class(), crate::ErrorClass::SessionFatal);
    }
}
