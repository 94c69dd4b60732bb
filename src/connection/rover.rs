//! Rover connection handle

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::MessageIds;
use crate::config::RoverConfig;
use crate::control::Controls;
use crate::driver::Driver;
use crate::protocol::SpeedReading;
use crate::stream::{StreamStats, ThrottleExt};
use crate::{
    Command, Direction, LinkError, PeerEndpoint, Result, SessionEvent, SessionState, Settings,
    UpdateRate, VideoFrame,
};

/// Connection to a camera rover.
///
/// Creating the connection starts discovery right away. Streaming begins once
/// [`start_streaming`](Self::start_streaming) is called and a rover has been
/// found; after a fault the connection rediscovers on its own. Every trigger
/// method returns immediately and may be called from any thread.
///
/// Dropping the handle stops every background task.
pub struct RoverConnection {
    /// Inputs read by the driver
    controls: Arc<Controls>,

    /// Message ids shared by every session of this connection
    ids: Arc<MessageIds>,

    /// Session state watch receiver
    state: watch::Receiver<SessionState>,

    /// Lifecycle event sender, subscribed per call to `events`
    events: broadcast::Sender<SessionEvent>,

    /// Frame watch receiver
    frames: watch::Receiver<Option<Arc<VideoFrame>>>,

    /// Wheel speed watch receiver
    speeds: watch::Receiver<Option<SpeedReading>>,

    /// Measured frame rate watch receiver
    fps: watch::Receiver<Option<f64>>,

    stats: Arc<StreamStats>,

    /// Cancellation token for stopping tasks
    cancel: CancellationToken,
}

impl RoverConnection {
    /// Validate `config` and spawn the session driver.
    pub async fn connect(config: RoverConfig) -> Result<Self> {
        config.validate()?;
        info!(discovery_addr = %config.discovery_addr, "Connecting to rover");

        let controls = Arc::new(Controls::default());
        let ids = Arc::new(MessageIds::new());
        let channels = Driver::spawn(config, Arc::clone(&controls), Arc::clone(&ids));

        Ok(Self {
            controls,
            ids,
            state: channels.state,
            events: channels.events,
            frames: channels.frames,
            speeds: channels.speeds,
            fps: channels.fps,
            stats: channels.stats,
            cancel: channels.cancel,
        })
    }

    /// Ask the driver to start streaming.
    ///
    /// Fired before a rover is discovered, the trigger is remembered and acted
    /// on as soon as discovery completes.
    pub fn start_streaming(&self) {
        debug!("Start streaming requested");
        self.controls.trigger_start();
    }

    /// Select the command to send and wake the dispatch loop.
    ///
    /// A move stays selected, and is resent at the command cadence, until
    /// another command or `None` replaces it. Other commands go out once.
    pub fn send_command(&self, command: Option<Command>) {
        self.controls.trigger_command(command);
    }

    /// Start moving in `direction` until [`release`](Self::release).
    pub fn hold(&self, direction: Direction) {
        self.send_command(Some(Command::Move(direction)));
    }

    /// Stop repeating the held move.
    pub fn release(&self) {
        self.send_command(None);
    }

    /// Store the flash duty and send it to the rover.
    pub fn flash(&self, duty: u8) {
        self.settings().set_camera_flash_duty(duty);
        self.send_command(Some(Command::Flash));
    }

    /// Store wheel speeds and send them with a `Set` command.
    pub fn send_speeds(&self, speed_l: i32, speed_r: i32) {
        self.settings().set_speeds(speed_l, speed_r);
        self.send_command(Some(Command::Set));
    }

    /// Store the motor deadzone and send it to the rover.
    pub fn send_deadzone(&self, value: u32) {
        self.settings().set_deadzone(value);
        self.send_command(Some(Command::Deadzone));
    }

    /// Drive both wheels at the mean of the last reported speeds.
    ///
    /// Before any telemetry has arrived both wheels are set to zero.
    pub fn center(&self) {
        let reading = self.latest_speeds().unwrap_or_default();
        let mean = ((i64::from(reading.left) + i64::from(reading.right)) / 2) as i32;
        self.send_speeds(mean, mean);
    }

    /// Command currently selected for dispatch.
    pub fn selected_command(&self) -> Option<Command> {
        self.controls.held()
    }

    /// Values carried by the next commands.
    pub fn settings(&self) -> &Settings {
        self.controls.settings()
    }

    pub fn set_move_speed_increment(&self, value: u8) {
        self.settings().set_move_speed_increment(value);
    }

    pub fn set_camera_flash_duty(&self, value: u8) {
        self.settings().set_camera_flash_duty(value);
    }

    pub fn set_speeds(&self, speed_l: i32, speed_r: i32) {
        self.settings().set_speeds(speed_l, speed_r);
    }

    pub fn set_deadzone(&self, value: u32) {
        self.settings().set_deadzone(value);
    }

    /// Subscribe to video frames.
    ///
    /// The stream yields the latest frame on subscription, if any, then every
    /// new one. With [`UpdateRate::Max`] frames arriving faster than the rate
    /// replace each other and only the newest is delivered. The throttle is
    /// chosen against the frame rate measured when subscribing.
    pub fn frames(&self, rate: UpdateRate) -> impl Stream<Item = Arc<VideoFrame>> + 'static {
        let frames = WatchStream::new(self.frames.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval(self.current_fps()) {
            None => frames.boxed(),
            Some(interval) => frames.throttle(interval).boxed(),
        }
    }

    /// Latest frame, if any has been received.
    pub fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frames.borrow().clone()
    }

    /// Wheel speed reports, starting with the latest one.
    pub fn speed_updates(&self) -> impl Stream<Item = SpeedReading> + 'static {
        WatchStream::new(self.speeds.clone()).filter_map(|opt| async move { opt })
    }

    pub fn latest_speeds(&self) -> Option<SpeedReading> {
        *self.speeds.borrow()
    }

    /// Measured frame rate, one value per measurement window.
    pub fn fps_updates(&self) -> impl Stream<Item = f64> + 'static {
        WatchStream::new(self.fps.clone()).filter_map(|opt| async move { opt })
    }

    pub fn current_fps(&self) -> Option<f64> {
        *self.fps.borrow()
    }

    /// Lifecycle events published after this call.
    ///
    /// A subscriber that falls more than `event_capacity` events behind skips
    /// the oldest ones. Use [`state`](Self::state) for the current phase.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} events skipped", skipped);
                    None
                }
            }
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Whether a rover has been found and is waiting for [`start_streaming`](Self::start_streaming).
    pub fn can_start(&self) -> bool {
        self.state.borrow().can_start()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Active(_))
    }

    /// Session state changes, starting with the current state.
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Wait until the session state satisfies `predicate`.
    ///
    /// Fails with [`LinkError::Closed`] once the connection is shut down.
    pub async fn wait_for_state<F>(&self, predicate: F) -> Result<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut state = self.state.clone();
        tokio::select! {
            _ = self.cancel.cancelled() => Err(LinkError::Closed),
            result = state.wait_for(predicate) => {
                result.map(|state| SessionState::clone(&state)).map_err(|_| LinkError::Closed)
            }
        }
    }

    /// Wait until streaming is active and return the rover being streamed.
    pub async fn wait_until_active(&self) -> Result<PeerEndpoint> {
        let state = self.wait_for_state(|state| matches!(state, SessionState::Active(_))).await?;
        state.peer().ok_or(LinkError::Closed)
    }

    /// Rover of the current session, once discovered.
    pub fn current_peer(&self) -> Option<PeerEndpoint> {
        self.state.borrow().peer()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Most recently issued message id (0 before the first command).
    pub fn last_message_id(&self) -> u32 {
        self.ids.last_id()
    }

    /// Stop every background task. The handle stays usable but inert.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("Shutting down rover connection");
            self.cancel.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RoverConnection {
    fn drop(&mut self) {
        debug!("Dropping rover connection");
        self.cancel.cancel();
    }
}
