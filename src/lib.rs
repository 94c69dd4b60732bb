//! Communications core for UDP camera rovers.
//!
//! Camrover Link finds a rover on the local network, pulls its video stream,
//! receives its wheel-speed telemetry and sends it drive commands, recovering
//! from lost packets and rover reboots on its own.
//!
//! # Features
//!
//! - **Discovery**: multicast or broadcast probe with automatic retry
//! - **Ack-driven video**: one frame per acknowledgement, fresh socket on every stall
//! - **Held commands**: moves repeat at a fixed cadence until released
//! - **Streams**: frames, speeds, frame rate and lifecycle events as `futures::Stream`
//!
//! ## Example
//!
//! ```rust,no_run
//! use camrover_link::{Direction, Rover, RoverConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> camrover_link::Result<()> {
//!     let connection = Rover::connect(RoverConfig::default()).await?;
//!     connection.start_streaming();
//!
//!     let peer = connection.wait_until_active().await?;
//!     println!("Streaming from {peer}");
//!
//!     connection.hold(Direction::Forward);
//!     let mut frames = connection.frames(UpdateRate::Max(10));
//!     while let Some(frame) = frames.next().await {
//!         println!("frame {} ({} bytes)", frame.sequence, frame.len());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod protocol;
pub mod types;

// Session components
pub mod command;
pub mod connection;
pub mod control;
pub mod discovery;
pub mod driver;
pub mod stream;
pub mod telemetry;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::RoverConfig;
pub use connection::RoverConnection;
pub use protocol::SpeedReading;

/// Entry point for rover connections.
///
/// ```rust,no_run
/// use camrover_link::{Rover, RoverConfig};
///
/// #[tokio::main]
/// async fn main() -> camrover_link::Result<()> {
///     let config = RoverConfig::load("rover.yaml")?;
///     let connection = Rover::connect(config).await?;
///     connection.start_streaming();
///     Ok(())
/// }
/// ```
pub struct Rover;

impl Rover {
    /// Start discovering a rover.
    ///
    /// Returns as soon as the background tasks are running; nothing is sent to
    /// the rover until [`RoverConnection::start_streaming`] is called.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub async fn connect(config: RoverConfig) -> Result<RoverConnection> {
        RoverConnection::connect(config).await
    }
}
