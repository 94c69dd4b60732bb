//! Core types shared by the link components.
//!
//! - [`PeerEndpoint`] is what discovery produces and every session consumes
//! - [`Command`] and [`Direction`] are what collaborators ask the rover to do
//! - [`Settings`] holds the values those commands carry
//! - [`VideoFrame`] is one pulled image datagram
//! - [`SessionState`] and [`SessionEvent`] describe the driver lifecycle
//! - [`UpdateRate`] controls how often frame subscribers are woken

mod command;
mod endpoint;
mod frame;
mod session;
mod settings;
mod update_rate;

pub use command::{Command, Direction};
pub use endpoint::PeerEndpoint;
pub use frame::VideoFrame;
pub use session::{SessionEvent, SessionState};
pub use settings::{DEFAULT_DEADZONE, DEFAULT_MOVE_SPEED_INCREMENT, Settings};
pub use update_rate::UpdateRate;
