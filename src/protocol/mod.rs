//! Rover wire protocol.
//!
//! Every command and acknowledgement on the control and stream sockets shares one
//! little-endian frame layout:
//!
//! ```text
//! [0]      len      u8      number of bytes that follow (5 + payload)
//! [1..5]   id       u32 LE  message id (always 0 for Ack)
//! [5]      opcode   u8      ASCII command byte
//! [6..]    payload  [u8]    opcode specific
//! ```
//!
//! Telemetry from the rover reuses the layout with an Ack opcode and two
//! little-endian `i32` wheel speeds as payload.

mod codec;
mod opcode;

pub use codec::{
    CommandFrame, DecodeError, SpeedReading, decode_telemetry, encode_ack, encode_deadzone,
    encode_flash, encode_move, encode_move_set, encode_move_stop,
};
pub use opcode::Opcode;

/// Size of the fixed header (`len`, `id`, `opcode`).
pub const HEADER_LEN: usize = 6;

/// Minimum size of a telemetry datagram carrying both wheel speeds.
pub const TELEMETRY_LEN: usize = 14;

/// ASCII probe broadcast by the controller.
pub const PROBE: &str = "CAM-ROVER:PROBE";

/// Prefix of a valid probe reply.
pub const PROBE_MATCH_PREFIX: &str = "CAM-ROVER:PROBE_MATCH:";
