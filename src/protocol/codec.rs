//! Frame encoding and decoding
//!
//! Pure functions only: nothing here touches a socket or the id counter. Callers
//! pass the id they obtained from [`MessageIds`](crate::command::MessageIds).

use thiserror::Error;

use super::{HEADER_LEN, Opcode, TELEMETRY_LEN};
use crate::types::Direction;

/// Errors produced while decoding datagrams from the rover.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("declared length {declared} does not match {actual} trailing bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}

/// Wheel speeds reported by the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeedReading {
    pub left: i32,
    pub right: i32,
}

/// A decoded command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub id: u32,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl CommandFrame {
    /// Create a frame from its parts.
    pub fn new(id: u32, opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { id, opcode, payload }
    }

    /// Value of the leading length byte.
    pub fn declared_len(&self) -> u8 {
        // Payloads are at most 8 bytes, the sum always fits.
        (HEADER_LEN - 1 + self.payload.len()) as u8
    }

    /// Serialize to the wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.push(self.declared_len());
        bytes.extend_from_slice(&self.id.to_le_bytes());
        bytes.push(self.opcode.as_byte());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse a complete frame.
    ///
    /// The rover only accepts datagrams whose length byte accounts for exactly
    /// the bytes that follow it, so the same rule is applied here.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated { needed: HEADER_LEN, actual: bytes.len() });
        }

        let declared = bytes[0] as usize;
        if declared + 1 != bytes.len() {
            return Err(DecodeError::LengthMismatch { declared, actual: bytes.len() - 1 });
        }

        let id = read_u32(bytes, 1);
        let opcode = Opcode::try_from(bytes[5])?;

        Ok(Self { id, opcode, payload: bytes[HEADER_LEN..].to_vec() })
    }
}

/// Encode a directional move carrying the speed increment.
pub fn encode_move(direction: Direction, speed_increment: u8, id: u32) -> Vec<u8> {
    CommandFrame::new(id, direction.opcode(), vec![speed_increment]).to_bytes()
}

/// Encode a stop command.
pub fn encode_move_stop(id: u32) -> Vec<u8> {
    CommandFrame::new(id, Opcode::Stop, Vec::new()).to_bytes()
}

/// Encode an absolute wheel-speed command.
pub fn encode_move_set(speed_l: i32, speed_r: i32, id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&speed_l.to_le_bytes());
    payload.extend_from_slice(&speed_r.to_le_bytes());
    CommandFrame::new(id, Opcode::Set, payload).to_bytes()
}

/// Encode a motor deadzone update.
pub fn encode_deadzone(value: u32, id: u32) -> Vec<u8> {
    CommandFrame::new(id, Opcode::Deadzone, value.to_le_bytes().to_vec()).to_bytes()
}

/// Encode a camera flash duty update.
pub fn encode_flash(duty: u8, id: u32) -> Vec<u8> {
    CommandFrame::new(id, Opcode::Flash, vec![duty]).to_bytes()
}

/// Encode the frame request sent on the stream socket. Its id is always 0.
pub fn encode_ack() -> Vec<u8> {
    CommandFrame::new(0, Opcode::Ack, Vec::new()).to_bytes()
}

/// Decode wheel speeds from a telemetry datagram.
///
/// Accepts any datagram of at least [`TELEMETRY_LEN`] bytes whose length byte
/// does not claim more data than was received.
pub fn decode_telemetry(bytes: &[u8]) -> Result<SpeedReading, DecodeError> {
    let declared = bytes.first().map(|len| *len as usize + 1).unwrap_or(0);
    let needed = declared.max(TELEMETRY_LEN);

    if bytes.len() < needed {
        return Err(DecodeError::Truncated { needed, actual: bytes.len() });
    }

    Ok(SpeedReading { left: read_u32(bytes, 6) as i32, right: read_u32(bytes, 10) as i32 })
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn telemetry_frame(id: u32, left: i32, right: i32) -> Vec<u8> {
        let mut payload = left.to_le_bytes().to_vec();
        payload.extend_from_slice(&right.to_le_bytes());
        CommandFrame::new(id, Opcode::Ack, payload).to_bytes()
    }

    fn all_encodings(id: u32, increment: u8, l: i32, r: i32, dz: u32, duty: u8) -> Vec<Vec<u8>> {
        vec![
            encode_move(Direction::Forward, increment, id),
            encode_move(Direction::Reverse, increment, id),
            encode_move(Direction::Left, increment, id),
            encode_move(Direction::Right, increment, id),
            encode_move_stop(id),
            encode_move_set(l, r, id),
            encode_deadzone(dz, id),
            encode_flash(duty, id),
            encode_ack(),
        ]
    }

    proptest! {
        #[test]
        fn length_byte_counts_trailing_bytes(
            id in any::<u32>(),
            increment in any::<u8>(),
            l in any::<i32>(),
            r in any::<i32>(),
            dz in any::<u32>(),
            duty in any::<u8>(),
        ) {
            for frame in all_encodings(id, increment, l, r, dz, duty) {
                let parsed = CommandFrame::parse(&frame).unwrap();
                prop_assert_eq!(frame[0] as usize, frame.len() - 1);
                prop_assert_eq!(frame[0] as usize, 5 + parsed.payload.len());
                prop_assert_eq!(parsed.payload.len(), parsed.opcode.payload_len());
            }
        }

        #[test]
        fn telemetry_decodes_known_speeds(id in any::<u32>(), left in any::<i32>(), right in any::<i32>()) {
            let frame = telemetry_frame(id, left, right);
            prop_assert_eq!(decode_telemetry(&frame).unwrap(), SpeedReading { left, right });
        }

        #[test]
        fn telemetry_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
            let _ = decode_telemetry(&bytes);
        }
    }

    #[test]
    fn set_command_matches_reference_bytes() {
        let frame = encode_move_set(-50, 120, 7);
        assert_eq!(
            frame,
            vec![13, 0x07, 0x00, 0x00, 0x00, b't', 0xCE, 0xFF, 0xFF, 0xFF, 0x78, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn move_carries_increment() {
        assert_eq!(encode_move(Direction::Left, 4, 0x0102_0304), vec![6, 4, 3, 2, 1, b'l', 4]);
        assert_eq!(encode_flash(200, 1), vec![6, 1, 0, 0, 0, b'f', 200]);
        assert_eq!(encode_move_stop(2), vec![5, 2, 0, 0, 0, b's']);
        assert_eq!(encode_deadzone(30, 3), vec![9, 3, 0, 0, 0, b'z', 30, 0, 0, 0]);
    }

    #[test]
    fn ack_is_fixed() {
        assert_eq!(encode_ack(), vec![5, 0, 0, 0, 0, b'a']);
    }

    #[test]
    fn short_telemetry_is_truncated() {
        let frame = telemetry_frame(1, 10, -10);
        assert_eq!(
            decode_telemetry(&frame[..13]),
            Err(DecodeError::Truncated { needed: 14, actual: 13 })
        );
        assert_eq!(decode_telemetry(&[]), Err(DecodeError::Truncated { needed: 14, actual: 0 }));
    }

    #[test]
    fn overlong_declared_length_is_truncated() {
        let mut frame = telemetry_frame(1, 10, -10);
        frame[0] = 20;
        assert_eq!(
            decode_telemetry(&frame),
            Err(DecodeError::Truncated { needed: 21, actual: 14 })
        );
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut frame = telemetry_frame(9, 300, 301);
        frame.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(decode_telemetry(&frame).unwrap(), SpeedReading { left: 300, right: 301 });
    }

    #[test]
    fn parse_rejects_bad_frames() {
        assert!(matches!(CommandFrame::parse(&[5, 0, 0]), Err(DecodeError::Truncated { .. })));
        assert!(matches!(
            CommandFrame::parse(&[9, 0, 0, 0, 0, b's']),
            Err(DecodeError::LengthMismatch { declared: 9, actual: 5 })
        ));
        assert!(matches!(
            CommandFrame::parse(&[5, 0, 0, 0, 0, b'?']),
            Err(DecodeError::UnknownOpcode(b'?'))
        ));
    }
}
