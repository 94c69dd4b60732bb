//! Command opcodes

use super::DecodeError;

/// Single-byte command identifier carried at offset 5 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Stop = b's',
    Forward = b'+',
    Reverse = b'-',
    Left = b'l',
    Right = b'r',
    Flash = b'f',
    Ack = b'a',
    Set = b't',
    Deadzone = b'z',
}

impl Opcode {
    /// Wire byte for this opcode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Length of the payload that follows the header for commands sent by the controller.
    pub fn payload_len(self) -> usize {
        match self {
            Opcode::Forward | Opcode::Reverse | Opcode::Left | Opcode::Right => 1,
            Opcode::Flash => 1,
            Opcode::Set => 8,
            Opcode::Deadzone => 4,
            Opcode::Stop | Opcode::Ack => 0,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b's' => Ok(Opcode::Stop),
            b'+' => Ok(Opcode::Forward),
            b'-' => Ok(Opcode::Reverse),
            b'l' => Ok(Opcode::Left),
            b'r' => Ok(Opcode::Right),
            b'f' => Ok(Opcode::Flash),
            b'a' => Ok(Opcode::Ack),
            b't' => Ok(Opcode::Set),
            b'z' => Ok(Opcode::Deadzone),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Opcode; 9] = [
        Opcode::Stop,
        Opcode::Forward,
        Opcode::Reverse,
        Opcode::Left,
        Opcode::Right,
        Opcode::Flash,
        Opcode::Ack,
        Opcode::Set,
        Opcode::Deadzone,
    ];

    #[test]
    fn bytes_map_back_to_opcodes() {
        for opcode in ALL {
            assert_eq!(Opcode::try_from(opcode.as_byte()).unwrap(), opcode);
        }
    }

    #[test]
    fn wire_bytes_are_ascii_commands() {
        assert_eq!(Opcode::Stop.as_byte(), b's');
        assert_eq!(Opcode::Forward.as_byte(), b'+');
        assert_eq!(Opcode::Reverse.as_byte(), b'-');
        assert_eq!(Opcode::Set.as_byte(), b't');
        assert_eq!(Opcode::Deadzone.as_byte(), b'z');
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert!(matches!(Opcode::try_from(0), Err(DecodeError::UnknownOpcode(0))));
        assert!(matches!(Opcode::try_from(b'x'), Err(DecodeError::UnknownOpcode(b'x'))));
    }
}
