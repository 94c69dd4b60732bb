//! Commands accepted from the controlling collaborator

use crate::protocol::Opcode;

/// Direction of a held move command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
    Left,
    Right,
}

impl Direction {
    /// Wire opcode for this direction.
    pub fn opcode(self) -> Opcode {
        match self {
            Direction::Forward => Opcode::Forward,
            Direction::Reverse => Opcode::Reverse,
            Direction::Left => Opcode::Left,
            Direction::Right => Opcode::Right,
        }
    }
}

/// A command the dispatch loop can send on the control socket.
///
/// `Move` is re-sent at the command cadence for as long as it stays selected;
/// every other command goes out exactly once per trigger. Values for `Set`,
/// `Deadzone` and `Flash` are read from [`Settings`](crate::Settings) at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Move(Direction),
    Stop,
    Set,
    Deadzone,
    Flash,
}

impl Command {
    pub const FORWARD: Command = Command::Move(Direction::Forward);
    pub const REVERSE: Command = Command::Move(Direction::Reverse);
    pub const LEFT: Command = Command::Move(Direction::Left);
    pub const RIGHT: Command = Command::Move(Direction::Right);

    /// Whether the command is repeated while held.
    pub fn is_held(self) -> bool {
        matches!(self, Command::Move(_))
    }

    /// Wire opcode for this command.
    pub fn opcode(self) -> Opcode {
        match self {
            Command::Move(direction) => direction.opcode(),
            Command::Stop => Opcode::Stop,
            Command::Set => Opcode::Set,
            Command::Deadzone => Opcode::Deadzone,
            Command::Flash => Opcode::Flash,
        }
    }

    /// Recover a command from its opcode. `Ack` is not a command.
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Forward => Some(Command::FORWARD),
            Opcode::Reverse => Some(Command::REVERSE),
            Opcode::Left => Some(Command::LEFT),
            Opcode::Right => Some(Command::RIGHT),
            Opcode::Stop => Some(Command::Stop),
            Opcode::Set => Some(Command::Set),
            Opcode::Deadzone => Some(Command::Deadzone),
            Opcode::Flash => Some(Command::Flash),
            Opcode::Ack => None,
        }
    }
}
