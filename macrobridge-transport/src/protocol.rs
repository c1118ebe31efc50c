//! Wire protocol for the output microcontroller
//!
//! Frames are `[opcode, payload...]` with no length prefix, checksum or
//! acknowledgment. The payload length is implied by the opcode, so the
//! encoder and the decoder both go through [`opcode::payload_len`].
//!
//! ```text
//! MOVE     0x01  dx:i8  dy:i8     (3 bytes)
//! PRESS    0x02  button:u8        (2 bytes)
//! RELEASE  0x03  button:u8        (2 bytes)
//! ```

use std::fmt;
use thiserror::Error;

/// Frame opcodes
pub mod opcode {
    pub const MOVE: u8 = 0x01;
    pub const PRESS: u8 = 0x02;
    pub const RELEASE: u8 = 0x03;

    /// Payload length implied by an opcode (excluding the opcode byte)
    pub const fn payload_len(op: u8) -> Option<usize> {
        match op {
            MOVE => Some(2),
            PRESS | RELEASE => Some(1),
            _ => None,
        }
    }

    /// Get human-readable name for an opcode
    pub fn name(op: u8) -> &'static str {
        match op {
            MOVE => "MOVE",
            PRESS => "PRESS",
            RELEASE => "RELEASE",
            _ => "UNKNOWN",
        }
    }
}

/// Largest frame on the wire (MOVE)
pub const MAX_FRAME_LEN: usize = 3;

/// Saturate a relative delta to the signed 8-bit range the device accepts.
///
/// Out-of-range values are clamped, never rejected.
pub fn clamp_delta(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// One device command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCommand {
    Move { dx: i8, dy: i8 },
    Press { button: u8 },
    Release { button: u8 },
}

impl WireCommand {
    /// Build a move command, saturating both axes to [-128, 127]
    pub fn move_saturating(dx: i32, dy: i32) -> Self {
        WireCommand::Move {
            dx: clamp_delta(dx),
            dy: clamp_delta(dy),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            WireCommand::Move { .. } => opcode::MOVE,
            WireCommand::Press { .. } => opcode::PRESS,
            WireCommand::Release { .. } => opcode::RELEASE,
        }
    }

    /// Encode into a stack frame
    pub fn encode(&self) -> Frame {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = self.opcode();
        match *self {
            WireCommand::Move { dx, dy } => {
                bytes[1] = dx as u8;
                bytes[2] = dy as u8;
            }
            WireCommand::Press { button } | WireCommand::Release { button } => {
                bytes[1] = button;
            }
        }
        let len = 1 + opcode::payload_len(bytes[0]).unwrap_or(0);
        Frame { bytes, len }
    }

    /// Decode one frame from the front of `data`.
    ///
    /// Returns the command and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        let op = *data.first().ok_or(DecodeError::Empty)?;
        let payload = opcode::payload_len(op).ok_or(DecodeError::UnknownOpcode(op))?;
        let len = 1 + payload;
        if data.len() < len {
            return Err(DecodeError::Truncated {
                opcode: op,
                expected: len,
                got: data.len(),
            });
        }
        let cmd = match op {
            opcode::MOVE => WireCommand::Move {
                dx: data[1] as i8,
                dy: data[2] as i8,
            },
            opcode::PRESS => WireCommand::Press { button: data[1] },
            _ => WireCommand::Release { button: data[1] },
        };
        Ok((cmd, len))
    }
}

impl fmt::Display for WireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireCommand::Move { dx, dy } => write!(f, "MOVE dx={dx} dy={dy}"),
            WireCommand::Press { button } => write!(f, "PRESS button={button}"),
            WireCommand::Release { button } => write!(f, "RELEASE button={button}"),
        }
    }
}

/// An encoded frame, kept on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Decode a byte stream holding back-to-back frames
pub fn decode_stream(mut data: &[u8]) -> Result<Vec<WireCommand>, DecodeError> {
    let mut commands = Vec::new();
    while !data.is_empty() {
        let (cmd, used) = WireCommand::decode(data)?;
        commands.push(cmd);
        data = &data[used..];
    }
    Ok(commands)
}

/// Frame decode errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("truncated frame 0x{opcode:02X}: expected {expected} bytes, got {got}")]
    Truncated {
        opcode: u8,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_frame_layout() {
        let frame = WireCommand::move_saturating(-5, 5).encode();
        assert_eq!(frame.as_bytes(), &[0x01, 0xFB, 0x05]);
    }

    #[test]
    fn test_press_release_layout() {
        assert_eq!(
            WireCommand::Press { button: 1 }.encode().as_bytes(),
            &[0x02, 0x01]
        );
        assert_eq!(
            WireCommand::Release { button: 5 }.encode().as_bytes(),
            &[0x03, 0x05]
        );
    }

    #[test]
    fn test_move_decodes_signed() {
        let frame = WireCommand::move_saturating(-5, 5).encode();
        let (cmd, used) = WireCommand::decode(frame.as_bytes()).unwrap();
        assert_eq!(used, 3);
        assert_eq!(cmd, WireCommand::Move { dx: -5, dy: 5 });
    }

    #[test]
    fn test_delta_saturates() {
        assert_eq!(clamp_delta(200), 127);
        assert_eq!(clamp_delta(-200), -128);
        assert_eq!(clamp_delta(127), 127);
        assert_eq!(clamp_delta(-128), -128);
        assert_eq!(
            WireCommand::move_saturating(200, -1000),
            WireCommand::Move { dx: 127, dy: -128 }
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(
            WireCommand::decode(&[0x7F, 0x00]),
            Err(DecodeError::UnknownOpcode(0x7F))
        );
    }

    #[test]
    fn test_truncated_move() {
        assert_eq!(
            WireCommand::decode(&[0x01, 0x05]),
            Err(DecodeError::Truncated {
                opcode: 0x01,
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_stream_decode() {
        let mut wire = Vec::new();
        wire.extend_from_slice(WireCommand::Press { button: 1 }.encode().as_bytes());
        wire.extend_from_slice(WireCommand::move_saturating(3, -4).encode().as_bytes());
        wire.extend_from_slice(WireCommand::Release { button: 1 }.encode().as_bytes());
        let cmds = decode_stream(&wire).unwrap();
        assert_eq!(
            cmds,
            vec![
                WireCommand::Press { button: 1 },
                WireCommand::Move { dx: 3, dy: -4 },
                WireCommand::Release { button: 1 },
            ]
        );
    }

    #[test]
    fn test_encoder_and_table_agree() {
        for cmd in [
            WireCommand::Move { dx: 0, dy: 0 },
            WireCommand::Press { button: 0 },
            WireCommand::Release { button: 0 },
        ] {
            let frame = cmd.encode();
            assert_eq!(
                frame.len(),
                1 + opcode::payload_len(cmd.opcode()).unwrap(),
                "{}",
                opcode::name(cmd.opcode())
            );
        }
    }
}
