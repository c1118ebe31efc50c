//! Serial transport for the macrobridge output microcontroller
//!
//! The device sits on a point-to-point serial link and turns compact
//! fire-and-forget frames into USB mouse reports:
//!
//! ```text
//! [OutputAdapter] → SerialTransport → WireCommand frames → /dev/ttyUSBx → MCU
//! ```
//!
//! There is no acknowledgment on the wire; the only failure signal is the
//! write call itself, so any write error or short write ends the session.

pub mod error;
pub mod mock;
pub mod protocol;
pub mod serial;

pub use error::TransportError;
pub use protocol::{clamp_delta, decode_stream, opcode, DecodeError, Frame, WireCommand};
pub use serial::{
    list_ports, LinkSettings, PortInfo, PortOpener, SerialLink, SerialTransport,
    SystemPortOpener, BAUD_RATE, WRITE_TIMEOUT_MS,
};
