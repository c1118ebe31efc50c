//! Transport error types

use crate::protocol::DecodeError;
use thiserror::Error;

/// Errors that can occur during serial transport operations
///
/// Every variant is recoverable: callers fall back to OS input or
/// reconnect, nothing here should terminate the process.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port not found: {0}")]
    PortUnavailable(String),

    #[error("Serial port busy or access denied: {0}")]
    PortBusy(String),

    #[error("Failed to configure serial port {port}: {reason}")]
    Configure { port: String, reason: String },

    #[error("Serial transport not connected")]
    NotConnected,

    #[error("Serial write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Partial serial write: {written} of {expected} bytes")]
    PartialWrite { written: usize, expected: usize },

    #[error("Serial write timed out")]
    Timeout,

    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serial port enumeration failed: {0}")]
    Enumerate(String),
}

impl TransportError {
    /// Map an open failure from the serial crate onto our taxonomy
    pub(crate) fn from_open(port: &str, e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => TransportError::PortUnavailable(port.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                TransportError::PortUnavailable(port.to_string())
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::PortBusy(format!("{port}: {e}"))
            }
            serialport::ErrorKind::Io(_) if is_busy(&e) => {
                TransportError::PortBusy(format!("{port}: {e}"))
            }
            _ => TransportError::Configure {
                port: port.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

fn is_busy(e: &serialport::Error) -> bool {
    let msg = e.to_string();
    msg.contains("busy") || msg.contains("EBUSY") || msg.contains("Resource temporarily")
}
