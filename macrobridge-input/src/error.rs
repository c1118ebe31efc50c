//! Error types for input capture and synthetic output

use thiserror::Error;

/// Errors from OS-level input operations
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),
    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
    #[error("No window context for absolute positioning")]
    NoWindowContext,
    #[error("Unknown key name: {0}")]
    UnknownKey(String),
    #[error("Failed to scan input devices: {0}")]
    DeviceScan(String),
}
