//! Serial session to the output microcontroller
//!
//! At most one session is open at a time. A session is created by
//! [`SerialTransport::connect`] and destroyed by [`SerialTransport::disconnect`]
//! or by the first failed write; reconnecting always opens a fresh handle.

use std::io::{self, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::protocol::WireCommand;

/// Fixed link speed of the device firmware
pub const BAUD_RATE: u32 = 921_600;

/// Upper bound on a single frame write
pub const WRITE_TIMEOUT_MS: u64 = 50;

/// A writable byte link to the device.
///
/// Anything `Write + Send` qualifies, which covers the serial crate's port
/// handles as well as in-memory links used in tests.
pub trait SerialLink: Write + Send {}

impl<T: Write + Send + ?Sized> SerialLink for T {}

/// Line settings for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub write_timeout_ms: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            write_timeout_ms: WRITE_TIMEOUT_MS,
        }
    }
}

/// Opens links by port identifier
pub trait PortOpener: Send {
    /// Open and configure `port`.
    ///
    /// On failure no handle may be left open.
    fn open(&self, port: &str, settings: &LinkSettings)
        -> Result<Box<dyn SerialLink>, TransportError>;
}

/// Opens real serial devices: 8 data bits, 1 stop bit, no parity, DTR/RTS asserted
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        port: &str,
        settings: &LinkSettings,
    ) -> Result<Box<dyn SerialLink>, TransportError> {
        let mut link = serialport::new(port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(settings.write_timeout_ms))
            .open()
            .map_err(|e| TransportError::from_open(port, e))?;

        // The handle is dropped (closed) if either line cannot be asserted
        let configure = |e: serialport::Error| TransportError::Configure {
            port: port.to_string(),
            reason: e.to_string(),
        };
        link.write_data_terminal_ready(true).map_err(configure)?;
        link.write_request_to_send(true).map_err(configure)?;

        Ok(Box::new(link))
    }
}

/// Live session state
struct SerialSession {
    link: Box<dyn SerialLink>,
    port: String,
}

/// Framed serial client with connect/disconnect lifecycle
pub struct SerialTransport {
    opener: Box<dyn PortOpener>,
    settings: LinkSettings,
    session: Option<SerialSession>,
}

impl SerialTransport {
    /// Create a disconnected transport backed by real serial devices
    pub fn new(settings: LinkSettings) -> Self {
        Self::with_opener(Box::new(SystemPortOpener), settings)
    }

    /// Create a disconnected transport with a custom opener
    pub fn with_opener(opener: Box<dyn PortOpener>, settings: LinkSettings) -> Self {
        Self {
            opener,
            settings,
            session: None,
        }
    }

    /// Open a session on `port`.
    ///
    /// Connecting to the port that is already connected is a no-op. Any other
    /// open session is closed first. On failure the transport is left
    /// disconnected with no handle open.
    pub fn connect(&mut self, port: &str) -> Result<(), TransportError> {
        if self.current_port() == Some(port) {
            debug!("Already connected to {}", port);
            return Ok(());
        }

        self.disconnect();

        info!("Connecting to serial port {}", port);
        let link = self.opener.open(port, &self.settings).map_err(|e| {
            warn!("Serial connect to {} failed: {}", port, e);
            e
        })?;

        self.session = Some(SerialSession {
            link,
            port: port.to_string(),
        });
        info!("Connected to {} at {} baud", port, self.settings.baud_rate);
        Ok(())
    }

    /// Close the session, if any. Always safe to call.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Disconnected from {}", session.port);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_port(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.port.as_str())
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Send a relative move; deltas are saturated to [-128, 127]
    pub fn send_move(&mut self, dx: i32, dy: i32) -> Result<(), TransportError> {
        self.send(WireCommand::move_saturating(dx, dy))
    }

    pub fn send_press(&mut self, button: u8) -> Result<(), TransportError> {
        self.send(WireCommand::Press { button })
    }

    pub fn send_release(&mut self, button: u8) -> Result<(), TransportError> {
        self.send(WireCommand::Release { button })
    }

    /// Write one frame. Any error or short write ends the session.
    pub fn send(&mut self, cmd: WireCommand) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        let frame = cmd.encode();
        let expected = frame.len();

        let result = match session.link.write(frame.as_bytes()) {
            Ok(written) if written == expected => session.link.flush().map_err(write_error),
            Ok(written) => Err(TransportError::PartialWrite { written, expected }),
            Err(e) => Err(write_error(e)),
        };

        match result {
            Ok(()) => {
                debug!("Serial {}", cmd);
                Ok(())
            }
            Err(e) => {
                warn!("Serial {} failed on {}: {}", cmd, session.port, e);
                self.disconnect();
                Err(e)
            }
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn write_error(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::TimedOut {
        TransportError::Timeout
    } else {
        TransportError::Write(e)
    }
}

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: Option<String>,
}

/// List serial ports present on the system
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports =
        serialport::available_ports().map_err(|e| TransportError::Enumerate(e.to_string()))?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(usb) => Some(format!(
                    "USB {:04x}:{:04x} {}",
                    usb.vid,
                    usb.pid,
                    usb.product
                        .or(usb.manufacturer)
                        .unwrap_or_else(|| "unknown".to_string())
                )),
                SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
                SerialPortType::PciPort => Some("PCI".to_string()),
                SerialPortType::Unknown => None,
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect())
}
