//! Output adapter: serial device first, OS synthetic input as fallback
//!
//! Relative moves and button presses go to the serial device when a
//! session is open. A failed send is logged and replayed through the OS
//! backend within the same call, so callers never see transport errors.
//! Keys and absolute moves always use the OS backend.

use evdev::Key;
use macrobridge_transport::SerialTransport;
use tracing::{debug, warn};

use crate::error::InputError;
use crate::os_input::{OsInput, ABS_MAX};
use crate::tracker::MouseButton;
use crate::window::WindowGeometry;

/// Routes logical output intents to the serial device or the OS
pub struct OutputAdapter {
    serial: SerialTransport,
    os: Box<dyn OsInput>,
    window: Option<WindowGeometry>,
    /// Last known pointer position, normalized to `0..=ABS_MAX`
    position: (i32, i32),
}

impl OutputAdapter {
    pub fn new(serial: SerialTransport, os: Box<dyn OsInput>) -> Self {
        Self {
            serial,
            os,
            window: None,
            position: (ABS_MAX / 2, ABS_MAX / 2),
        }
    }

    pub fn with_window(mut self, window: Option<WindowGeometry>) -> Self {
        self.window = window;
        self
    }

    pub fn set_window(&mut self, window: Option<WindowGeometry>) {
        self.window = window;
    }

    pub fn window(&self) -> Option<&WindowGeometry> {
        self.window.as_ref()
    }

    // ========================================================================
    // Serial session
    // ========================================================================

    pub fn connect(&mut self, port: &str) -> Result<(), macrobridge_transport::TransportError> {
        self.serial.connect(port)
    }

    pub fn disconnect(&mut self) {
        self.serial.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.serial.is_connected()
    }

    pub fn current_port(&self) -> Option<&str> {
        self.serial.current_port()
    }

    // ========================================================================
    // Output intents
    // ========================================================================

    /// Relative pointer move
    pub fn move_relative(&mut self, dx: i32, dy: i32) {
        self.track_relative(dx, dy);

        if self.serial.is_connected() {
            match self.serial.send_move(dx, dy) {
                Ok(()) => return,
                Err(e) => warn!("Serial move failed ({}), using OS input", e),
            }
        }
        log_os_failure("move", self.os.move_relative(dx, dy));
    }

    /// Move to a window-local position.
    ///
    /// OS input only. Without a window context this logs and does nothing.
    pub fn move_absolute(&mut self, x: i32, y: i32) {
        let Some(window) = self.window else {
            warn!("MoveMouseTo({}, {}) ignored: {}", x, y, InputError::NoWindowContext);
            return;
        };
        let Some((nx, ny)) = window.to_normalized(x, y) else {
            warn!("MoveMouseTo({}, {}) ignored: invalid screen size", x, y);
            return;
        };
        self.position = (nx, ny);
        log_os_failure("absolute move", self.os.move_absolute(nx, ny));
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.button(button, true);
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.button(button, false);
    }

    /// Keys are always software-emulated
    pub fn press_key(&mut self, key: Key) {
        log_os_failure("key press", self.os.key(key, true));
    }

    pub fn release_key(&mut self, key: Key) {
        log_os_failure("key release", self.os.key(key, false));
    }

    /// Last known normalized pointer position
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    fn button(&mut self, button: MouseButton, down: bool) {
        if self.serial.is_connected() {
            let sent = if down {
                self.serial.send_press(button.id())
            } else {
                self.serial.send_release(button.id())
            };
            match sent {
                Ok(()) => return,
                Err(e) => warn!(
                    "Serial button {} failed ({}), using OS input",
                    button.id(),
                    e
                ),
            }
        }
        log_os_failure("button", self.os.button(button, down));
    }

    fn track_relative(&mut self, dx: i32, dy: i32) {
        let Some(window) = self.window else {
            return;
        };
        let step = |pos: i32, delta: i32, extent: u32| -> i32 {
            if extent == 0 {
                return pos;
            }
            let scaled = i64::from(delta) * i64::from(ABS_MAX) / i64::from(extent);
            (i64::from(pos) + scaled).clamp(0, i64::from(ABS_MAX)) as i32
        };
        let (x, y) = self.position;
        self.position = (
            step(x, dx, window.screen_width),
            step(y, dy, window.screen_height),
        );
    }
}

fn log_os_failure(what: &str, result: Result<(), InputError>) {
    match result {
        Ok(()) => debug!("OS {}", what),
        Err(e) => warn!("OS {} failed: {}", what, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os_input::{OsAction, RecordingOsInput};
    use macrobridge_transport::mock::{MockLink, MockOpener};
    use macrobridge_transport::{decode_stream, LinkSettings, WireCommand};

    fn adapter(link: &MockLink) -> (OutputAdapter, RecordingOsInput) {
        let opener = MockOpener::new().with_port("/dev/ttyUSB0", link.clone());
        let serial = SerialTransport::with_opener(Box::new(opener), LinkSettings::default());
        let os = RecordingOsInput::new();
        (OutputAdapter::new(serial, Box::new(os.clone())), os)
    }

    #[test]
    fn test_disconnected_uses_os() {
        let link = MockLink::new();
        let (mut adapter, os) = adapter(&link);
        adapter.move_relative(3, 4);
        adapter.press_button(MouseButton::Left);
        assert_eq!(
            os.actions(),
            vec![
                OsAction::MoveRelative { dx: 3, dy: 4 },
                OsAction::Button {
                    button: MouseButton::Left,
                    down: true
                },
            ]
        );
        assert!(link.written().is_empty());
    }

    #[test]
    fn test_connected_uses_serial() {
        let link = MockLink::new();
        let (mut adapter, os) = adapter(&link);
        adapter.connect("/dev/ttyUSB0").unwrap();

        adapter.move_relative(300, -2);
        adapter.press_button(MouseButton::Side);
        adapter.release_button(MouseButton::Side);

        assert!(os.actions().is_empty());
        assert_eq!(
            decode_stream(&link.written()).unwrap(),
            vec![
                WireCommand::Move { dx: 127, dy: -2 },
                WireCommand::Press { button: 4 },
                WireCommand::Release { button: 4 },
            ]
        );
    }

    #[test]
    fn test_serial_failure_falls_back_once() {
        let link = MockLink::new();
        let (mut adapter, os) = adapter(&link);
        adapter.connect("/dev/ttyUSB0").unwrap();
        link.fail_writes(true);

        adapter.move_relative(10, 10);

        assert_eq!(os.actions(), vec![OsAction::MoveRelative { dx: 10, dy: 10 }]);
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_keys_never_use_serial() {
        let link = MockLink::new();
        let (mut adapter, os) = adapter(&link);
        adapter.connect("/dev/ttyUSB0").unwrap();
        adapter.press_key(Key::KEY_A);
        adapter.release_key(Key::KEY_A);
        assert!(link.written().is_empty());
        assert_eq!(os.actions().len(), 2);
    }

    #[test]
    fn test_absolute_without_window_is_noop() {
        let link = MockLink::new();
        let (mut adapter, os) = adapter(&link);
        adapter.move_absolute(100, 100);
        assert!(os.actions().is_empty());
    }

    #[test]
    fn test_absolute_with_window() {
        let link = MockLink::new();
        let (adapter, os) = adapter(&link);
        let mut adapter = adapter.with_window(Some(WindowGeometry {
            x: 0,
            y: 0,
            screen_width: 1920,
            screen_height: 1080,
        }));
        adapter.move_absolute(960, 540);
        assert_eq!(
            os.actions(),
            vec![OsAction::MoveAbsolute { x: 32767, y: 32767 }]
        );
        assert_eq!(adapter.position(), (32767, 32767));
    }

    #[test]
    fn test_huge_relative_moves_clamp_position() {
        let link = MockLink::new();
        let (adapter, os) = adapter(&link);
        let mut adapter = adapter.with_window(Some(WindowGeometry {
            x: 0,
            y: 0,
            screen_width: 1920,
            screen_height: 1080,
        }));
        adapter.move_relative(100_000, 0);
        adapter.move_relative(62_914_560, 0);
        assert_eq!(adapter.position(), (ABS_MAX, ABS_MAX / 2));

        adapter.move_relative(i32::MIN, i32::MAX);
        assert_eq!(adapter.position(), (0, ABS_MAX));
        assert_eq!(os.actions().len(), 3);
    }
}
