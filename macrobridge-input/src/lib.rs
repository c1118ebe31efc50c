//! Input capture and synthetic output for macrobridge
//!
//! This crate provides:
//! - Press/release edge tracking over polled input state
//! - A bounded drop-oldest event queue shared with the dispatch loop
//! - Synthetic keyboard/mouse output via uinput
//! - An output adapter that prefers the serial device and falls back to the OS

pub mod adapter;
pub mod capture;
pub mod error;
pub mod event;
pub mod evdev_probe;
pub mod keys;
pub mod os_input;
pub mod probe;
pub mod queue;
pub mod tracker;
pub mod virtual_device;
pub mod window;

pub use adapter::OutputAdapter;
pub use capture::{spawn_capture, CaptureHandle};
pub use error::InputError;
pub use event::{EventKind, InputEvent};
pub use evdev::Key;
pub use evdev_probe::EvdevProbe;
pub use keys::lookup_key;
pub use os_input::{OsAction, OsInput, RecordingOsInput, ABS_MAX};
pub use probe::{is_modifier_pressed, InputProbe, LockKey, ScriptedProbe};
pub use queue::{EventQueue, QueueConfig};
pub use tracker::{Control, MouseButton, StateTracker};
pub use virtual_device::UinputOsInput;
pub use window::WindowGeometry;
