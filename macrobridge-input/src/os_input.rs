//! OS-level synthetic input backend

use std::sync::Arc;

use evdev::Key;
use parking_lot::Mutex;

use crate::error::InputError;
use crate::tracker::MouseButton;

/// Upper bound of the normalized absolute pointer range
pub const ABS_MAX: i32 = 65535;

/// Sink for software-emulated input
pub trait OsInput: Send {
    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError>;

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError>;

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), InputError>;

    /// Move to a normalized screen position, both axes in `0..=ABS_MAX`
    fn move_absolute(&mut self, x: i32, y: i32) -> Result<(), InputError>;
}

/// One call recorded by [`RecordingOsInput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsAction {
    Key { key: Key, down: bool },
    Button { button: MouseButton, down: bool },
    MoveRelative { dx: i32, dy: i32 },
    MoveAbsolute { x: i32, y: i32 },
}

/// Backend that records calls instead of emitting them.
///
/// Clones share the action log.
#[derive(Debug, Clone, Default)]
pub struct RecordingOsInput {
    actions: Arc<Mutex<Vec<OsAction>>>,
}

impl RecordingOsInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<OsAction> {
        self.actions.lock().clone()
    }

    pub fn take(&self) -> Vec<OsAction> {
        std::mem::take(&mut *self.actions.lock())
    }

    fn record(&self, action: OsAction) -> Result<(), InputError> {
        self.actions.lock().push(action);
        Ok(())
    }
}

impl OsInput for RecordingOsInput {
    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError> {
        self.record(OsAction::Key { key, down })
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError> {
        self.record(OsAction::Button { button, down })
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), InputError> {
        self.record(OsAction::MoveRelative { dx, dy })
    }

    fn move_absolute(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.record(OsAction::MoveAbsolute { x, y })
    }
}
