//! Synthetic keyboard and mouse using evdev/uinput
//!
//! Two virtual devices are created: a keyboard+relative mouse, and an
//! absolute pointer for `MoveMouseTo`. Splitting them keeps libinput from
//! classifying the relative mouse as a tablet.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
    UinputAbsSetup,
};
use tracing::info;

use crate::error::InputError;
use crate::os_input::{OsInput, ABS_MAX};
use crate::tracker::MouseButton;

/// Name prefix of every device we create
pub const DEVICE_NAME_PREFIX: &str = "macrobridge";

/// uinput-backed [`OsInput`]
pub struct UinputOsInput {
    relative: VirtualDevice,
    absolute: VirtualDevice,
}

impl UinputOsInput {
    /// Create both virtual devices
    pub fn new() -> Result<Self, InputError> {
        let mut keys = AttributeSet::<Key>::new();
        // Every keyboard code up to KEY_MICMUTE, plus the mouse buttons
        for code in 1..=Key::KEY_MICMUTE.code() {
            keys.insert(Key::new(code));
        }
        for button in MouseButton::ALL {
            keys.insert(button.key());
        }

        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        rel_axes.insert(RelativeAxisType::REL_X);
        rel_axes.insert(RelativeAxisType::REL_Y);
        rel_axes.insert(RelativeAxisType::REL_WHEEL);

        let relative = VirtualDeviceBuilder::new()
            .map_err(InputError::CreateDevice)?
            .name(&format!("{DEVICE_NAME_PREFIX} input"))
            .with_keys(&keys)
            .map_err(InputError::CreateDevice)?
            .with_relative_axes(&rel_axes)
            .map_err(InputError::CreateDevice)?
            .build()
            .map_err(InputError::CreateDevice)?;

        let mut pointer_keys = AttributeSet::<Key>::new();
        pointer_keys.insert(Key::BTN_LEFT);
        let absolute = VirtualDeviceBuilder::new()
            .map_err(InputError::CreateDevice)?
            .name(&format!("{DEVICE_NAME_PREFIX} pointer"))
            .with_keys(&pointer_keys)
            .map_err(InputError::CreateDevice)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_X, abs_range()))
            .map_err(InputError::CreateDevice)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_Y, abs_range()))
            .map_err(InputError::CreateDevice)?
            .build()
            .map_err(InputError::CreateDevice)?;

        info!("Created uinput devices");
        Ok(Self { relative, absolute })
    }

    fn emit_key(&mut self, key: Key, down: bool) -> Result<(), InputError> {
        let event = InputEvent::new_now(EventType::KEY, key.code(), down as i32);
        self.relative
            .emit(&[event])
            .map_err(InputError::EmitEvent)
    }
}

impl OsInput for UinputOsInput {
    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError> {
        self.emit_key(key, down)
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError> {
        self.emit_key(button.key(), down)
    }

    fn move_relative(&mut self, dx: i32, dy: i32) -> Result<(), InputError> {
        let mut events = Vec::with_capacity(2);
        if dx != 0 {
            events.push(InputEvent::new_now(
                EventType::RELATIVE,
                RelativeAxisType::REL_X.0,
                dx,
            ));
        }
        if dy != 0 {
            events.push(InputEvent::new_now(
                EventType::RELATIVE,
                RelativeAxisType::REL_Y.0,
                dy,
            ));
        }
        if events.is_empty() {
            return Ok(());
        }
        self.relative
            .emit(&events)
            .map_err(InputError::EmitEvent)
    }

    fn move_absolute(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        let events = [
            InputEvent::new_now(
                EventType::ABSOLUTE,
                AbsoluteAxisType::ABS_X.0,
                x.clamp(0, ABS_MAX),
            ),
            InputEvent::new_now(
                EventType::ABSOLUTE,
                AbsoluteAxisType::ABS_Y.0,
                y.clamp(0, ABS_MAX),
            ),
        ];
        self.absolute
            .emit(&events)
            .map_err(InputError::EmitEvent)
    }
}

fn abs_range() -> AbsInfo {
    AbsInfo::new(0, 0, ABS_MAX, 0, 0, 1)
}
