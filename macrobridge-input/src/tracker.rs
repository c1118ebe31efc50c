//! Edge detector for the tracked controls
//!
//! Each poll hands the tracker an instantaneous down/up reading per
//! control. Only transitions produce events; repeated identical samples
//! produce nothing.

use evdev::Key;

use crate::event::{EventKind, InputEvent};
use crate::keys;

/// Mouse buttons by their script-facing id (1-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Left = 1,
    Right = 2,
    Middle = 3,
    Side = 4,
    Extra = 5,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Side,
        MouseButton::Extra,
    ];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(MouseButton::Left),
            2 => Some(MouseButton::Right),
            3 => Some(MouseButton::Middle),
            4 => Some(MouseButton::Side),
            5 => Some(MouseButton::Extra),
            _ => None,
        }
    }

    /// Id used in events and on the wire
    pub fn id(self) -> u8 {
        self as u8
    }

    /// evdev button code
    pub fn key(self) -> Key {
        match self {
            MouseButton::Left => Key::BTN_LEFT,
            MouseButton::Right => Key::BTN_RIGHT,
            MouseButton::Middle => Key::BTN_MIDDLE,
            MouseButton::Side => Key::BTN_SIDE,
            MouseButton::Extra => Key::BTN_EXTRA,
        }
    }
}

/// One physical control watched by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Mouse(MouseButton),
    /// Numeric keypad digit 0-9
    NumpadDigit(u8),
    /// Designated hotkey with the argument it reports
    Hotkey { key: Key, argument: i64 },
}

impl Control {
    /// Events (press, release) and argument for this control
    fn edge_event(&self, down: bool) -> InputEvent {
        let (press, release, argument) = match *self {
            Control::Mouse(button) => (
                EventKind::ButtonPressed,
                EventKind::ButtonReleased,
                button.id() as i64,
            ),
            Control::NumpadDigit(d) => (
                EventKind::ButtonPressed,
                EventKind::ButtonReleased,
                10 + d as i64,
            ),
            Control::Hotkey { argument, .. } => {
                (EventKind::KeyPressed, EventKind::KeyReleased, argument)
            }
        };
        InputEvent::new(if down { press } else { release }, argument)
    }

    /// evdev key code to sample for this control
    pub fn key(&self) -> Key {
        match *self {
            Control::Mouse(button) => button.key(),
            Control::NumpadDigit(d) => keys::keypad_digit(d).unwrap_or(Key::KEY_KP0),
            Control::Hotkey { key, .. } => key,
        }
    }
}

/// Press/release edge detector over a fixed control set
#[derive(Debug, Clone)]
pub struct StateTracker {
    controls: Vec<Control>,
    down: Vec<bool>,
}

impl StateTracker {
    /// Track `controls`, all starting in the up state
    pub fn new(controls: Vec<Control>) -> Self {
        let down = vec![false; controls.len()];
        Self { controls, down }
    }

    /// Keypad digits 0-9, the five mouse buttons and the hotkey
    ///
    /// # Arguments
    /// * `hotkey` - Key name from the key table; unknown names skip the hotkey
    pub fn standard(hotkey: &str) -> Self {
        let mut controls: Vec<Control> = (0..10).map(Control::NumpadDigit).collect();
        controls.extend(MouseButton::ALL.iter().copied().map(Control::Mouse));
        if let Some(key) = keys::lookup_key(hotkey) {
            controls.push(Control::Hotkey {
                key,
                argument: keys::hotkey_argument(hotkey, key),
            });
        }
        Self::new(controls)
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Sample every control once and emit an event per transition.
    ///
    /// # Arguments
    /// * `read` - Returns whether a control is currently down
    /// * `emit` - Receives each press/release edge in control order
    pub fn sample<R, E>(&mut self, mut read: R, mut emit: E)
    where
        R: FnMut(&Control) -> bool,
        E: FnMut(InputEvent),
    {
        for (control, was_down) in self.controls.iter().zip(self.down.iter_mut()) {
            let is_down = read(control);
            if is_down != *was_down {
                *was_down = is_down;
                emit(control.edge_event(is_down));
            }
        }
    }

    /// Forget all held state; the next sample treats everything as up
    pub fn reset(&mut self) {
        self.down.iter_mut().for_each(|d| *d = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut StateTracker, samples: &[bool]) -> Vec<InputEvent> {
        let mut out = Vec::new();
        for &s in samples {
            tracker.sample(|_| s, |e| out.push(e));
        }
        out
    }

    #[test]
    fn test_one_event_per_edge() {
        let mut tracker = StateTracker::new(vec![Control::Mouse(MouseButton::Side)]);
        let events = run(&mut tracker, &[false, true, true, true, false, false, true]);
        let kinds: Vec<_> = events.iter().map(|e| e.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ButtonPressed,
                EventKind::ButtonReleased,
                EventKind::ButtonPressed
            ]
        );
        assert!(events.iter().all(|e| e.argument() == 4));
    }

    #[test]
    fn test_starts_up() {
        let mut tracker = StateTracker::new(vec![Control::Mouse(MouseButton::Left)]);
        assert!(run(&mut tracker, &[false]).is_empty());
    }

    #[test]
    fn test_numpad_and_hotkey_arguments() {
        let mut tracker = StateTracker::standard("f");
        let mut out = Vec::new();
        tracker.sample(
            |c| matches!(c, Control::NumpadDigit(3) | Control::Hotkey { .. }),
            |e| out.push(e),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind(), &EventKind::ButtonPressed);
        assert_eq!(out[0].argument(), 13);
        assert_eq!(out[1].kind(), &EventKind::KeyPressed);
        assert_eq!(out[1].argument(), 70);
    }

    #[test]
    fn test_standard_control_count() {
        assert_eq!(StateTracker::standard("f").controls().len(), 16);
        assert_eq!(StateTracker::standard("bogus").controls().len(), 15);
    }

    #[test]
    fn test_reset() {
        let mut tracker = StateTracker::new(vec![Control::NumpadDigit(0)]);
        assert_eq!(run(&mut tracker, &[true]).len(), 1);
        tracker.reset();
        assert_eq!(run(&mut tracker, &[true]).len(), 1);
    }

    #[test]
    fn test_button_ids() {
        for button in MouseButton::ALL {
            assert_eq!(MouseButton::from_id(button.id() as i64), Some(button));
        }
        assert_eq!(MouseButton::from_id(0), None);
        assert_eq!(MouseButton::from_id(6), None);
    }
}
