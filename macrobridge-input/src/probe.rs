//! Live key, button and lock-state queries
//!
//! The capture thread polls a probe to feed the tracker, and script
//! capabilities such as `IsModifierPressed` query it directly.

use std::collections::HashSet;
use std::sync::Arc;

use evdev::Key;
use parking_lot::RwLock;

use crate::keys;
use crate::tracker::MouseButton;

/// Keyboard lock indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Caps,
    Num,
    Scroll,
}

impl LockKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "capslock" | "caps" => Some(LockKey::Caps),
            "numlock" | "num" => Some(LockKey::Num),
            "scrolllock" | "scroll" => Some(LockKey::Scroll),
            _ => None,
        }
    }
}

/// Source of instantaneous input state
pub trait InputProbe: Send + Sync {
    /// Re-read device state. Called once per capture tick.
    fn refresh(&self) {}

    fn is_key_down(&self, key: Key) -> bool;

    fn is_button_down(&self, button: MouseButton) -> bool {
        self.is_key_down(button.key())
    }

    fn is_lock_on(&self, lock: LockKey) -> bool;
}

/// Query a modifier by script name.
///
/// Bare names (`ctrl`, `shift`, `alt`, `gui`) match either side; `l`/`r`
/// prefixed names match one side. Returns `None` for non-modifier names.
pub fn is_modifier_pressed(probe: &dyn InputProbe, name: &str) -> Option<bool> {
    let name = name.trim().to_ascii_lowercase();
    let sides: &[Key] = match name.as_str() {
        "ctrl" => &[Key::KEY_LEFTCTRL, Key::KEY_RIGHTCTRL],
        "shift" => &[Key::KEY_LEFTSHIFT, Key::KEY_RIGHTSHIFT],
        "alt" => &[Key::KEY_LEFTALT, Key::KEY_RIGHTALT],
        "gui" | "win" => &[Key::KEY_LEFTMETA, Key::KEY_RIGHTMETA],
        "lctrl" | "rctrl" | "lshift" | "rshift" | "lalt" | "ralt" | "lgui" | "rgui" | "lwin"
        | "rwin" => {
            let key = keys::lookup_key(&name)?;
            return Some(probe.is_key_down(key));
        }
        _ => return None,
    };
    Some(sides.iter().any(|&k| probe.is_key_down(k)))
}

#[derive(Debug, Default)]
struct ProbeState {
    down: HashSet<Key>,
    locks: HashSet<LockKey>,
}

/// Probe whose state is set by hand.
///
/// Clones share state, so a test can flip buttons while the code under
/// test holds another handle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    state: Arc<RwLock<ProbeState>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&self, key: Key, down: bool) {
        let mut state = self.state.write();
        if down {
            state.down.insert(key);
        } else {
            state.down.remove(&key);
        }
    }

    pub fn set_button(&self, button: MouseButton, down: bool) {
        self.set_key(button.key(), down);
    }

    pub fn set_lock(&self, lock: LockKey, on: bool) {
        let mut state = self.state.write();
        if on {
            state.locks.insert(lock);
        } else {
            state.locks.remove(&lock);
        }
    }
}

impl InputProbe for ScriptedProbe {
    fn is_key_down(&self, key: Key) -> bool {
        self.state.read().down.contains(&key)
    }

    fn is_lock_on(&self, lock: LockKey) -> bool {
        self.state.read().locks.contains(&lock)
    }
}
