//! Input probe backed by /dev/input event devices
//!
//! Key and LED state are read with the evdev state ioctls on every
//! refresh and merged across all keyboards and mice, so a button held on
//! any device counts as down. Requires read access to /dev/input/event*.

use std::collections::HashSet;

use evdev::{AttributeSet, Device, Key, LedType};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::probe::{InputProbe, LockKey};
use crate::virtual_device::DEVICE_NAME_PREFIX;

struct Snapshot {
    keys: AttributeSet<Key>,
    locks: HashSet<LockKey>,
}

/// Probe over every physical keyboard and mouse on the system
pub struct EvdevProbe {
    devices: Vec<Mutex<Device>>,
    snapshot: RwLock<Snapshot>,
}

impl EvdevProbe {
    /// Open all event devices that report keys or buttons.
    ///
    /// Our own virtual devices are skipped so synthetic output never
    /// feeds back into capture.
    pub fn open() -> Result<Self, InputError> {
        let mut devices = Vec::new();
        for (path, device) in evdev::enumerate() {
            let name = device.name().unwrap_or("unknown").to_string();
            if name.starts_with(DEVICE_NAME_PREFIX) {
                continue;
            }
            let has_input = device.supported_keys().is_some_and(|keys| {
                keys.contains(Key::KEY_A) || keys.contains(Key::BTN_LEFT) || keys.contains(Key::KEY_KP0)
            });
            if has_input {
                debug!("Probing {} ({})", path.display(), name);
                devices.push(Mutex::new(device));
            }
        }

        if devices.is_empty() {
            return Err(InputError::DeviceScan(
                "no readable keyboard or mouse under /dev/input".to_string(),
            ));
        }
        info!("Input probe watching {} devices", devices.len());

        Ok(Self {
            devices,
            snapshot: RwLock::new(Snapshot {
                keys: AttributeSet::new(),
                locks: HashSet::new(),
            }),
        })
    }
}

impl InputProbe for EvdevProbe {
    fn refresh(&self) {
        let mut keys = AttributeSet::<Key>::new();
        let mut locks = HashSet::new();

        for device in &self.devices {
            let device = device.lock();
            match device.get_key_state() {
                Ok(state) => state.iter().for_each(|k| keys.insert(k)),
                Err(e) => warn!("Key state read failed: {}", e),
            }
            if let Ok(leds) = device.get_led_state() {
                if leds.contains(LedType::LED_CAPSL) {
                    locks.insert(LockKey::Caps);
                }
                if leds.contains(LedType::LED_NUML) {
                    locks.insert(LockKey::Num);
                }
                if leds.contains(LedType::LED_SCROLLL) {
                    locks.insert(LockKey::Scroll);
                }
            }
        }

        *self.snapshot.write() = Snapshot { keys, locks };
    }

    fn is_key_down(&self, key: Key) -> bool {
        self.snapshot.read().keys.contains(key)
    }

    fn is_lock_on(&self, lock: LockKey) -> bool {
        self.snapshot.read().locks.contains(&lock)
    }
}
