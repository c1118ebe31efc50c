//! Key name table used by scripts and configuration
//!
//! Lookups are case-insensitive. Names follow the macro-script convention
//! (`lctrl`, `lgui`, `escape`, single letters and digits) with a few
//! common aliases.

use evdev::Key;

const LETTERS: [Key; 26] = [
    Key::KEY_A,
    Key::KEY_B,
    Key::KEY_C,
    Key::KEY_D,
    Key::KEY_E,
    Key::KEY_F,
    Key::KEY_G,
    Key::KEY_H,
    Key::KEY_I,
    Key::KEY_J,
    Key::KEY_K,
    Key::KEY_L,
    Key::KEY_M,
    Key::KEY_N,
    Key::KEY_O,
    Key::KEY_P,
    Key::KEY_Q,
    Key::KEY_R,
    Key::KEY_S,
    Key::KEY_T,
    Key::KEY_U,
    Key::KEY_V,
    Key::KEY_W,
    Key::KEY_X,
    Key::KEY_Y,
    Key::KEY_Z,
];

const DIGITS: [Key; 10] = [
    Key::KEY_0,
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
];

const KEYPAD: [Key; 10] = [
    Key::KEY_KP0,
    Key::KEY_KP1,
    Key::KEY_KP2,
    Key::KEY_KP3,
    Key::KEY_KP4,
    Key::KEY_KP5,
    Key::KEY_KP6,
    Key::KEY_KP7,
    Key::KEY_KP8,
    Key::KEY_KP9,
];

const FUNCTION: [Key; 12] = [
    Key::KEY_F1,
    Key::KEY_F2,
    Key::KEY_F3,
    Key::KEY_F4,
    Key::KEY_F5,
    Key::KEY_F6,
    Key::KEY_F7,
    Key::KEY_F8,
    Key::KEY_F9,
    Key::KEY_F10,
    Key::KEY_F11,
    Key::KEY_F12,
];

/// Numeric keypad key for a digit 0-9
pub fn keypad_digit(digit: u8) -> Option<Key> {
    KEYPAD.get(digit as usize).copied()
}

/// Resolve a key name to its evdev key code
pub fn lookup_key(name: &str) -> Option<Key> {
    let name = name.trim().to_ascii_lowercase();

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
            '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
            _ => None,
        };
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return n.checked_sub(1).and_then(|i| FUNCTION.get(i)).copied();
    }
    if let Some(d) = name
        .strip_prefix("numpad")
        .or_else(|| name.strip_prefix("num"))
        .and_then(|n| n.parse::<u8>().ok())
    {
        return keypad_digit(d);
    }

    let key = match name.as_str() {
        "ctrl" | "lctrl" => Key::KEY_LEFTCTRL,
        "rctrl" => Key::KEY_RIGHTCTRL,
        "shift" | "lshift" => Key::KEY_LEFTSHIFT,
        "rshift" => Key::KEY_RIGHTSHIFT,
        "alt" | "lalt" => Key::KEY_LEFTALT,
        "ralt" => Key::KEY_RIGHTALT,
        "lgui" | "lwin" | "gui" | "win" => Key::KEY_LEFTMETA,
        "rgui" | "rwin" => Key::KEY_RIGHTMETA,
        "up" => Key::KEY_UP,
        "down" => Key::KEY_DOWN,
        "left" => Key::KEY_LEFT,
        "right" => Key::KEY_RIGHT,
        "home" => Key::KEY_HOME,
        "end" => Key::KEY_END,
        "pageup" => Key::KEY_PAGEUP,
        "pagedown" => Key::KEY_PAGEDOWN,
        "insert" => Key::KEY_INSERT,
        "delete" => Key::KEY_DELETE,
        "capslock" => Key::KEY_CAPSLOCK,
        "numlock" => Key::KEY_NUMLOCK,
        "scrolllock" => Key::KEY_SCROLLLOCK,
        "space" | "spacebar" => Key::KEY_SPACE,
        "enter" | "return" => Key::KEY_ENTER,
        "escape" | "esc" => Key::KEY_ESC,
        "tab" => Key::KEY_TAB,
        "backspace" => Key::KEY_BACKSPACE,
        "app" | "menu" => Key::KEY_COMPOSE,
        "pause" => Key::KEY_PAUSE,
        "printscreen" => Key::KEY_SYSRQ,
        "minus" => Key::KEY_MINUS,
        "equal" => Key::KEY_EQUAL,
        _ => return None,
    };
    Some(key)
}

/// Event argument reported for a hotkey.
///
/// Single letters and digits report their uppercase character code
/// (`"f"` is 70); anything else reports the raw key code.
pub fn hotkey_argument(name: &str, key: Key) -> i64 {
    let mut chars = name.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase() as i64,
        _ => key.code() as i64,
    }
}
