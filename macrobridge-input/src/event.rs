//! Discrete input events handed from capture to the script handler

use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

/// What happened
///
/// Names follow the macro-script convention (`MOUSE_BUTTON_PRESSED`,
/// `G_PRESSED`, ...), so existing scripts keep matching on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    ButtonPressed,
    ButtonReleased,
    KeyPressed,
    KeyReleased,
    /// Host-originated events such as `PROFILE_ACTIVATED`
    Custom(Cow<'static, str>),
}

impl EventKind {
    pub const PROFILE_ACTIVATED: EventKind = EventKind::Custom(Cow::Borrowed("PROFILE_ACTIVATED"));
    pub const PROFILE_DEACTIVATED: EventKind =
        EventKind::Custom(Cow::Borrowed("PROFILE_DEACTIVATED"));

    /// Event name as seen by scripts
    pub fn script_name(&self) -> &str {
        match self {
            EventKind::ButtonPressed => "MOUSE_BUTTON_PRESSED",
            EventKind::ButtonReleased => "MOUSE_BUTTON_RELEASED",
            EventKind::KeyPressed => "G_PRESSED",
            EventKind::KeyReleased => "G_RELEASED",
            EventKind::Custom(name) => name,
        }
    }

    /// Parse a script-facing name; anything unrecognised becomes `Custom`
    pub fn from_script_name(name: &str) -> Self {
        match name {
            "MOUSE_BUTTON_PRESSED" => EventKind::ButtonPressed,
            "MOUSE_BUTTON_RELEASED" => EventKind::ButtonReleased,
            "G_PRESSED" => EventKind::KeyPressed,
            "G_RELEASED" => EventKind::KeyReleased,
            other => EventKind::Custom(Cow::Owned(other.to_string())),
        }
    }

    pub fn is_press(&self) -> bool {
        matches!(self, EventKind::ButtonPressed | EventKind::KeyPressed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name())
    }
}

/// One queued event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    kind: EventKind,
    argument: i64,
    timestamp: Instant,
}

impl InputEvent {
    /// Create an event stamped with the current monotonic time
    pub fn new(kind: EventKind, argument: i64) -> Self {
        Self::at(kind, argument, Instant::now())
    }

    pub fn at(kind: EventKind, argument: i64, timestamp: Instant) -> Self {
        Self {
            kind,
            argument,
            timestamp,
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn argument(&self) -> i64 {
        self.argument
    }

    /// Capture time. Informational only; queue order is arrival order.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_names_roundtrip() {
        for kind in [
            EventKind::ButtonPressed,
            EventKind::ButtonReleased,
            EventKind::KeyPressed,
            EventKind::KeyReleased,
            EventKind::PROFILE_ACTIVATED,
        ] {
            assert_eq!(EventKind::from_script_name(kind.script_name()), kind);
        }
    }

    #[test]
    fn test_custom_name() {
        let kind = EventKind::from_script_name("MY_EVENT");
        assert_eq!(kind.script_name(), "MY_EVENT");
        assert!(!kind.is_press());
    }

    #[test]
    fn test_display() {
        let ev = InputEvent::new(EventKind::ButtonPressed, 4);
        assert_eq!(ev.to_string(), "MOUSE_BUTTON_PRESSED(4)");
    }
}
