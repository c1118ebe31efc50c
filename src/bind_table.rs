//! Labels for the programmable macro slots
//!
//! Pure configuration data: 10 programmable keys (F1-F10) and 3 auxiliary
//! mouse buttons (MB4-MB6), each with a human-readable label. Nothing in
//! the engine executes on these; they exist for display.

use serde::{Deserialize, Serialize};

pub const SLOT_COUNT: usize = 13;

pub const UNASSIGNED: &str = "Unassigned";

/// Slot names in table order
pub const SLOT_NAMES: [&str; SLOT_COUNT] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "MB4", "MB5", "MB6",
];

/// Fixed-size slot → label table.
///
/// Serialized as a plain list; short lists are padded with
/// `"Unassigned"` and extra entries ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct BindTable {
    labels: [String; SLOT_COUNT],
}

impl Default for BindTable {
    fn default() -> Self {
        Self {
            labels: std::array::from_fn(|_| UNASSIGNED.to_string()),
        }
    }
}

impl From<Vec<String>> for BindTable {
    fn from(labels: Vec<String>) -> Self {
        let mut table = Self::default();
        for (slot, label) in table.labels.iter_mut().zip(labels) {
            *slot = label;
        }
        table
    }
}

impl From<BindTable> for Vec<String> {
    fn from(table: BindTable) -> Self {
        table.labels.into()
    }
}

impl BindTable {
    /// Label for a slot index, if in range
    pub fn label(&self, slot: usize) -> Option<&str> {
        self.labels.get(slot).map(String::as_str)
    }

    /// Label by slot name (`"F3"`, `"mb5"`)
    pub fn label_by_name(&self, name: &str) -> Option<&str> {
        let slot = slot_index(name)?;
        self.label(slot)
    }

    /// Set a slot label. Returns false if the slot is out of range.
    pub fn set(&mut self, slot: usize, label: impl Into<String>) -> bool {
        match self.labels.get_mut(slot) {
            Some(entry) => {
                *entry = label.into();
                true
            }
            None => false,
        }
    }

    /// (slot name, label) pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        SLOT_NAMES
            .iter()
            .copied()
            .zip(self.labels.iter().map(String::as_str))
    }
}

fn slot_index(name: &str) -> Option<usize> {
    SLOT_NAMES
        .iter()
        .position(|slot| slot.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_unassigned() {
        let table = BindTable::default();
        assert!(table.iter().all(|(_, label)| label == UNASSIGNED));
        assert_eq!(table.iter().count(), SLOT_COUNT);
    }

    #[test]
    fn test_set_and_lookup() {
        let mut table = BindTable::default();
        assert!(table.set(10, "Rapid fire"));
        assert!(!table.set(SLOT_COUNT, "nope"));
        assert_eq!(table.label_by_name("mb4"), Some("Rapid fire"));
        assert_eq!(table.label_by_name("F11"), None);
    }

    #[test]
    fn test_short_list_padded() {
        let table = BindTable::from(vec!["One".to_string(), "Two".to_string()]);
        assert_eq!(table.label(0), Some("One"));
        assert_eq!(table.label(1), Some("Two"));
        assert_eq!(table.label(2), Some(UNASSIGNED));
    }
}
