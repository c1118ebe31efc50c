//! Bounded buffer of script log lines
//!
//! Every line is also forwarded to `tracing`; the buffer keeps the most
//! recent lines for display.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::info;

pub const DEFAULT_CAPACITY: usize = 500;

/// Ring of recent script output. Pushing never blocks for long and never fails.
#[derive(Debug)]
pub struct ScriptLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl Default for ScriptLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ScriptLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a message. Multi-line messages are split; trailing newlines dropped.
    pub fn push(&self, message: &str) {
        let mut lines = self.lines.lock();
        for line in message.trim_end_matches(['\r', '\n']).lines() {
            info!("[LUA] {}", line);
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let log = ScriptLog::new(3);
        for i in 0..5 {
            log.push(&format!("line {i}\n"));
        }
        assert_eq!(log.lines(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_multiline_and_clear() {
        let log = ScriptLog::default();
        log.push("a\nb\n");
        assert_eq!(log.len(), 2);
        log.clear();
        assert!(log.is_empty());
    }
}
