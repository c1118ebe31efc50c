//! Bounded event queue between the capture thread and the dispatch loop
//!
//! One lock guards push and drain. When the queue reaches its high
//! watermark the oldest events are evicted down to the low watermark
//! before the new event is appended, so the producer is never blocked
//! by a slow consumer and the newest input always survives.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::event::InputEvent;

pub const DEFAULT_HIGH_WATERMARK: usize = 1000;
pub const DEFAULT_LOW_WATERMARK: usize = 800;
pub const DEFAULT_BACKLOG_THRESHOLD: usize = 50;
pub const DEFAULT_BACKLOG_COOLDOWN: Duration = Duration::from_secs(1);

/// Queue sizing and backlog reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub high_watermark: usize,
    pub low_watermark: usize,
    pub backlog_threshold: usize,
    pub backlog_cooldown: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_watermark: DEFAULT_HIGH_WATERMARK,
            low_watermark: DEFAULT_LOW_WATERMARK,
            backlog_threshold: DEFAULT_BACKLOG_THRESHOLD,
            backlog_cooldown: DEFAULT_BACKLOG_COOLDOWN,
        }
    }
}

impl QueueConfig {
    /// Force `0 < high` and `low < high`
    fn normalized(mut self) -> Self {
        self.high_watermark = self.high_watermark.max(1);
        if self.low_watermark >= self.high_watermark {
            self.low_watermark = self.high_watermark - 1;
        }
        self
    }
}

/// Rate-limited "queue is backing up" reporter.
///
/// Fires once the depth has stayed above the threshold for a full
/// cooldown window, then at most once per window while it stays there.
#[derive(Debug)]
pub struct BacklogMonitor {
    threshold: usize,
    cooldown: Duration,
    above_since: Option<Instant>,
    last_report: Option<Instant>,
}

impl BacklogMonitor {
    pub fn new(threshold: usize, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            above_since: None,
            last_report: None,
        }
    }

    /// Feed one depth sample. Returns true when a report is due.
    pub fn observe(&mut self, depth: usize, now: Instant) -> bool {
        if depth <= self.threshold {
            self.above_since = None;
            return false;
        }

        let since = *self.above_since.get_or_insert(now);
        if now.duration_since(since) < self.cooldown {
            return false;
        }
        if let Some(last) = self.last_report {
            if now.duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last_report = Some(now);
        true
    }
}

struct Inner {
    events: VecDeque<InputEvent>,
    dropped: u64,
    monitor: BacklogMonitor,
}

/// Thread-safe drop-oldest FIFO of input events
pub struct EventQueue {
    config: QueueConfig,
    inner: Mutex<Inner>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl EventQueue {
    pub fn new(config: QueueConfig) -> Self {
        let config = config.normalized();
        let monitor = BacklogMonitor::new(config.backlog_threshold, config.backlog_cooldown);
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(config.high_watermark),
                dropped: 0,
                monitor,
            }),
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append an event, evicting the oldest entries first if the queue is full
    pub fn push(&self, event: InputEvent) {
        let mut inner = self.inner.lock();
        if inner.events.len() >= self.config.high_watermark {
            let evict = inner.events.len() - self.config.low_watermark;
            inner.events.drain(..evict);
            inner.dropped += evict as u64;
            debug!("Event queue full, dropped {} oldest events", evict);
        }
        inner.events.push_back(event);
    }

    /// Remove and return up to `max` oldest events in FIFO order
    pub fn drain(&self, max: usize) -> Vec<InputEvent> {
        let mut out = Vec::with_capacity(max.min(self.config.high_watermark));
        self.drain_into(max, &mut out);
        out
    }

    /// Like [`drain`](Self::drain) but appends into a caller-owned buffer.
    ///
    /// Returns the number of events moved.
    pub fn drain_into(&self, max: usize, out: &mut Vec<InputEvent>) -> usize {
        let mut inner = self.inner.lock();
        let depth = inner.events.len();
        if inner.monitor.observe(depth, Instant::now()) {
            warn!(
                "Event queue backlog: {} events pending (threshold {})",
                depth, self.config.backlog_threshold
            );
        }
        let n = max.min(depth);
        out.extend(inner.events.drain(..n));
        n
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Total events evicted by overflow since creation
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn clear(&self) {
        self.inner.lock().events.clear();
    }
}
