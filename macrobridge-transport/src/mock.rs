//! In-memory serial links for tests and dry runs
//!
//! `MockLink` records every byte written and can be told to fail or to
//! accept only part of a frame. Clones share state, so a test keeps one
//! handle while the transport owns the other.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::serial::{LinkSettings, PortOpener, SerialLink};

#[derive(Debug, Default)]
struct LinkState {
    written: Vec<u8>,
    fail_writes: bool,
    write_limit: Option<usize>,
    writes: usize,
}

/// Recording link with injectable failures
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All bytes accepted so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Number of write calls (successful or not)
    pub fn write_calls(&self) -> usize {
        self.state.lock().writes
    }

    /// Make every subsequent write return an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Accept at most `limit` bytes per write call
    pub fn limit_write(&self, limit: usize) {
        self.state.lock().write_limit = Some(limit);
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.writes += 1;
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock link down"));
        }
        let n = state.write_limit.map_or(buf.len(), |l| l.min(buf.len()));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shared open counter
#[derive(Debug, Clone, Default)]
pub struct OpenCount(Arc<AtomicUsize>);

impl OpenCount {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Opener that hands out registered mock links by port name
#[derive(Debug, Default)]
pub struct MockOpener {
    ports: HashMap<String, MockLink>,
    busy: Vec<String>,
    opens: OpenCount,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port that opens successfully
    pub fn with_port(mut self, port: &str, link: MockLink) -> Self {
        self.ports.insert(port.to_string(), link);
        self
    }

    /// Register a port that exists but is owned by someone else
    pub fn with_busy_port(mut self, port: &str) -> Self {
        self.busy.push(port.to_string());
        self
    }

    /// Handle counting successful opens
    pub fn open_count(&self) -> OpenCount {
        self.opens.clone()
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        port: &str,
        _settings: &LinkSettings,
    ) -> Result<Box<dyn SerialLink>, TransportError> {
        if self.busy.iter().any(|p| p == port) {
            return Err(TransportError::PortBusy(port.to_string()));
        }
        let link = self
            .ports
            .get(port)
            .cloned()
            .ok_or_else(|| TransportError::PortUnavailable(port.to_string()))?;
        self.opens.0.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(link))
    }
}
