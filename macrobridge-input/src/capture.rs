//! Polling capture thread
//!
//! Samples the probe at a fixed cadence, runs the edge tracker and pushes
//! the resulting events into the shared queue. This is the only code that
//! runs off the dispatch thread; the queue is the only state it shares.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::probe::InputProbe;
use crate::queue::EventQueue;
use crate::tracker::StateTracker;

/// Running capture thread. Dropping it stops and joins the thread.
pub struct CaptureHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Signal the thread to stop and wait for it
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Start polling `probe` every `interval`
///
/// # Arguments
/// * `probe` - Live input state, refreshed once per tick
/// * `tracker` - Edge detector, owned by the capture thread from here on
/// * `queue` - Destination for press/release events
/// * `interval` - Poll period (1 ms for 1000 Hz)
pub fn spawn_capture(
    probe: Arc<dyn InputProbe>,
    mut tracker: StateTracker,
    queue: Arc<EventQueue>,
    interval: Duration,
) -> io::Result<CaptureHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let stop = shutdown.clone();

    let thread = thread::Builder::new()
        .name("input-capture".to_string())
        .spawn(move || {
            info!(
                "Input capture started ({} controls, {:?} interval)",
                tracker.controls().len(),
                interval
            );
            while !stop.load(Ordering::Relaxed) {
                probe.refresh();
                tracker.sample(
                    |control| probe.is_key_down(control.key()),
                    |event| {
                        debug!("Captured {}", event);
                        queue.push(event);
                    },
                );
                thread::sleep(interval);
            }
            info!("Input capture stopped");
        })?;

    Ok(CaptureHandle {
        shutdown,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::probe::ScriptedProbe;
    use crate::tracker::MouseButton;
    use std::time::Instant;

    fn wait_for(queue: &EventQueue, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while queue.len() < n && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_capture_pushes_edges() {
        let probe = ScriptedProbe::new();
        let queue = Arc::new(EventQueue::default());
        let handle = spawn_capture(
            Arc::new(probe.clone()),
            StateTracker::standard("f"),
            queue.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        probe.set_button(MouseButton::Middle, true);
        wait_for(&queue, 1);
        probe.set_button(MouseButton::Middle, false);
        wait_for(&queue, 2);
        handle.stop();

        let events = queue.drain(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), &EventKind::ButtonPressed);
        assert_eq!(events[1].kind(), &EventKind::ButtonReleased);
        assert!(events.iter().all(|e| e.argument() == 3));
    }
}
