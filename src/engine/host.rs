//! Host services shared by every script environment
//!
//! The host outlives reloads: the output adapter (and with it the serial
//! session), the input probe, the log and the control channel all
//! survive a script being torn down and rebuilt. It lives on the
//! dispatch thread only, hence `Rc`/`RefCell` rather than locks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use macrobridge_input::{InputProbe, MouseButton, OutputAdapter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::control::{ControlMessage, ControlReceiver};
use crate::script_log::ScriptLog;

/// Pump period inside cooperative sleeps
pub const PUMP_INTERVAL: Duration = Duration::from_millis(1);

/// Settle time after the trigger button is released in `Sleep_extra`
pub const RELEASE_SETTLE: Duration = Duration::from_millis(300);

/// Dispatch-thread services behind the script capabilities
pub struct Host {
    adapter: RefCell<OutputAdapter>,
    probe: Arc<dyn InputProbe>,
    log: Arc<ScriptLog>,
    control: Option<RefCell<ControlReceiver>>,
    deferred: RefCell<VecDeque<ControlMessage>>,
    randomize: Cell<bool>,
    primary_events: Cell<bool>,
    rng: RefCell<StdRng>,
    started: Instant,
}

impl Host {
    pub fn new(adapter: OutputAdapter, probe: Arc<dyn InputProbe>, log: Arc<ScriptLog>) -> Self {
        Self {
            adapter: RefCell::new(adapter),
            probe,
            log,
            control: None,
            deferred: RefCell::new(VecDeque::new()),
            randomize: Cell::new(false),
            primary_events: Cell::new(true),
            rng: RefCell::new(StdRng::from_entropy()),
            started: Instant::now(),
        }
    }

    /// Attach the control channel drained by [`pump`](Self::pump)
    pub fn with_control(mut self, control: ControlReceiver) -> Self {
        self.control = Some(RefCell::new(control));
        self
    }

    pub fn with_randomization(self, enabled: bool) -> Self {
        self.randomize.set(enabled);
        self
    }

    /// Use a fixed jitter seed (tests)
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.borrow_mut() = StdRng::seed_from_u64(seed);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn adapter(&self) -> std::cell::RefMut<'_, OutputAdapter> {
        self.adapter.borrow_mut()
    }

    pub fn probe(&self) -> &dyn InputProbe {
        self.probe.as_ref()
    }

    pub fn log(&self) -> &ScriptLog {
        &self.log
    }

    pub fn randomization(&self) -> bool {
        self.randomize.get()
    }

    pub fn set_randomization(&self, enabled: bool) {
        if self.randomize.replace(enabled) != enabled {
            info!(
                "Input randomization {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn primary_events(&self) -> bool {
        self.primary_events.get()
    }

    pub fn set_primary_events(&self, enabled: bool) {
        self.primary_events.set(enabled);
    }

    /// Milliseconds since the host was created
    pub fn running_time_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.probe.is_button_down(button)
    }

    /// Apply jitter of ±1 to each non-zero axis when randomization is on
    pub fn jitter(&self, dx: i32, dy: i32) -> (i32, i32) {
        if !self.randomize.get() {
            return (dx, dy);
        }
        let mut rng = self.rng.borrow_mut();
        let mut nudge = |v: i32| {
            if v == 0 {
                0
            } else {
                v.saturating_add(rng.gen_range(-1..=1))
            }
        };
        (nudge(dx), nudge(dy))
    }

    // ========================================================================
    // Control pump
    // ========================================================================

    /// Drain the control channel.
    ///
    /// Serial and randomization requests are applied immediately; reload
    /// and shutdown are parked until [`take_deferred`](Self::take_deferred).
    pub fn pump(&self) {
        let Some(control) = &self.control else {
            return;
        };
        loop {
            let msg = match control.borrow_mut().try_recv() {
                Ok(msg) => msg,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Control channel closed");
                    break;
                }
            };
            if msg.applies_during_sleep() {
                self.apply(msg);
            } else {
                self.deferred.borrow_mut().push_back(msg);
            }
        }
    }

    /// Messages that must run at a tick boundary, in arrival order
    pub fn take_deferred(&self) -> Vec<ControlMessage> {
        self.deferred.borrow_mut().drain(..).collect()
    }

    fn apply(&self, msg: ControlMessage) {
        match msg {
            ControlMessage::Connect(port) => {
                if let Err(e) = self.adapter.borrow_mut().connect(&port) {
                    warn!("Serial connect to {} failed: {}", port, e);
                }
            }
            ControlMessage::Disconnect => self.adapter.borrow_mut().disconnect(),
            ControlMessage::SetRandomization(enabled) => self.set_randomization(enabled),
            other => self.deferred.borrow_mut().push_back(other),
        }
    }

    // ========================================================================
    // Cooperative sleeps
    // ========================================================================

    /// Block for `duration` while continuing to pump control messages
    pub fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            self.pump();
            thread::sleep(PUMP_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }

    /// Sleep up to `duration`, returning early once `button` goes from held
    /// to released.
    ///
    /// An early exit waits [`RELEASE_SETTLE`] before returning. Returns
    /// true if the release was seen.
    pub fn sleep_until_release(&self, button: MouseButton, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut was_down = self.is_button_down(button);

        while Instant::now() < deadline {
            let down = self.is_button_down(button);
            if was_down && !down {
                debug!("Button {} released, settling", button.id());
                self.sleep(RELEASE_SETTLE);
                return true;
            }
            was_down = down;
            self.pump();
            thread::sleep(PUMP_INTERVAL);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control;
    use macrobridge_input::{RecordingOsInput, ScriptedProbe};
    use macrobridge_transport::mock::{MockLink, MockOpener};
    use macrobridge_transport::{LinkSettings, SerialTransport};

    fn host_with(link: &MockLink) -> (Host, control::ControlSender) {
        let opener = MockOpener::new().with_port("/dev/ttyUSB0", link.clone());
        let serial = SerialTransport::with_opener(Box::new(opener), LinkSettings::default());
        let adapter = OutputAdapter::new(serial, Box::new(RecordingOsInput::new()));
        let (tx, rx) = control::channel();
        let host = Host::new(
            adapter,
            Arc::new(ScriptedProbe::new()),
            Arc::new(ScriptLog::default()),
        )
        .with_control(rx);
        (host, tx)
    }

    #[test]
    fn test_jitter_off() {
        let (host, _tx) = host_with(&MockLink::new());
        assert_eq!(host.jitter(10, -3), (10, -3));
    }

    #[test]
    fn test_jitter_bounded_and_zero_preserved() {
        let (host, _tx) = host_with(&MockLink::new());
        let host = host.with_randomization(true).with_seed(7);
        for _ in 0..200 {
            let (dx, dy) = host.jitter(10, 0);
            assert!((9..=11).contains(&dx));
            assert_eq!(dy, 0);
        }
    }

    #[test]
    fn test_jitter_saturates_at_extremes() {
        let (host, _tx) = host_with(&MockLink::new());
        let host = host.with_randomization(true).with_seed(3);
        for _ in 0..200 {
            let (dx, dy) = host.jitter(i32::MAX, i32::MIN);
            assert!(dx >= i32::MAX - 1);
            assert!(dy <= i32::MIN + 1);
        }
    }

    #[test]
    fn test_pump_applies_and_defers() {
        let link = MockLink::new();
        let (host, tx) = host_with(&link);
        tx.send(ControlMessage::Connect("/dev/ttyUSB0".to_string()))
            .unwrap();
        tx.send(ControlMessage::Reload).unwrap();
        tx.send(ControlMessage::SetRandomization(true)).unwrap();
        tx.send(ControlMessage::Shutdown).unwrap();

        host.pump();
        assert!(host.adapter().is_connected());
        assert!(host.randomization());
        assert_eq!(
            host.take_deferred(),
            vec![ControlMessage::Reload, ControlMessage::Shutdown]
        );
        assert!(host.take_deferred().is_empty());
    }

    #[test]
    fn test_sleep_pumps() {
        let link = MockLink::new();
        let (host, tx) = host_with(&link);
        tx.send(ControlMessage::Connect("/dev/ttyUSB0".to_string()))
            .unwrap();
        let start = Instant::now();
        host.sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(host.adapter().is_connected());
    }

    #[test]
    fn test_sleep_until_release_full_wait_when_not_held() {
        let (host, _tx) = host_with(&MockLink::new());
        let start = Instant::now();
        assert!(!host.sleep_until_release(MouseButton::Left, Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
