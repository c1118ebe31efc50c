//! Fixed-cadence dispatch loop
//!
//! Each tick:
//! 1. pump the control channel and apply deferred reload/shutdown
//! 2. drain up to `batch_size` events and hand each to the script
//! 3. run one presentation pass
//!
//! Phase 2 always completes before phase 3 starts. Every event is
//! delivered in queue order and a failing event never blocks the next.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use macrobridge_input::{EventQueue, InputEvent};
use tracing::{debug, info};

use crate::control::ControlMessage;
use crate::engine::{InvokeOutcome, MacroSandbox, ScriptState};

/// Snapshot handed to the presentation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Events handed to the script this tick
    pub delivered: usize,
    /// Events whose handler raised
    pub failed: usize,
    /// Events still queued after the drain
    pub pending: usize,
    /// Total events dropped by queue overflow
    pub dropped: u64,
    pub script_state: ScriptState,
    pub serial_connected: bool,
    pub randomization: bool,
}

/// Presentation layer hook, called once per tick after script execution
pub trait Presenter {
    fn present(&mut self, report: &TickReport);
}

/// Presenter that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _report: &TickReport) {}
}

/// Presenter that logs status changes (headless operation)
#[derive(Debug, Default)]
pub struct StatusLogPresenter {
    last: Option<(ScriptState, bool, bool)>,
    last_dropped: u64,
}

impl Presenter for StatusLogPresenter {
    fn present(&mut self, report: &TickReport) {
        let status = (
            report.script_state,
            report.serial_connected,
            report.randomization,
        );
        if self.last != Some(status) {
            info!(
                "Script {}, serial {}, randomization {}",
                report.script_state,
                if report.serial_connected {
                    "connected"
                } else {
                    "disconnected"
                },
                if report.randomization { "on" } else { "off" }
            );
            self.last = Some(status);
        }
        if report.dropped > self.last_dropped {
            info!(
                "{} events dropped by queue overflow",
                report.dropped - self.last_dropped
            );
            self.last_dropped = report.dropped;
        }
    }
}

/// Whether the loop should keep running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue(TickReport),
    Shutdown,
}

/// Drives the sandbox from the event queue
pub struct DispatchLoop<P: Presenter> {
    sandbox: MacroSandbox,
    queue: Arc<EventQueue>,
    presenter: P,
    batch_size: usize,
    tick: u64,
    batch: Vec<InputEvent>,
}

impl<P: Presenter> DispatchLoop<P> {
    pub fn new(
        sandbox: MacroSandbox,
        queue: Arc<EventQueue>,
        presenter: P,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sandbox,
            queue,
            presenter,
            batch_size,
            tick: 0,
            batch: Vec::with_capacity(batch_size),
        }
    }

    pub fn sandbox(&self) -> &MacroSandbox {
        &self.sandbox
    }

    pub fn sandbox_mut(&mut self) -> &mut MacroSandbox {
        &mut self.sandbox
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickOutcome {
        self.tick += 1;

        self.sandbox.host().pump();
        for msg in self.sandbox.host().take_deferred() {
            match msg {
                ControlMessage::Reload => {
                    info!("Reloading script");
                    self.sandbox.reload();
                }
                ControlMessage::Shutdown => {
                    info!("Shutdown requested");
                    return TickOutcome::Shutdown;
                }
                other => debug!("Unexpected deferred message {:?}", other),
            }
        }

        self.queue.drain_into(self.batch_size, &mut self.batch);
        let delivered = self.batch.len();
        let mut failed = 0;
        for event in self.batch.drain(..) {
            debug!("Dispatching {}", event);
            if let InvokeOutcome::Failed(_) = self.sandbox.invoke_event(&event) {
                failed += 1;
            }
        }

        let report = TickReport {
            tick: self.tick,
            delivered,
            failed,
            pending: self.queue.len(),
            dropped: self.queue.dropped(),
            script_state: self.sandbox.state(),
            serial_connected: self.sandbox.host().adapter().is_connected(),
            randomization: self.sandbox.host().randomization(),
        };
        self.presenter.present(&report);
        TickOutcome::Continue(report)
    }

    /// Tick every `interval` until a shutdown message arrives
    pub fn run(&mut self, interval: Duration) {
        info!("Dispatch loop running every {:?}", interval);
        loop {
            let started = Instant::now();
            if self.tick() == TickOutcome::Shutdown {
                break;
            }
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        info!("Dispatch loop stopped after {} ticks", self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control;
    use crate::engine::Host;
    use crate::script_log::ScriptLog;
    use crate::script_store::MemoryScriptStore;
    use macrobridge_input::{EventKind, OutputAdapter, RecordingOsInput, ScriptedProbe};
    use macrobridge_transport::{LinkSettings, SerialTransport};

    fn dispatch(
        script: &str,
        batch: usize,
    ) -> (
        DispatchLoop<NullPresenter>,
        Arc<EventQueue>,
        Arc<ScriptLog>,
        control::ControlSender,
    ) {
        let log = Arc::new(ScriptLog::default());
        let adapter = OutputAdapter::new(
            SerialTransport::new(LinkSettings::default()),
            Box::new(RecordingOsInput::new()),
        );
        let (tx, rx) = control::channel();
        let host =
            Host::new(adapter, Arc::new(ScriptedProbe::new()), log.clone()).with_control(rx);
        let mut sandbox = MacroSandbox::new(host, Box::new(MemoryScriptStore::new(script)));
        sandbox.reload();
        let queue = Arc::new(EventQueue::default());
        (
            DispatchLoop::new(sandbox, queue.clone(), NullPresenter, batch),
            queue,
            log,
            tx,
        )
    }

    #[test]
    fn test_batch_bounded() {
        let (mut dl, queue, _, _tx) = dispatch("function OnEvent(e, a) end", 3);
        for i in 0..7 {
            queue.push(InputEvent::new(EventKind::KeyPressed, i));
        }
        let TickOutcome::Continue(report) = dl.tick() else {
            panic!("unexpected shutdown");
        };
        assert_eq!(report.delivered, 3);
        assert_eq!(report.pending, 4);
    }

    #[test]
    fn test_shutdown_message() {
        let (mut dl, _, _, tx) = dispatch("function OnEvent(e, a) end", 10);
        tx.send(ControlMessage::Shutdown).unwrap();
        assert_eq!(dl.tick(), TickOutcome::Shutdown);
    }

    #[test]
    fn test_reload_at_tick_boundary() {
        let (mut dl, _, log, tx) = dispatch(
            r#"function OnEvent(e, a) OutputLogMessage(e) end"#,
            10,
        );
        log.clear();
        tx.send(ControlMessage::Reload).unwrap();
        dl.tick();
        assert_eq!(log.lines(), vec!["PROFILE_DEACTIVATED", "PROFILE_ACTIVATED"]);
    }
}
