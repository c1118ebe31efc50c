//! Control channel into the dispatch thread
//!
//! Anything that is not the dispatch thread (signal handler, a UI, a
//! socket) asks for changes by posting a [`ControlMessage`]. The dispatch
//! thread drains the channel at each tick and while a script sleeps, so
//! the serial session and the script state are only ever touched from
//! one thread.

use tokio::sync::mpsc;

/// Requests applied on the dispatch thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Open a serial session on the given port
    Connect(String),
    Disconnect,
    /// Enable or disable relative-move jitter
    SetRandomization(bool),
    /// Tear down and rebuild the script environment
    Reload,
    Shutdown,
}

impl ControlMessage {
    /// Whether the message may be applied while a script is mid-call.
    ///
    /// Reload and shutdown must wait for the tick boundary.
    pub fn applies_during_sleep(&self) -> bool {
        matches!(
            self,
            ControlMessage::Connect(_)
                | ControlMessage::Disconnect
                | ControlMessage::SetRandomization(_)
        )
    }
}

pub type ControlSender = mpsc::UnboundedSender<ControlMessage>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlMessage>;

/// Create a control channel
pub fn channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}
