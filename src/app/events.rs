//! Outbound application events.
//!
//! The supervisor and runtime emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to serial, count them, forward them.

use crate::drivers::input_monitor::HoldEvent;
use crate::fsm::DeviceState;

/// Structured events emitted by the connectivity core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The supervisor has started (carries the state after boot).
    Started(DeviceState),

    /// The supervisor transitioned between states.
    StateChanged { from: DeviceState, to: DeviceState },

    /// The recovery button crossed a hold threshold.
    Hold(HoldEvent),

    /// Credentials arrived during recovery but failed validation.
    CredentialsRejected,

    /// A hard reset was requested; the process is about to restart.
    RestartRequested,

    /// The broker session came up.
    SessionConnected { subscribed: usize, failed: usize },

    /// The broker session dropped.
    SessionLost { reconnect_armed: bool },

    /// An inbound message ran `handlers` handlers.
    MessageDispatched { handlers: usize },

    /// An inbound message matched no registered topic.
    MessageDropped,

    /// A main-loop iteration exceeded the configured budget.
    LoopOverrun { ms: u64 },
}
