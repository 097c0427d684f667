//! Blackboard threaded through every supervisor state handler.
//!
//! Handlers never call ports.  They append [`LinkAction`]s here and the
//! [`LinkSupervisor`](crate::app::supervisor::LinkSupervisor) applies them,
//! in order, after the transition completes.

use log::warn;

use crate::app::ports::Credentials;
use crate::drivers::status_signal::SignalPattern;

/// Upper bound on actions produced by one event (exit + event + enter).
pub const MAX_ACTIONS: usize = 8;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Events the state table understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Issued once by `LinkSupervisor::start`.
    Boot,
    LinkUp,
    LinkDown,
    /// The operator released the button inside the recovery window.
    RecoveryRequested,
    CredentialsReceived(Credentials),
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Side effects requested by state handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Start the status signal (if stopped) and switch its pattern.
    ShowPattern(SignalPattern),
    /// Stop the status signal and force the LED off.
    StopSignal,
    /// Ask the link to (re)associate.
    Connect,
    /// Stop any exchange, enter station mode, start listening.
    BeginProvisioning,
    /// Tear down the credential exchange.
    StopProvisioning,
    ApplyCredentials(Credentials),
    PersistAutoConnect,
    /// Received credentials failed validation.
    RejectCredentials,
}

// ---------------------------------------------------------------------------
// SupervisorContext
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SupervisorContext {
    actions: heapless::Vec<LinkAction, MAX_ACTIONS>,
}

impl SupervisorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action.  Overflow drops the action with a warning.
    pub fn push(&mut self, action: LinkAction) {
        if let Err(dropped) = self.actions.push(action) {
            warn!("Supervisor: action buffer full, dropping {:?}", dropped);
        }
    }

    /// Remove and return every queued action, oldest first.
    pub fn take_actions(&mut self) -> heapless::Vec<LinkAction, MAX_ACTIONS> {
        core::mem::take(&mut self.actions)
    }

    pub fn pending(&self) -> usize {
        self.actions.len()
    }
}
