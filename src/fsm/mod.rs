//! Function-pointer finite state machine engine for the link supervisor.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌──────────────┬───────────┬──────────┬─────────────────────┐ │
//! │  │ DeviceState  │ on_enter  │ on_exit  │ on_event            │ │
//! │  ├──────────────┼───────────┼──────────┼─────────────────────┤ │
//! │  │ Init         │ -         │ -        │ fn(ctx,ev)->Option  │ │
//! │  │ Connecting   │ fn(ctx)   │ -        │ fn(ctx,ev)->Option  │ │
//! │  │ Ready        │ fn(ctx)   │ -        │ fn(ctx,ev)->Option  │ │
//! │  │ RecoveryMode │ fn(ctx)   │ fn(ctx)  │ fn(ctx,ev)->Option  │ │
//! │  └──────────────┴───────────┴──────────┴─────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is event-driven: [`Fsm::handle`] calls `on_event` for the
//! **current** state.  If it returns `Some(next)`, the engine runs
//! `on_exit` for the current state, then `on_enter` for the next.  All
//! handlers receive `&mut SupervisorContext` and only write
//! [`LinkAction`](context::LinkAction)s into it; nothing here touches a
//! port.

pub mod context;
pub mod states;

use context::{SupervisorContext, SupervisorEvent};
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Lifecycle of the device's connectivity.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceState {
    Init = 0,
    Connecting = 1,
    Ready = 2,
    RecoveryMode = 3,
}

impl DeviceState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `DeviceState`.  Out-of-range indices assert
    /// in debug builds and fall back to `Connecting` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Init,
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::RecoveryMode,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Connecting
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Connecting => "Connecting",
            Self::Ready => "Ready",
            Self::RecoveryMode => "RecoveryMode",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit`: run exactly once per transition.
pub type StateActionFn = fn(&mut SupervisorContext);

/// Per-event handler.  Returns `Some(next)` to transition, `None` to stay.
pub type StateEventFn = fn(&mut SupervisorContext, &SupervisorEvent) -> Option<DeviceState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: DeviceState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `DeviceState as usize`.
    table: [StateDescriptor; DeviceState::COUNT],
    current: usize,
    /// Number of transitions taken since construction.
    transitions: u32,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; DeviceState::COUNT], initial: DeviceState) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once after construction.
    pub fn start(&mut self, ctx: &mut SupervisorContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one event to the current state.  Returns the state that was
    /// left if a transition happened.
    pub fn handle(
        &mut self,
        event: &SupervisorEvent,
        ctx: &mut SupervisorContext,
    ) -> Option<DeviceState> {
        let next = (self.table[self.current].on_event)(ctx, event)?;
        let from = self.current_state();
        self.transition(next, ctx);
        Some(from)
    }

    /// Jump to `next` regardless of the current state's handler.  A
    /// transition to the current state is a no-op.
    pub fn force_transition(&mut self, next: DeviceState, ctx: &mut SupervisorContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> DeviceState {
        DeviceState::from_index(self.current)
    }

    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: DeviceState, ctx: &mut SupervisorContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
