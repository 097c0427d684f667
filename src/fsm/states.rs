//! State handler functions and table builder.
//!
//! Each state is three plain `fn` pointers.  No closures, no heap.
//!
//! ```text
//!  INIT ──[boot]──▶ CONNECTING ──[link up]──▶ READY
//!                       ▲                       │
//!                       └──────[link down]──────┘
//!                       ▲
//!                  [valid creds]
//!                       │
//!  Any state ──[recovery requested]──▶ RECOVERY MODE ──[bad creds]──┐
//!                                            ▲                      │
//!                                            └──────────────────────┘
//! ```

use log::{info, warn};

use super::context::{LinkAction, SupervisorContext, SupervisorEvent};
use super::{DeviceState, StateDescriptor};
use crate::drivers::status_signal::SignalPattern;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; DeviceState::COUNT] {
    [
        // Index 0: Init
        StateDescriptor {
            id: DeviceState::Init,
            name: "Init",
            on_enter: None,
            on_exit: None,
            on_event: init_event,
        },
        // Index 1: Connecting
        StateDescriptor {
            id: DeviceState::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_event: connecting_event,
        },
        // Index 2: Ready
        StateDescriptor {
            id: DeviceState::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: None,
            on_event: ready_event,
        },
        // Index 3: RecoveryMode
        StateDescriptor {
            id: DeviceState::RecoveryMode,
            name: "RecoveryMode",
            on_enter: Some(recovery_enter),
            on_exit: Some(recovery_exit),
            on_event: recovery_event,
        },
    ]
}

/// Recovery may interrupt anything except itself.
fn recovery_guard(event: &SupervisorEvent) -> Option<DeviceState> {
    matches!(event, SupervisorEvent::RecoveryRequested).then_some(DeviceState::RecoveryMode)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT
// ═══════════════════════════════════════════════════════════════════════════

fn init_event(_ctx: &mut SupervisorContext, event: &SupervisorEvent) -> Option<DeviceState> {
    match event {
        SupervisorEvent::Boot => Some(DeviceState::Connecting),
        other => recovery_guard(other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut SupervisorContext) {
    ctx.push(LinkAction::ShowPattern(SignalPattern::CONNECTING));
    ctx.push(LinkAction::Connect);
    info!("CONNECTING: waiting for the station to come up");
}

fn connecting_event(_ctx: &mut SupervisorContext, event: &SupervisorEvent) -> Option<DeviceState> {
    match event {
        SupervisorEvent::LinkUp => Some(DeviceState::Ready),
        other => recovery_guard(other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY
// ═══════════════════════════════════════════════════════════════════════════

fn ready_enter(ctx: &mut SupervisorContext) {
    ctx.push(LinkAction::StopSignal);
    info!("READY: link up");
}

fn ready_event(_ctx: &mut SupervisorContext, event: &SupervisorEvent) -> Option<DeviceState> {
    match event {
        SupervisorEvent::LinkDown => {
            warn!("READY: link lost, reconnecting");
            Some(DeviceState::Connecting)
        }
        other => recovery_guard(other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECOVERY MODE: waiting for out-of-band credentials
// ═══════════════════════════════════════════════════════════════════════════

fn recovery_enter(ctx: &mut SupervisorContext) {
    ctx.push(LinkAction::ShowPattern(SignalPattern::RECOVERY));
    ctx.push(LinkAction::BeginProvisioning);
    info!("RECOVERY: listening for credentials");
}

fn recovery_exit(ctx: &mut SupervisorContext) {
    ctx.push(LinkAction::StopProvisioning);
}

fn recovery_event(ctx: &mut SupervisorContext, event: &SupervisorEvent) -> Option<DeviceState> {
    let SupervisorEvent::CredentialsReceived(creds) = event else {
        return None;
    };
    match creds.validate() {
        Ok(()) => {
            info!("RECOVERY: credentials received for '{}'", creds.ssid_lossy());
            ctx.push(LinkAction::ApplyCredentials(creds.clone()));
            ctx.push(LinkAction::PersistAutoConnect);
            Some(DeviceState::Connecting)
        }
        Err(e) => {
            warn!("RECOVERY: rejected credentials ({}), restarting exchange", e);
            ctx.push(LinkAction::RejectCredentials);
            ctx.push(LinkAction::BeginProvisioning);
            None
        }
    }
}
