//! Link supervisor: owner of the device lifecycle.
//!
//! [`LinkSupervisor`] owns the state table, the status signal, and the
//! recovery-button monitor.  State handlers only write
//! [`LinkAction`]s; this type applies them through the ports after each
//! transition.
//!
//! ```text
//!  InputMonitor ──▶ ┌──────────────────────────┐ ──▶ LinkPort / ProvisioningPort
//!                   │      LinkSupervisor      │
//!   link edges ───▶ │  Fsm · StatusSignal      │ ──▶ RestartPort
//!                   └──────────────────────────┘ ──▶ EventSink
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::drivers::input_monitor::{HoldEvent, HoldThresholds, InputMonitor};
use crate::drivers::status_signal::{SignalPattern, StatusSignal};
use crate::fsm::context::{LinkAction, SupervisorContext, SupervisorEvent};
use crate::fsm::states::build_state_table;
use crate::fsm::{DeviceState, Fsm};

use super::events::AppEvent;
use super::ports::{EventSink, LinkPort, ProvisioningPort, RestartPort};

// ───────────────────────────────────────────────────────────────
// LinkSupervisor
// ───────────────────────────────────────────────────────────────

pub struct LinkSupervisor<O, I> {
    fsm: Fsm,
    ctx: SupervisorContext,
    signal: StatusSignal<O>,
    input: InputMonitor<I>,
    /// Latched once a hard reset is armed; nothing clears it.
    rebooting: bool,
}

impl<O: OutputPin, I: InputPin> LinkSupervisor<O, I> {
    /// Does **not** start the state machine.  Call [`start`](Self::start) next.
    pub fn new(signal: StatusSignal<O>, input: InputMonitor<I>) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), DeviceState::Init),
            ctx: SupervisorContext::new(),
            signal,
            input,
            rebooting: false,
        }
    }

    /// Build the signal and monitor from pins plus configuration.
    pub fn with_pins(
        led: Option<O>,
        led_active_high: bool,
        button: Option<I>,
        button_active_low: bool,
        config: &SystemConfig,
        now_ms: u64,
    ) -> Self {
        Self::new(
            StatusSignal::new(led, led_active_high),
            InputMonitor::new(button, button_active_low, HoldThresholds::from(config), now_ms),
        )
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Init → Connecting: show the connecting pattern and issue the first connect.
    pub fn start(
        &mut self,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        self.fsm.start(&mut self.ctx);
        self.handle(SupervisorEvent::Boot, net, sink);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("LinkSupervisor started in {:?}", self.fsm.current_state());
    }

    // ── Periodic tasks ────────────────────────────────────────

    /// Advance the status pattern by one bit.
    pub fn tick_signal(&mut self) {
        self.signal.tick();
    }

    /// Sample the recovery button.
    pub fn sample_input(&mut self, now_ms: u64) -> Option<HoldEvent> {
        self.input.sample(now_ms)
    }

    // ── Event handling ────────────────────────────────────────

    /// React to a hold event from the input monitor.
    pub fn on_hold(
        &mut self,
        hold: HoldEvent,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        sink.emit(&AppEvent::Hold(hold));
        match hold {
            HoldEvent::RecoveryArmed { held_ms } => {
                info!("Button held {}ms: release now to enter recovery", held_ms);
                self.signal.show(SignalPattern::RECOVERY);
            }
            HoldEvent::HardResetArmed { held_ms } => {
                warn!("Button held {}ms: hard reset armed", held_ms);
                self.rebooting = true;
                self.signal.show(SignalPattern::REBOOTING);
            }
            HoldEvent::HardReset { held_ms } => {
                warn!("Button released after {}ms: restarting", held_ms);
                self.rebooting = true;
                self.signal.show(SignalPattern::REBOOTING);
                sink.emit(&AppEvent::RestartRequested);
                net.restart();
            }
            HoldEvent::EnterRecovery { .. } => {
                self.handle(SupervisorEvent::RecoveryRequested, net, sink);
            }
        }
    }

    /// Feed an event to the state table and apply the resulting actions.
    pub fn handle(
        &mut self,
        event: SupervisorEvent,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        if let Some(from) = self.fsm.handle(&event, &mut self.ctx) {
            sink.emit(&AppEvent::StateChanged {
                from,
                to: self.fsm.current_state(),
            });
        }
        self.apply_actions(net, sink);
    }

    /// Jump straight to `state` (diagnostics / tests).
    pub fn force_state(
        &mut self,
        state: DeviceState,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        let from = self.fsm.current_state();
        self.fsm.force_transition(state, &mut self.ctx);
        if from != state {
            sink.emit(&AppEvent::StateChanged { from, to: state });
        }
        self.apply_actions(net, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> DeviceState {
        self.fsm.current_state()
    }

    pub fn in_recovery(&self) -> bool {
        self.fsm.current_state() == DeviceState::RecoveryMode
    }

    pub fn is_rebooting(&self) -> bool {
        self.rebooting
    }

    pub fn signal(&self) -> &StatusSignal<O> {
        &self.signal
    }

    pub fn input(&self) -> &InputMonitor<I> {
        &self.input
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_actions(
        &mut self,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        for action in self.ctx.take_actions() {
            match action {
                LinkAction::ShowPattern(pattern) => {
                    // A pending reboot owns the LED until the restart happens.
                    if !self.rebooting {
                        self.signal.show(pattern);
                    }
                }
                LinkAction::StopSignal => {
                    if !self.rebooting {
                        self.signal.stop();
                    }
                }
                LinkAction::Connect => {
                    if let Err(e) = net.request_connect() {
                        error!("Link connect request failed: {}", e);
                    }
                }
                LinkAction::BeginProvisioning => {
                    net.stop_provisioning();
                    net.enter_station_mode();
                    if let Err(e) = net.start_provisioning() {
                        error!("Credential exchange failed to start: {}", e);
                    }
                }
                LinkAction::StopProvisioning => net.stop_provisioning(),
                LinkAction::ApplyCredentials(creds) => {
                    if let Err(e) = net.apply_credentials(&creds) {
                        error!("Applying credentials for '{}' failed: {}", creds.ssid_lossy(), e);
                    }
                }
                LinkAction::PersistAutoConnect => net.set_auto_connect(true),
                LinkAction::RejectCredentials => sink.emit(&AppEvent::CredentialsRejected),
            }
        }
    }
}
