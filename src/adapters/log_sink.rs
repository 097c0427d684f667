//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event as one line
//! to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::drivers::input_monitor::HoldEvent;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started(state) => info!("START | state={:?}", state),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::Hold(hold) => match hold {
                HoldEvent::RecoveryArmed { held_ms } => {
                    info!("BUTTON | held {}ms, recovery armed", held_ms);
                }
                HoldEvent::EnterRecovery { held_ms } => {
                    info!("BUTTON | released after {}ms, entering recovery", held_ms);
                }
                HoldEvent::HardResetArmed { held_ms } => {
                    warn!("BUTTON | held {}ms, hard reset armed", held_ms);
                }
                HoldEvent::HardReset { held_ms } => {
                    warn!("BUTTON | released after {}ms, hard reset", held_ms);
                }
            },
            AppEvent::CredentialsRejected => warn!("PROV | credentials rejected"),
            AppEvent::RestartRequested => warn!("SYS | restart requested"),
            AppEvent::SessionConnected { subscribed, failed } => {
                info!("MQTT | connected, subscribed={} failed={}", subscribed, failed);
            }
            AppEvent::SessionLost { reconnect_armed } => {
                info!("MQTT | lost, reconnect_armed={}", reconnect_armed);
            }
            AppEvent::MessageDispatched { handlers } => {
                info!("MQTT | message dispatched to {} handler(s)", handlers);
            }
            AppEvent::MessageDropped => info!("MQTT | message on unknown topic dropped"),
            AppEvent::LoopOverrun { ms } => warn!("LOOP | iteration took {}ms", ms),
        }
    }
}
