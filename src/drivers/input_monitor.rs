//! Recovery button hold monitor.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  The line is sampled by a
//! scheduler task (50 ms by default); the sampling period doubles as the
//! debounce window.
//!
//! ## Hold detection
//!
//! | Hold time              | While held         | On release        |
//! |------------------------|--------------------|-------------------|
//! | < recovery             | -                  | -                 |
//! | ≥ recovery, < hard     | `RecoveryArmed`    | `EnterRecovery`   |
//! | ≥ hard reset           | `HardResetArmed`   | `HardReset`       |
//!
//! `*Armed` fires once per press.  Thresholds are inclusive and the long
//! threshold is checked first.

use embedded_hal::digital::InputPin;

/// Classified hold outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    /// Still held, recovery threshold crossed.
    RecoveryArmed { held_ms: u64 },
    /// Released inside the recovery window.
    EnterRecovery { held_ms: u64 },
    /// Still held, hard-reset threshold crossed.
    HardResetArmed { held_ms: u64 },
    /// Released after the hard-reset threshold.
    HardReset { held_ms: u64 },
}

impl HoldEvent {
    pub fn held_ms(self) -> u64 {
        match self {
            Self::RecoveryArmed { held_ms }
            | Self::EnterRecovery { held_ms }
            | Self::HardResetArmed { held_ms }
            | Self::HardReset { held_ms } => held_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldThresholds {
    pub recovery_ms: u64,
    pub hard_reset_ms: u64,
}

impl Default for HoldThresholds {
    fn default() -> Self {
        Self {
            recovery_ms: 5_000,
            hard_reset_ms: 10_000,
        }
    }
}

impl From<&crate::config::SystemConfig> for HoldThresholds {
    fn from(cfg: &crate::config::SystemConfig) -> Self {
        Self {
            recovery_ms: u64::from(cfg.recovery_hold_ms),
            hard_reset_ms: u64::from(cfg.hard_reset_hold_ms),
        }
    }
}

pub struct InputMonitor<P> {
    pin: Option<P>,
    active_low: bool,
    thresholds: HoldThresholds,
    hold_since_ms: u64,
    recovery_armed: bool,
    hard_reset_armed: bool,
}

impl<P: InputPin> InputMonitor<P> {
    /// `pin = None` makes the monitor inert.
    pub fn new(pin: Option<P>, active_low: bool, thresholds: HoldThresholds, now_ms: u64) -> Self {
        Self {
            pin,
            active_low,
            thresholds,
            hold_since_ms: now_ms,
            recovery_armed: false,
            hard_reset_armed: false,
        }
    }

    /// Take one sample.  Call at the fixed sampling period.
    pub fn sample(&mut self, now_ms: u64) -> Option<HoldEvent> {
        let pressed = self.read_pressed()?;
        let held_ms = now_ms.saturating_sub(self.hold_since_ms);

        let event = if held_ms >= self.thresholds.hard_reset_ms {
            if !pressed {
                Some(HoldEvent::HardReset { held_ms })
            } else if !self.hard_reset_armed {
                self.hard_reset_armed = true;
                Some(HoldEvent::HardResetArmed { held_ms })
            } else {
                None
            }
        } else if held_ms >= self.thresholds.recovery_ms {
            if !pressed {
                Some(HoldEvent::EnterRecovery { held_ms })
            } else if !self.recovery_armed {
                self.recovery_armed = true;
                Some(HoldEvent::RecoveryArmed { held_ms })
            } else {
                None
            }
        } else {
            None
        };

        if !pressed {
            self.hold_since_ms = now_ms;
            self.recovery_armed = false;
            self.hard_reset_armed = false;
        }
        event
    }

    /// Milliseconds the button has been continuously held (0 when released
    /// at the last sample).
    pub fn held_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.hold_since_ms)
    }

    pub fn has_pin(&self) -> bool {
        self.pin.is_some()
    }

    /// `None` when no pin is configured.  Read errors count as released.
    fn read_pressed(&mut self) -> Option<bool> {
        let pin = self.pin.as_mut()?;
        let pressed = match pin.is_high() {
            Ok(high) => high != self.active_low,
            Err(_) => false,
        };
        Some(pressed)
    }
}
