//! Status LED pattern driver.
//!
//! A single output line plays a repeating 32-bit pattern, one bit per
//! scheduler tick (100 ms by default, so one period is 3.2 s).
//!
//! ## Bit order
//!
//! The cursor is rotated left *before* bit 0 is driven, so over ticks
//! 1..=32 after a pattern change the line reproduces the pattern read
//! MSB → LSB, and after 32 ticks the cursor equals the pattern again.
//!
//! ## Named patterns
//!
//! | Pattern      | Value         | Looks like              |
//! |--------------|---------------|-------------------------|
//! | `CONNECTING` | `0xFF00_FF00` | slow alternating flash  |
//! | `RECOVERY`   | `0x0505_0505` | fast double flash       |
//! | `REBOOTING`  | `0xFFFF_0000` | very slow flash         |
//! | `OFF`        | `0`           | dark                    |

use embedded_hal::digital::{OutputPin, PinState};

/// A 32-bit on/off pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalPattern(pub u32);

impl SignalPattern {
    pub const CONNECTING: Self = Self(0xFF00_FF00);
    pub const RECOVERY: Self = Self(0x0505_0505);
    pub const REBOOTING: Self = Self(0xFFFF_0000);
    pub const OFF: Self = Self(0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Short label for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::CONNECTING => "connecting",
            Self::RECOVERY => "recovery",
            Self::REBOOTING => "rebooting",
            Self::OFF => "off",
            _ => "custom",
        }
    }
}

pub struct StatusSignal<P> {
    pin: Option<P>,
    active_high: bool,
    pattern: SignalPattern,
    cursor: u32,
    running: bool,
    /// Last level written (logical on/off), tracked for host inspection.
    lit: bool,
}

impl<P: OutputPin> StatusSignal<P> {
    /// `pin = None` keeps all bookkeeping but never touches hardware.
    pub fn new(pin: Option<P>, active_high: bool) -> Self {
        let mut signal = Self {
            pin,
            active_high,
            pattern: SignalPattern::OFF,
            cursor: 0,
            running: false,
            lit: false,
        };
        signal.drive(false);
        signal
    }

    /// Replace the pattern.  No-op if unchanged.
    pub fn set_pattern(&mut self, pattern: SignalPattern) {
        if pattern == self.pattern {
            return;
        }
        self.pattern = pattern;
        self.cursor = pattern.bits();
        if self.running {
            self.drive(self.cursor & 1 != 0);
        }
    }

    /// Begin ticking.  Idempotent.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Halt ticking, clear the pattern, and force the line off.
    pub fn stop(&mut self) {
        self.running = false;
        self.pattern = SignalPattern::OFF;
        self.cursor = 0;
        self.drive(false);
    }

    /// `start()` followed by `set_pattern(p)`.
    pub fn show(&mut self, pattern: SignalPattern) {
        self.start();
        self.set_pattern(pattern);
    }

    /// Advance one bit.  Does nothing while stopped.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.cursor = self.cursor.rotate_left(1);
        self.drive(self.cursor & 1 != 0);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pattern(&self) -> SignalPattern {
        self.pattern
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Logical state of the line as last driven.
    pub fn output_on(&self) -> bool {
        self.lit
    }

    fn drive(&mut self, on: bool) {
        self.lit = on;
        if let Some(pin) = self.pin.as_mut() {
            let level = PinState::from(on == self.active_high);
            // Pin errors are not actionable for an indicator LED.
            let _ = pin.set_state(level);
        }
    }
}
