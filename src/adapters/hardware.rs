//! Appliance switch adapter.
//!
//! Bridges the controlled appliance (relay / IR driver enable line) and its
//! indicator LED to the [`SwitchPort`] trait.  Generic over
//! `embedded_hal` output pins, so the same code runs against ESP-IDF
//! `PinDriver`s and host-side mock pins.

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

use crate::app::ports::SwitchPort;

pub struct SwitchAdapter<S, L> {
    switch: S,
    indicator: Option<L>,
    switch_active_high: bool,
    indicator_active_high: bool,
    on: bool,
}

impl<S: OutputPin, L: OutputPin> SwitchAdapter<S, L> {
    /// Drives both lines to "off" immediately.
    pub fn new(
        switch: S,
        switch_active_high: bool,
        indicator: Option<L>,
        indicator_active_high: bool,
    ) -> Self {
        let mut adapter = Self {
            switch,
            indicator,
            switch_active_high,
            indicator_active_high,
            on: false,
        };
        adapter.drive(false);
        adapter
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    fn drive(&mut self, on: bool) {
        if self
            .switch
            .set_state(PinState::from(on == self.switch_active_high))
            .is_err()
        {
            warn!("Switch: output pin rejected level change");
        }
        if let Some(led) = self.indicator.as_mut() {
            let _ = led.set_state(PinState::from(on == self.indicator_active_high));
        }
    }
}

impl<S: OutputPin, L: OutputPin> SwitchPort for SwitchAdapter<S, L> {
    fn set_switch(&mut self, on: bool) {
        self.on = on;
        self.drive(on);
    }
}
