//! GPIO assignments for the IR bridge board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Active levels live next to the pin they
//! describe.

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Single-colour status LED driven by the pattern player.
pub const STATUS_LED_GPIO: i32 = 2;
/// `true` = LED lights when the pin is HIGH.
pub const STATUS_LED_ACTIVE_HIGH: bool = true;

// ---------------------------------------------------------------------------
// Recovery button (active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button: hold 5 s for recovery, 10 s for hard reset.
pub const RECOVERY_BUTTON_GPIO: i32 = 0;
pub const RECOVERY_BUTTON_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Appliance
// ---------------------------------------------------------------------------

/// Enable line of the IR transmitter stage.
pub const APPLIANCE_SWITCH_GPIO: i32 = 14;
pub const APPLIANCE_SWITCH_ACTIVE_HIGH: bool = true;

/// Indicator LED mirroring the appliance state.
pub const APPLIANCE_INDICATOR_GPIO: i32 = 13;
pub const APPLIANCE_INDICATOR_ACTIVE_HIGH: bool = true;
