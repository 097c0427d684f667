//! Board-level drivers, generic over `embedded_hal` digital pins.

pub mod input_monitor;
pub mod status_signal;
