//! Application core: pure domain logic with no I/O.
//!
//! The link supervisor, the appliance command handler, and the cooperative
//! runtime that ties them to the broker session.  All interaction with
//! hardware and network stacks happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod supervisor;
