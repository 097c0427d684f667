//! Port traits: the hexagonal boundary between the connectivity core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LinkSupervisor / SessionManager (domain)
//! ```
//!
//! Driven adapters (WiFi, SmartConfig, MQTT client, restart, appliance
//! switch, event sinks, config storage) implement these traits.  The
//! domain consumes them via generics, so it never touches hardware or
//! network stacks directly.
//!
//! Inbound signals (link up/down, session connect/loss, messages) do not
//! come through these traits: adapters push them into the
//! [`EventQueue`](crate::events::EventQueue) instead.

use core::fmt;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::error::{LinkError, ProvisioningError, TransportError};
use crate::scheduler::Task;

// ───────────────────────────────────────────────────────────────
// Shared value types
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Immutable broker session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: heapless::String<64>,
    pub port: u16,
    pub client_id: heapless::String<64>,
    pub keep_alive_secs: u16,
}

/// Network credentials received out-of-band during recovery mode.
///
/// Both fields are raw bytes.  An SSID is any 1–32 bytes and need not be
/// UTF-8 (GBK network names are common), so it is handed to the driver
/// exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: heapless::Vec<u8, 32>,
    pub password: heapless::Vec<u8, 64>,
}

impl Credentials {
    /// Build from strings, rejecting anything the WiFi driver would refuse.
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        Self::from_bytes(ssid.as_bytes(), password.as_bytes())
    }

    /// Build from raw bytes, rejecting anything the WiFi driver would refuse.
    pub fn from_bytes(ssid: &[u8], password: &[u8]) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: heapless::Vec::from_slice(ssid).map_err(|()| LinkError::InvalidSsid)?,
            password: heapless::Vec::from_slice(password)
                .map_err(|()| LinkError::InvalidPassword)?,
        })
    }

    /// Re-check a value that was assembled field by field (e.g. by a driver callback).
    pub fn validate(&self) -> Result<(), LinkError> {
        validate_ssid(&self.ssid)?;
        validate_password(&self.password)
    }

    /// SSID for log lines.  Bytes that are not UTF-8 show as U+FFFD.
    pub fn ssid_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.ssid)
    }
}

fn validate_ssid(ssid: &[u8]) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &[u8]) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain → WiFi driver)
// ───────────────────────────────────────────────────────────────

/// Commands the supervisor issues to the wireless link.
///
/// Completion is never reported here: the adapter pushes
/// `Event::LinkUp` / `Event::LinkDown` edges into the event queue.
pub trait LinkPort {
    /// Start (or restart) an association attempt with the stored credentials.
    fn request_connect(&mut self) -> Result<(), LinkError>;

    /// Reinitialise the radio into station mode.
    fn enter_station_mode(&mut self);

    /// Store credentials received during recovery.
    fn apply_credentials(&mut self, creds: &Credentials) -> Result<(), LinkError>;

    /// Persist the "reconnect automatically on boot" intent.
    fn set_auto_connect(&mut self, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Provisioning port (driven adapter: domain ↔ credential exchange)
// ───────────────────────────────────────────────────────────────

pub trait ProvisioningPort {
    /// Tear down any credential exchange in progress.  Idempotent.
    fn stop_provisioning(&mut self);

    /// Begin listening for broadcast credentials.
    fn start_provisioning(&mut self) -> Result<(), ProvisioningError>;

    /// Non-blocking poll; yields credentials once the exchange completes.
    fn poll_credentials(&mut self) -> Option<Credentials>;
}

// ───────────────────────────────────────────────────────────────
// Restart port
// ───────────────────────────────────────────────────────────────

pub trait RestartPort {
    /// Restart the process.  On hardware this does not return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broker transport (driven adapter: session → MQTT client)
// ───────────────────────────────────────────────────────────────

/// The MQTT client as seen by the [`SessionManager`](crate::session::SessionManager).
///
/// Connection outcomes and inbound messages travel back through the event
/// queue (`SessionConnected`, `SessionLost`, `MessageReceived`).
pub trait BrokerTransport {
    /// Record the endpoint.  Must not open a connection.
    fn configure(&mut self, endpoint: &BrokerEndpoint) -> Result<(), TransportError>;

    /// Issue a connect request.  Failures surface as `SessionLost` / staying disconnected.
    fn connect(&mut self);

    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), TransportError>;

    fn publish(
        &mut self,
        topic: &str,
        qos: QosLevel,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Appliance switch port
// ───────────────────────────────────────────────────────────────

/// The controlled appliance, opaque to the core.  Implementations also
/// mirror the state on the indicator LED.
pub trait SwitchPort {
    fn set_switch(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST call [`SystemConfig::validate`] before persisting.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the runtime)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the [`Scheduler`](crate::scheduler::Scheduler)
/// invokes for every periodic task that has come due.
pub trait SchedulerDelegate {
    fn on_task_due(&mut self, label: &str, task: Task);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
