//! System configuration parameters
//!
//! All tunable parameters for the connectivity core.  Values can be
//! overridden from the NVS config blob; any field missing from a stored or
//! supplied document falls back to its default.

use serde::{Deserialize, Serialize};

use crate::app::ports::{BrokerEndpoint, ConfigError, QosLevel};

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or IP literal.
    pub host: heapless::String<64>,
    /// Broker TCP port.
    pub port: u16,
    /// MQTT client identifier.  Empty = use the device hostname.
    pub client_id: heapless::String<64>,
    /// MQTT keep-alive interval (seconds).
    pub keep_alive_secs: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let mut host = heapless::String::new();
        let _ = host.push_str("bemfa.com");
        Self {
            host,
            port: 9501,
            client_id: heapless::String::new(),
            keep_alive_secs: 60,
        }
    }
}

impl BrokerConfig {
    /// Resolve the immutable session endpoint, substituting `fallback_id`
    /// when no client id is configured.
    pub fn endpoint(&self, fallback_id: &str) -> BrokerEndpoint {
        let mut client_id = self.client_id.clone();
        if client_id.is_empty() {
            for ch in fallback_id.chars() {
                if client_id.push(ch).is_err() {
                    break;
                }
            }
        }
        BrokerEndpoint {
            host: self.host.clone(),
            port: self.port,
            client_id,
            keep_alive_secs: self.keep_alive_secs,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Status signal ---
    /// Status LED pattern tick (milliseconds per bit)
    pub signal_tick_ms: u32,

    // --- Recovery button ---
    /// Button sampling period (milliseconds); doubles as the debounce window
    pub input_sample_ms: u32,
    /// Hold time that arms recovery mode (milliseconds)
    pub recovery_hold_ms: u32,
    /// Hold time that arms a hard reset (milliseconds)
    pub hard_reset_hold_ms: u32,

    // --- Link ---
    /// Credential-exchange poll period while in recovery mode (milliseconds)
    pub provisioning_poll_ms: u32,
    /// Hostname prefix; the decimal chip id is appended
    pub hostname_prefix: heapless::String<8>,

    // --- Session ---
    pub broker: BrokerConfig,
    /// Fixed delay before reconnecting after a session loss (milliseconds)
    pub reconnect_delay_ms: u32,
    /// QoS requested for every subscription
    pub subscribe_qos: QosLevel,
    /// QoS used for command acknowledgements
    pub ack_qos: QosLevel,

    // --- Diagnostics ---
    /// Main-loop iterations at or above this duration are logged (milliseconds)
    pub loop_warn_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut hostname_prefix = heapless::String::new();
        let _ = hostname_prefix.push_str("XE");

        Self {
            signal_tick_ms: 100,

            input_sample_ms: 50,
            recovery_hold_ms: 5_000,
            hard_reset_hold_ms: 10_000,

            provisioning_poll_ms: 100,
            hostname_prefix,

            broker: BrokerConfig::default(),
            reconnect_delay_ms: 2_000,
            subscribe_qos: QosLevel::AtLeastOnce,
            ack_qos: QosLevel::ExactlyOnce,

            loop_warn_ms: 100,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON document and validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range and ordering checks.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=1_000).contains(&self.signal_tick_ms) {
            return Err(ConfigError::ValidationFailed("signal_tick_ms must be 10–1000"));
        }
        if !(10..=500).contains(&self.input_sample_ms) {
            return Err(ConfigError::ValidationFailed("input_sample_ms must be 10–500"));
        }
        if self.recovery_hold_ms <= self.input_sample_ms {
            return Err(ConfigError::ValidationFailed(
                "recovery_hold_ms must exceed input_sample_ms",
            ));
        }
        if self.hard_reset_hold_ms <= self.recovery_hold_ms {
            return Err(ConfigError::ValidationFailed(
                "hard_reset_hold_ms must exceed recovery_hold_ms",
            ));
        }
        if !(10..=5_000).contains(&self.provisioning_poll_ms) {
            return Err(ConfigError::ValidationFailed("provisioning_poll_ms must be 10–5000"));
        }
        if self.broker.host.is_empty() {
            return Err(ConfigError::ValidationFailed("broker.host must not be empty"));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::ValidationFailed("broker.port must not be 0"));
        }
        if !(100..=600_000).contains(&self.reconnect_delay_ms) {
            return Err(ConfigError::ValidationFailed("reconnect_delay_ms must be 100–600000"));
        }
        if self.loop_warn_ms == 0 {
            return Err(ConfigError::ValidationFailed("loop_warn_ms must be non-zero"));
        }
        Ok(())
    }
}
