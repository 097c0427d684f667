//! NVS (Non-Volatile Storage) config adapter.
//!
//! Implements [`ConfigPort`]: the [`SystemConfig`] is stored as one
//! postcard blob under `linkcore/syscfg`.
//!
//! - Validation runs before every write; an invalid config never reaches flash.
//! - A missing blob yields defaults.  A blob that no longer decodes (for
//!   example after a firmware update changed the layout) also yields
//!   defaults, with a warning.
//! - The simulation backend keeps the blob in memory.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &str = "linkcore";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &str = "syscfg";

/// Upper bound for the encoded config blob.
const MAX_BLOB_SIZE: usize = 512;

fn decode(bytes: &[u8]) -> SystemConfig {
    match postcard::from_bytes::<SystemConfig>(bytes) {
        Ok(cfg) => match cfg.validate() {
            Ok(()) => cfg,
            Err(e) => {
                warn!("NvsConfigStore: stored config rejected ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(_) => {
            warn!("NvsConfigStore: stored config unreadable, using defaults");
            SystemConfig::default()
        }
    }
}

fn encode(config: &SystemConfig) -> Result<Vec<u8>, ConfigError> {
    config.validate()?;
    let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::ValidationFailed("encoded config too large"));
    }
    Ok(bytes)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct NvsConfigStore {
    nvs: EspNvs<NvsDefault>,
}

#[cfg(target_os = "espidf")]
impl NvsConfigStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NvsConfigStore: namespace open failed: {}", e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self { nvs })
    }
}

#[cfg(target_os = "espidf")]
impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.nvs.get_blob(CONFIG_KEY, &mut buf) {
            Ok(Some(bytes)) => {
                info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
                Ok(decode(bytes))
            }
            Ok(None) => {
                info!("NvsConfigStore: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("NvsConfigStore: read error {}, using defaults", e);
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        let bytes = encode(config)?;
        self.nvs.set_blob(CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsConfigStore: write error {}", e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct NvsConfigStore {
    blob: Option<Vec<u8>>,
}

#[cfg(not(target_os = "espidf"))]
impl NvsConfigStore {
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsConfigStore: simulation backend");
        Ok(Self::default())
    }

    /// Overwrite the raw stored bytes (corruption tests).
    pub fn set_raw(&mut self, bytes: &[u8]) {
        self.blob = Some(bytes.to_vec());
    }
}

#[cfg(not(target_os = "espidf"))]
impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.blob.as_deref() {
            Some(bytes) => Ok(decode(bytes)),
            None => {
                info!("NvsConfigStore: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        let bytes = encode(config)?;
        info!("NvsConfigStore: config saved ({} bytes, simulation)", bytes.len());
        self.blob = Some(bytes);
        Ok(())
    }
}
