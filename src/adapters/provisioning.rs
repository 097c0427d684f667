//! Out-of-band credential exchange (ESP-Touch SmartConfig).
//!
//! Implements [`ProvisioningPort`].  A phone app broadcasts the network
//! credentials; the driver decodes them and raises `SC_EVENT_GOT_SSID_PSWD`.
//! The event handler parks the result in a single slot that
//! [`poll_credentials`](ProvisioningPort::poll_credentials) takes.
//!
//! Credentials are handed over as received.  Validation is the
//! supervisor's job, so a bad exchange can be rejected and restarted.

use log::{info, warn};

use crate::app::ports::{Credentials, ProvisioningPort};
use crate::error::ProvisioningError;

/// Build credentials from the driver's fixed-size, NUL-padded buffers.
///
/// Bytes are copied unchanged up to the first NUL; overlong fields are cut
/// at capacity.  Nothing is validated here.
pub fn raw_credentials(ssid: &[u8], password: &[u8]) -> Credentials {
    Credentials {
        ssid: until_nul(ssid),
        password: until_nul(password),
    }
}

fn until_nul<const N: usize>(raw: &[u8]) -> heapless::Vec<u8, N> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len()).min(N);
    raw[..end].iter().copied().collect()
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use core::ffi::c_void;
    use std::sync::Mutex;

    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use super::raw_credentials;
    use crate::app::ports::Credentials;

    /// Written by the event handler, taken by the runtime.
    pub(super) static RECEIVED: Mutex<Option<Credentials>> = Mutex::new(None);

    pub(super) unsafe extern "C" fn on_smartconfig_event(
        _arg: *mut c_void,
        _base: esp_event_base_t,
        id: i32,
        data: *mut c_void,
    ) {
        if id == smartconfig_event_t_SC_EVENT_GOT_SSID_PSWD as i32 && !data.is_null() {
            // SAFETY: the driver passes a `smartconfig_event_got_ssid_pswd_t`
            // for this event id; it stays valid for the duration of the call.
            let evt = unsafe { &*(data as *const smartconfig_event_got_ssid_pswd_t) };
            let creds = raw_credentials(&evt.ssid, &evt.password);
            info!("SmartConfig: received credentials for '{}'", creds.ssid_lossy());
            match RECEIVED.lock() {
                Ok(mut slot) => *slot = Some(creds),
                Err(_) => warn!("SmartConfig: credential slot poisoned"),
            }
        } else if id == smartconfig_event_t_SC_EVENT_SCAN_DONE as i32 {
            info!("SmartConfig: channel scan done");
        }
    }

    pub(super) fn register() -> Result<(), EspError> {
        // SAFETY: registers a plain `extern "C"` handler with no user argument.
        esp!(unsafe {
            esp_event_handler_register(
                SC_EVENT,
                ESP_EVENT_ANY_ID,
                Some(on_smartconfig_event),
                core::ptr::null_mut(),
            )
        })
    }

    pub(super) fn unregister() {
        // SAFETY: same base / id / handler triple as `register`.
        let ret = esp!(unsafe {
            esp_event_handler_unregister(SC_EVENT, ESP_EVENT_ANY_ID, Some(on_smartconfig_event))
        });
        if let Err(e) = ret {
            warn!("SmartConfig: handler unregister failed: {}", e);
        }
    }

    pub(super) fn start() -> Result<(), EspError> {
        esp!(unsafe { esp_smartconfig_set_type(smartconfig_type_t_SC_TYPE_ESPTOUCH) })?;
        // SAFETY: zeroed = logging off, no ESP-Touch v2 key.
        let cfg: smartconfig_start_config_t = unsafe { core::mem::zeroed() };
        esp!(unsafe { esp_smartconfig_start(&cfg) })
    }

    pub(super) fn stop() {
        // SAFETY: stopping an idle SmartConfig is a no-op.
        unsafe {
            esp_smartconfig_stop();
        }
    }

    pub(super) fn take() -> Option<Credentials> {
        RECEIVED.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[cfg(target_os = "espidf")]
pub struct SmartConfig {
    active: bool,
}

#[cfg(target_os = "espidf")]
impl SmartConfig {
    pub fn new() -> Result<Self, ProvisioningError> {
        platform::register().map_err(|e| ProvisioningError::StartFailed(e.code()))?;
        Ok(Self { active: false })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(target_os = "espidf")]
impl Drop for SmartConfig {
    fn drop(&mut self) {
        self.stop_provisioning();
        platform::unregister();
    }
}

#[cfg(target_os = "espidf")]
impl ProvisioningPort for SmartConfig {
    fn stop_provisioning(&mut self) {
        if self.active {
            platform::stop();
            self.active = false;
            info!("SmartConfig: stopped");
        }
        // Anything left over belongs to the exchange that just ended.
        let _ = platform::take();
    }

    fn start_provisioning(&mut self) -> Result<(), ProvisioningError> {
        platform::start().map_err(|e| {
            warn!("SmartConfig: start failed: {}", e);
            ProvisioningError::StartFailed(e.code())
        })?;
        self.active = true;
        info!("SmartConfig: listening for credentials");
        Ok(())
    }

    fn poll_credentials(&mut self) -> Option<Credentials> {
        if !self.active {
            return None;
        }
        platform::take()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SmartConfig {
    active: bool,
    pending: Option<Credentials>,
    starts: u32,
    stops: u32,
    fail_next_start: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SmartConfig {
    pub fn new() -> Result<Self, ProvisioningError> {
        info!("SmartConfig(sim): simulation backend");
        Ok(Self::default())
    }

    /// Deliver credentials as if a phone had broadcast them.  Ignored
    /// unless an exchange is running.
    pub fn inject_credentials(&mut self, creds: Credentials) -> bool {
        if !self.active {
            warn!("SmartConfig(sim): not listening, credentials ignored");
            return false;
        }
        self.pending = Some(creds);
        true
    }

    /// Make the next `start_provisioning` fail.
    pub fn fail_next_start(&mut self) {
        self.fail_next_start = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }
}

#[cfg(not(target_os = "espidf"))]
impl ProvisioningPort for SmartConfig {
    fn stop_provisioning(&mut self) {
        if self.active {
            self.active = false;
            self.stops = self.stops.wrapping_add(1);
        }
        self.pending = None;
    }

    fn start_provisioning(&mut self) -> Result<(), ProvisioningError> {
        if core::mem::take(&mut self.fail_next_start) {
            return Err(ProvisioningError::StartFailed(-1));
        }
        self.active = true;
        self.starts = self.starts.wrapping_add(1);
        Ok(())
    }

    fn poll_credentials(&mut self) -> Option<Credentials> {
        if !self.active {
            return None;
        }
        self.pending.take()
    }
}
