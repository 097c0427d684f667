//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`].  Requests go straight to the driver; outcomes
//! come back as `Event::LinkUp` / `Event::LinkDown` pushed into the shared
//! [`EventQueue`] from the system event loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` plus
//!   `WifiEvent` / `IpEvent` subscriptions on the system event loop.
//! - **all other targets**: simulation that records every request and
//!   reports the link up as soon as a connect is requested with an SSID.
//!
//! ## Retry policy
//!
//! While a connection is wanted, every station disconnect triggers another
//! association attempt.  `LinkDown` is pushed only on an up→down edge so the
//! supervisor never sees a storm of failed attempts.

use log::{info, warn};

use crate::app::ports::{Credentials, LinkPort};
use crate::error::LinkError;
use crate::events::{Event, EventQueue};

#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::netif::IpEvent;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    EspError, esp, esp_wifi_get_config, esp_wifi_set_config, esp_wifi_set_mode,
    esp_wifi_set_storage, wifi_auth_mode_t_WIFI_AUTH_OPEN, wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK,
    wifi_config_t, wifi_interface_t_WIFI_IF_STA, wifi_mode_t_WIFI_MODE_STA, wifi_storage_t,
    wifi_storage_t_WIFI_STORAGE_FLASH, wifi_storage_t_WIFI_STORAGE_RAM,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{EspWifi, WifiEvent};

#[cfg(target_os = "espidf")]
fn driver_err(e: EspError) -> LinkError {
    LinkError::Driver(e.code())
}

#[cfg(target_os = "espidf")]
fn set_storage(storage: wifi_storage_t) -> Result<(), EspError> {
    // SAFETY: called only while the driver owned by `WifiLink` is initialised.
    esp!(unsafe { esp_wifi_set_storage(storage) })
}

/// Re-write the active station config so it lands in the current storage.
#[cfg(target_os = "espidf")]
fn rewrite_station_config() -> Result<(), EspError> {
    // SAFETY: all-zero is a valid `wifi_config_t`; the driver fills it in.
    let mut config: wifi_config_t = unsafe { core::mem::zeroed() };
    esp!(unsafe { esp_wifi_get_config(wifi_interface_t_WIFI_IF_STA, &mut config) })?;
    esp!(unsafe { esp_wifi_set_config(wifi_interface_t_WIFI_IF_STA, &mut config) })
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiLink {
    wifi: EspWifi<'static>,
    /// Link currently has an address.
    up: Arc<AtomicBool>,
    /// A connection is wanted; disconnects are retried.
    wanted: Arc<AtomicBool>,
    _wifi_sub: EspSubscription<'static, System>,
    _ip_sub: EspSubscription<'static, System>,
}

#[cfg(target_os = "espidf")]
impl WifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        hostname: &str,
        queue: &'static EventQueue,
    ) -> Result<Self, LinkError> {
        let mut wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(driver_err)?;
        wifi.sta_netif_mut().set_hostname(hostname).map_err(driver_err)?;

        let up = Arc::new(AtomicBool::new(false));
        let wanted = Arc::new(AtomicBool::new(false));

        let wifi_sub = {
            let up = up.clone();
            let wanted = wanted.clone();
            sysloop
                .subscribe::<WifiEvent, _>(move |event| {
                    if let WifiEvent::StaDisconnected(_) = event {
                        if up.swap(false, Ordering::SeqCst) {
                            queue.push(Event::LinkDown);
                        }
                        if wanted.load(Ordering::SeqCst) {
                            // SAFETY: plain request to the running WiFi driver.
                            unsafe {
                                esp_idf_svc::sys::esp_wifi_connect();
                            }
                        }
                    }
                })
                .map_err(driver_err)?
        };

        let ip_sub = {
            let up = up.clone();
            sysloop
                .subscribe::<IpEvent, _>(move |event| {
                    if let IpEvent::DhcpIpAssigned(_) = event {
                        if !up.swap(true, Ordering::SeqCst) {
                            queue.push(Event::LinkUp);
                        }
                    }
                })
                .map_err(driver_err)?
        };

        info!("WiFi: station driver ready (hostname '{}')", hostname);
        Ok(Self {
            wifi,
            up,
            wanted,
            _wifi_sub: wifi_sub,
            _ip_sub: ip_sub,
        })
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

#[cfg(target_os = "espidf")]
impl LinkPort for WifiLink {
    fn request_connect(&mut self) -> Result<(), LinkError> {
        self.wanted.store(true, Ordering::SeqCst);
        if !self.wifi.is_started().map_err(driver_err)? {
            self.wifi.start().map_err(driver_err)?;
        }
        info!("WiFi: association requested");
        self.wifi.connect().map_err(driver_err)
    }

    fn enter_station_mode(&mut self) {
        self.wanted.store(false, Ordering::SeqCst);
        // Recovery writes go to RAM only; the stored network survives a
        // restart until new credentials are persisted.
        if let Err(e) = set_storage(wifi_storage_t_WIFI_STORAGE_RAM) {
            warn!("WiFi: RAM storage not selected: {}", e);
        }
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect before station reset failed: {}", e);
        }
        // SAFETY: plain mode switch on the initialised driver.
        if let Err(e) = esp!(unsafe { esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_STA) }) {
            warn!("WiFi: station mode not set: {}", e);
        }
        if !self.wifi.is_started().unwrap_or(false) {
            if let Err(e) = self.wifi.start() {
                warn!("WiFi: start in station mode failed: {}", e);
            }
        }
    }

    fn apply_credentials(&mut self, creds: &Credentials) -> Result<(), LinkError> {
        creds.validate()?;
        // SAFETY: all-zero is a valid `wifi_config_t`.
        let mut config: wifi_config_t = unsafe { core::mem::zeroed() };
        {
            // SAFETY: `sta` is the member the driver reads for WIFI_IF_STA.
            let sta = unsafe { &mut config.sta };
            // Lengths are bounded by validation (≤ 32 / ≤ 64 bytes).
            sta.ssid[..creds.ssid.len()].copy_from_slice(&creds.ssid);
            sta.password[..creds.password.len()].copy_from_slice(&creds.password);
            sta.threshold.authmode = if creds.password.is_empty() {
                wifi_auth_mode_t_WIFI_AUTH_OPEN
            } else {
                wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK
            };
        }
        // SAFETY: `config` outlives the call; the driver copies it.
        esp!(unsafe { esp_wifi_set_config(wifi_interface_t_WIFI_IF_STA, &mut config) })
            .map_err(driver_err)?;
        info!("WiFi: credentials stored for '{}'", creds.ssid_lossy());
        Ok(())
    }

    fn set_auto_connect(&mut self, enabled: bool) {
        let storage = if enabled {
            wifi_storage_t_WIFI_STORAGE_FLASH
        } else {
            wifi_storage_t_WIFI_STORAGE_RAM
        };
        if let Err(e) = set_storage(storage) {
            warn!("WiFi: auto-connect persistence failed: {}", e);
            return;
        }
        if enabled {
            if let Err(e) = rewrite_station_config() {
                warn!("WiFi: station config not persisted: {}", e);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation
// ───────────────────────────────────────────────────────────────

/// Host-side stand-in: every request is counted, and a connect with a
/// configured SSID reports the link up immediately.
///
/// Driver storage is modelled too: `stored` is what survives a restart,
/// `ssid` is the active config.  Writes reach `stored` only while flash
/// storage is selected.
#[cfg(not(target_os = "espidf"))]
pub struct WifiLink {
    queue: &'static EventQueue,
    ssid: heapless::Vec<u8, 32>,
    stored: heapless::Vec<u8, 32>,
    flash_storage: bool,
    up: bool,
    auto_connect: bool,
    connect_requests: u32,
    station_resets: u32,
}

#[cfg(not(target_os = "espidf"))]
impl WifiLink {
    pub fn new(queue: &'static EventQueue) -> Self {
        info!("WiFi(sim): simulation backend");
        Self {
            queue,
            ssid: heapless::Vec::new(),
            stored: heapless::Vec::new(),
            flash_storage: true,
            up: false,
            auto_connect: false,
            connect_requests: 0,
            station_resets: 0,
        }
    }

    /// Pre-load a stored network, as if saved on a previous boot.
    pub fn with_stored_ssid(mut self, ssid: &str) -> Self {
        match heapless::Vec::from_slice(ssid.as_bytes()) {
            Ok(bytes) => {
                self.ssid = bytes;
                self.stored = self.ssid.clone();
            }
            Err(()) => warn!("WiFi(sim): stored SSID too long, ignored"),
        }
        self
    }

    /// Simulate the access point going away.
    pub fn drop_link(&mut self) {
        if self.up {
            self.up = false;
            self.queue.push(Event::LinkDown);
        }
    }

    /// Simulate a power cycle: RAM config is lost, flash config reloads.
    pub fn power_cycle(&mut self) {
        self.up = false;
        self.flash_storage = true;
        self.ssid = self.stored.clone();
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Active SSID bytes.
    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }

    /// SSID that survives a restart.
    pub fn stored_ssid(&self) -> &[u8] {
        &self.stored
    }

    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }

    pub fn connect_requests(&self) -> u32 {
        self.connect_requests
    }

    pub fn station_resets(&self) -> u32 {
        self.station_resets
    }
}

#[cfg(not(target_os = "espidf"))]
impl LinkPort for WifiLink {
    fn request_connect(&mut self) -> Result<(), LinkError> {
        self.connect_requests = self.connect_requests.wrapping_add(1);
        if self.ssid.is_empty() {
            info!("WiFi(sim): no configured network, staying down");
            return Ok(());
        }
        if !self.up {
            self.up = true;
            info!(
                "WiFi(sim): associated with '{}'",
                String::from_utf8_lossy(&self.ssid)
            );
            self.queue.push(Event::LinkUp);
        }
        Ok(())
    }

    fn enter_station_mode(&mut self) {
        self.station_resets = self.station_resets.wrapping_add(1);
        self.flash_storage = false;
        self.drop_link();
    }

    fn apply_credentials(&mut self, creds: &Credentials) -> Result<(), LinkError> {
        creds.validate()?;
        self.ssid.clone_from(&creds.ssid);
        if self.flash_storage {
            self.stored.clone_from(&creds.ssid);
        }
        info!("WiFi(sim): credentials applied for '{}'", creds.ssid_lossy());
        Ok(())
    }

    fn set_auto_connect(&mut self, enabled: bool) {
        self.auto_connect = enabled;
        self.flash_storage = enabled;
        if enabled {
            self.stored.clone_from(&self.ssid);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
