//! Device identity derived from the factory MAC address.
//!
//! The chip id is the low three MAC bytes read as a big-endian integer.
//! The hostname is the configured prefix followed by that id in decimal
//! (e.g. `XE13417454`).  It names the station interface, doubles as the
//! default broker client id, and seeds the command topic.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

pub type Hostname = heapless::String<32>;

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly six bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn chip_id(mac: &MacAddress) -> u32 {
    u32::from_be_bytes([0, mac[3], mac[4], mac[5]])
}

/// `prefix` + decimal chip id.
pub fn hostname(prefix: &str, mac: &MacAddress) -> Hostname {
    let mut name = Hostname::new();
    let _ = write!(name, "{}{}", prefix, chip_id(mac));
    name
}
