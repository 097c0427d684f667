//! Fuzz target: SmartConfig credential buffers
//!
//! Splits the input into the driver's fixed-size SSID and password
//! buffers and runs them through conversion and validation.  Accepted
//! credentials must respect the length rules and carry the SSID bytes
//! unchanged up to the first NUL.
//!
//! cargo fuzz run fuzz_smartconfig_credentials

#![no_main]

use libfuzzer_sys::fuzz_target;
use linkcore::adapters::provisioning::raw_credentials;

fuzz_target!(|data: &[u8]| {
    let split = data.len().min(32);
    let (ssid, password) = data.split_at(split);
    let password = &password[..password.len().min(64)];

    let creds = raw_credentials(ssid, password);
    if creds.validate().is_ok() {
        assert!(!creds.ssid.is_empty() && creds.ssid.len() <= 32);
        let end = ssid.iter().position(|&b| b == 0).unwrap_or(ssid.len());
        assert_eq!(creds.ssid.as_slice(), &ssid[..end]);
        assert!(creds.password.is_empty() || (8..=64).contains(&creds.password.len()));
    }
});
