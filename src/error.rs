//! Unified error types for the connectivity core.
//!
//! Each port has its own small `Copy` error enum so adapters can report
//! failures without allocating.  Everything funnels into [`Error`] for the
//! few call sites (bring-up, config loading) that need a single type.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::session::SessionError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The wireless link driver rejected a request.
    Link(LinkError),
    /// The out-of-band credential exchange failed.
    Provisioning(ProvisioningError),
    /// The broker transport rejected a request.
    Transport(TransportError),
    /// The session manager refused an operation.
    Session(SessionError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// SSID empty or longer than 32 bytes.
    InvalidSsid,
    /// Password neither empty (open network) nor 8–64 bytes.
    InvalidPassword,
    /// The WiFi driver returned an ESP-IDF error code.
    Driver(i32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Driver(code) => write!(f, "WiFi driver error {code}"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    /// The SmartConfig listener could not be started.
    StartFailed(i32),
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed(code) => write!(f, "credential listener failed to start ({code})"),
        }
    }
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

// ---------------------------------------------------------------------------
// Broker transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// `connect`/`subscribe`/`publish` called before `configure`.
    NotConfigured,
    /// The client refused the request (queue full, not connected, ...).
    Rejected(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "broker endpoint not configured"),
            Self::Rejected(code) => write!(f, "broker client rejected request ({code})"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
