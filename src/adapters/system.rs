//! Process restart.
//!
//! On hardware [`SystemRestart`] calls `esp_restart()` and never returns.
//! The host version only counts requests, so tests can observe a hard
//! reset without ending the process.

use log::warn;

use crate::app::ports::RestartPort;

#[derive(Debug, Default)]
pub struct SystemRestart {
    requests: u32,
}

impl SystemRestart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }
}

impl RestartPort for SystemRestart {
    fn restart(&mut self) {
        self.requests = self.requests.wrapping_add(1);
        warn!("System: restarting");
        #[cfg(target_os = "espidf")]
        esp_idf_svc::hal::reset::restart();
    }
}
