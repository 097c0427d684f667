//! Runtime diagnostics.
//!
//! - [`LoopMonitor`] warns when one main-loop iteration runs too long.
//! - [`RuntimeMetrics`] samples heap figures on demand.
//! - [`StatusReport`] is the serialisable "link state" answer handed to the
//!   external HTTP API.

use log::warn;
use serde::Serialize;

use crate::fsm::DeviceState;
use crate::session::SessionStats;

// ───────────────────────────────────────────────────────────────
// Loop-duration monitor
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct LoopMonitor {
    warn_ms: u64,
    started_ms: u64,
    overruns: u32,
    worst_ms: u64,
}

impl LoopMonitor {
    pub fn new(warn_ms: u32) -> Self {
        Self {
            warn_ms: u64::from(warn_ms),
            started_ms: 0,
            overruns: 0,
            worst_ms: 0,
        }
    }

    /// Mark the start of an iteration.
    pub fn begin(&mut self, now_ms: u64) {
        self.started_ms = now_ms;
    }

    /// Mark the end of an iteration.  Returns the duration if it reached
    /// the warning threshold.
    pub fn end(&mut self, now_ms: u64) -> Option<u64> {
        let took = now_ms.saturating_sub(self.started_ms);
        self.worst_ms = self.worst_ms.max(took);
        if took < self.warn_ms {
            return None;
        }
        self.overruns = self.overruns.wrapping_add(1);
        warn!("Main loop took {}ms (budget {}ms)", took, self.warn_ms);
        Some(took)
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn worst_ms(&self) -> u64 {
        self.worst_ms
    }
}

// ───────────────────────────────────────────────────────────────
// Runtime metrics
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    pub uptime_secs: u64,
    pub heap_free: u32,
    pub heap_min_free: u32,
}

impl RuntimeMetrics {
    #[cfg(target_os = "espidf")]
    pub fn collect(uptime_ms: u64) -> Self {
        use esp_idf_svc::sys::{esp_get_free_heap_size, esp_get_minimum_free_heap_size};
        // SAFETY: both are plain reads of allocator counters.
        let heap_free = unsafe { esp_get_free_heap_size() };
        let heap_min_free = unsafe { esp_get_minimum_free_heap_size() };
        Self {
            uptime_secs: uptime_ms / 1_000,
            heap_free,
            heap_min_free,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_ms: u64) -> Self {
        // Synthetic figures with slow decay so host runs look like hardware.
        let uptime_secs = uptime_ms / 1_000;
        let base_free: u32 = 204_800;
        let decay = (uptime_secs / 60) as u32 * 256;
        let heap_free = base_free.saturating_sub(decay);
        Self {
            uptime_secs,
            heap_free,
            heap_min_free: heap_free - heap_free / 8,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Status report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeCounters {
    pub events_dispatched: u32,
    pub holds: u32,
    pub loop_overruns: u32,
}

/// Snapshot answering "what is the link doing right now".
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: DeviceState,
    pub link_up: bool,
    pub session_connected: bool,
    pub reconnect_pending: bool,
    pub topics: Vec<heapless::String<64>>,
    pub session: SessionStats,
    pub counters: RuntimeCounters,
    pub metrics: RuntimeMetrics,
}

impl StatusReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic reason before the default handler resets the chip.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
