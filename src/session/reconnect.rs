//! One-shot reconnect timer.
//!
//! A fixed delay with unbounded retries: each session loss re-arms the
//! timer, each firing issues exactly one connect.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectTimer {
    deadline_ms: Option<u64>,
}

impl ReconnectTimer {
    pub const fn new() -> Self {
        Self { deadline_ms: None }
    }

    /// Arm (or re-arm) the timer to fire `delay_ms` after `now_ms`.
    pub fn arm(&mut self, now_ms: u64, delay_ms: u32) {
        self.deadline_ms = Some(now_ms.saturating_add(u64::from(delay_ms)));
    }

    /// Detach without firing.  Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline_ms.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// If the deadline has passed, disarm and return `true`.  Fires at most
    /// once per `arm`.
    pub fn take_if_due(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(due) if now_ms >= due => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
