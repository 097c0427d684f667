//! Periodic task scheduler.
//!
//! Replaces free-running hardware tickers with cooperative slots: the
//! runtime calls [`Scheduler::tick`] with the current monotonic time and
//! the scheduler notifies a [`SchedulerDelegate`] for every task that has
//! come due.  The scheduler knows nothing about LEDs, buttons, or the
//! credential exchange.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Scheduler slots                         │
//! │                                                              │
//! │  ┌────────────┐  ┌─────────────┐  ┌───────────────────┐       │
//! │  │ SignalTick │  │ InputSample │  │ ProvisioningPoll  │       │
//! │  │  100 ms    │  │   50 ms     │  │     100 ms        │       │
//! │  └─────┬──────┘  └──────┬──────┘  └─────────┬─────────┘       │
//! │        ▼                ▼                   ▼                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate                         │  │
//! │  │        (runtime collects due tasks)                    │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                  Runtime::run_task()                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::SchedulerDelegate;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// Work items the runtime knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Advance the status LED pattern by one bit.
    SignalTick,
    /// Sample the recovery button.
    InputSample,
    /// Poll the credential exchange (only meaningful in recovery mode).
    ProvisioningPoll,
}

/// A single periodic schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label used in logs.
    pub label: &'static str,
    pub task: Task,
    pub interval_ms: u32,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
pub const MAX_SCHEDULES: usize = 4;

pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// `None` until the first tick anchors the schedule to the clock.
    next_due_ms: Option<u64>,
    fired: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!(
                    "Scheduler: added '{}' every {}ms at slot {}",
                    schedule.label, schedule.interval_ms, i
                );
                *slot = Some(ScheduleEntry {
                    schedule,
                    next_due_ms: None,
                    fired: 0,
                });
                return Some(i);
            }
        }
        None
    }

    /// Fire every schedule whose deadline is at or before `now_ms`.
    ///
    /// The first tick after `add` anchors a schedule: it fires one full
    /// interval later.  Each schedule fires at most once per call; after a
    /// stall longer than one interval the next deadline is re-anchored to
    /// `now_ms` instead of bursting to catch up.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        for entry in self.schedules.iter_mut().flatten() {
            let interval = u64::from(entry.schedule.interval_ms.max(1));

            let Some(due) = entry.next_due_ms else {
                entry.next_due_ms = Some(now_ms + interval);
                continue;
            };
            if now_ms < due {
                continue;
            }

            entry.fired += 1;
            delegate.on_task_due(entry.schedule.label, entry.schedule.task);

            let next = due + interval;
            entry.next_due_ms = Some(if next <= now_ms {
                debug!(
                    "Scheduler: '{}' overran by {}ms, re-anchoring",
                    entry.schedule.label,
                    now_ms - due
                );
                now_ms + interval
            } else {
                next
            });
        }
    }

    /// How many times the schedule in `slot` has fired.
    pub fn fire_count(&self, slot: usize) -> u64 {
        self.schedules
            .get(slot)
            .and_then(Option::as_ref)
            .map_or(0, |e| e.fired)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
