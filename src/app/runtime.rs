//! Cooperative runtime and its single dispatcher.
//!
//! [`Runtime::step`] is called from the main loop with the current
//! monotonic time.  Each step:
//!
//! 1. fires due periodic tasks (status signal, button sample, credential poll);
//! 2. polls the session reconnect timer;
//! 3. drains the event queue through [`Runtime::dispatch`].
//!
//! Steps 2 and 3 are skipped while the supervisor is in recovery mode:
//! queued events wait, in order, until recovery ends.  The periodic tasks
//! keep running so the recovery pattern keeps flashing and a hard reset
//! stays reachable.

use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, error, info};

use crate::config::SystemConfig;
use crate::diagnostics::{LoopMonitor, RuntimeCounters, RuntimeMetrics, StatusReport};
use crate::events::{Event, EventQueue};
use crate::fsm::DeviceState;
use crate::fsm::context::SupervisorEvent;
use crate::scheduler::{MAX_SCHEDULES, Schedule, Scheduler, Task};
use crate::session::SessionManager;

use super::events::AppEvent;
use super::ports::{
    BrokerTransport, EventSink, LinkPort, ProvisioningPort, RestartPort, SchedulerDelegate,
};
use super::supervisor::LinkSupervisor;

/// Collects due tasks so they run after the scheduler borrow ends.
#[derive(Default)]
struct DueTasks(heapless::Vec<Task, MAX_SCHEDULES>);

impl SchedulerDelegate for DueTasks {
    fn on_task_due(&mut self, label: &str, task: Task) {
        if self.0.push(task).is_err() {
            debug!("Runtime: dropping due task '{}'", label);
        }
    }
}

pub struct Runtime<O, I, T: BrokerTransport> {
    supervisor: LinkSupervisor<O, I>,
    session: SessionManager<T>,
    scheduler: Scheduler,
    loop_monitor: LoopMonitor,
    counters: RuntimeCounters,
    last_now_ms: u64,
}

impl<O: OutputPin, I: InputPin, T: BrokerTransport> Runtime<O, I, T> {
    pub fn new(
        supervisor: LinkSupervisor<O, I>,
        session: SessionManager<T>,
        config: &SystemConfig,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        for schedule in [
            Schedule {
                label: "status-signal",
                task: Task::SignalTick,
                interval_ms: config.signal_tick_ms,
            },
            Schedule {
                label: "recovery-button",
                task: Task::InputSample,
                interval_ms: config.input_sample_ms,
            },
            Schedule {
                label: "credential-poll",
                task: Task::ProvisioningPoll,
                interval_ms: config.provisioning_poll_ms,
            },
        ] {
            if scheduler.add(schedule).is_none() {
                error!("Runtime: scheduler full");
            }
        }

        Self {
            supervisor,
            session,
            scheduler,
            loop_monitor: LoopMonitor::new(config.loop_warn_ms),
            counters: RuntimeCounters::default(),
            last_now_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Configure the broker session and boot the supervisor.
    pub fn start(
        &mut self,
        now_ms: u64,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        self.last_now_ms = now_ms;
        if let Err(e) = self.session.begin() {
            error!("Runtime: broker session setup failed: {}", e);
        }
        self.supervisor.start(net, sink);
        // Anchor periodic tasks to the boot time.
        self.scheduler.tick(now_ms, &mut DueTasks::default());
        info!("Runtime started at {}ms", now_ms);
    }

    /// One cooperative iteration.
    pub fn step(
        &mut self,
        now_ms: u64,
        queue: &EventQueue,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        self.last_now_ms = now_ms;

        let mut due = DueTasks::default();
        self.scheduler.tick(now_ms, &mut due);
        for task in due.0 {
            self.run_task(task, now_ms, net, sink);
        }

        if self.supervisor.in_recovery() {
            return;
        }

        self.session.poll(now_ms);

        while !self.supervisor.in_recovery() {
            let Some(event) = queue.pop() else { break };
            self.dispatch(event, now_ms, net, sink);
        }
    }

    /// Route one event to its component.  Link edges go to the supervisor
    /// first, then to the session.
    pub fn dispatch(
        &mut self,
        event: Event,
        now_ms: u64,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        self.counters.events_dispatched = self.counters.events_dispatched.wrapping_add(1);
        match event {
            Event::LinkUp => {
                self.supervisor.handle(SupervisorEvent::LinkUp, net, sink);
                self.session.on_link_up();
            }
            Event::LinkDown => {
                self.supervisor.handle(SupervisorEvent::LinkDown, net, sink);
                self.session.on_link_down();
            }
            Event::ButtonHeld(hold) => {
                self.counters.holds = self.counters.holds.wrapping_add(1);
                self.supervisor.on_hold(hold, net, sink);
            }
            Event::SessionConnected => {
                let report = self.session.on_connected();
                sink.emit(&AppEvent::SessionConnected {
                    subscribed: report.subscribed,
                    failed: report.failed,
                });
            }
            Event::SessionLost => {
                let reconnect_armed = self.session.on_lost(now_ms);
                sink.emit(&AppEvent::SessionLost { reconnect_armed });
            }
            Event::MessageReceived { topic, payload } => {
                let handlers = self.session.on_message_received(&topic, &payload);
                if handlers == 0 {
                    sink.emit(&AppEvent::MessageDropped);
                } else {
                    sink.emit(&AppEvent::MessageDispatched { handlers });
                }
            }
            Event::CredentialsReceived(creds) => {
                self.supervisor
                    .handle(SupervisorEvent::CredentialsReceived(creds), net, sink);
            }
        }
    }

    /// Close out a main-loop iteration that began at `started_ms`.
    pub fn record_loop(&mut self, started_ms: u64, ended_ms: u64, sink: &mut impl EventSink) {
        self.loop_monitor.begin(started_ms);
        if let Some(ms) = self.loop_monitor.end(ended_ms) {
            self.counters.loop_overruns = self.counters.loop_overruns.wrapping_add(1);
            sink.emit(&AppEvent::LoopOverrun { ms });
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> DeviceState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &LinkSupervisor<O, I> {
        &self.supervisor
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    /// Mutable session access, for registering handlers and publishing.
    pub fn session_mut(&mut self) -> &mut SessionManager<T> {
        &mut self.session
    }

    pub fn counters(&self) -> RuntimeCounters {
        self.counters
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            state: self.supervisor.state(),
            link_up: self.session.is_link_up(),
            session_connected: self.session.is_connected(),
            reconnect_pending: self.session.reconnect_pending(),
            topics: self
                .session
                .topics()
                .filter_map(|t| heapless::String::try_from(t).ok())
                .collect(),
            session: self.session.stats(),
            counters: self.counters,
            metrics: RuntimeMetrics::collect(self.last_now_ms),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn run_task(
        &mut self,
        task: Task,
        now_ms: u64,
        net: &mut (impl LinkPort + ProvisioningPort + RestartPort),
        sink: &mut impl EventSink,
    ) {
        match task {
            Task::SignalTick => self.supervisor.tick_signal(),
            Task::InputSample => {
                if let Some(hold) = self.supervisor.sample_input(now_ms) {
                    self.dispatch(Event::ButtonHeld(hold), now_ms, net, sink);
                }
            }
            Task::ProvisioningPoll => {
                if !self.supervisor.in_recovery() {
                    return;
                }
                if let Some(creds) = net.poll_credentials() {
                    self.dispatch(Event::CredentialsReceived(creds), now_ms, net, sink);
                }
            }
        }
    }
}
