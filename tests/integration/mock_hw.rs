//! Mock hardware and network adapters for integration tests.
//!
//! Records every port call so tests can assert on the full command
//! history without touching GPIO, the radio, or a broker.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use linkcore::app::events::AppEvent;
use linkcore::app::ports::{
    BrokerEndpoint, BrokerTransport, Credentials, EventSink, LinkPort, ProvisioningPort, QosLevel,
    RestartPort, SwitchPort,
};
use linkcore::app::runtime::Runtime;
use linkcore::app::supervisor::LinkSupervisor;
use linkcore::config::SystemConfig;
use linkcore::error::{LinkError, ProvisioningError, TransportError};
use linkcore::events::{Event, EventQueue};
use linkcore::session::{SessionManager, SessionSettings};

// ── Pins ──────────────────────────────────────────────────────

/// Output pin that records every level written.
#[derive(Clone, Default)]
pub struct MockOutput {
    pub levels: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<bool> {
        self.levels.borrow().last().copied()
    }
}

impl embedded_hal::digital::ErrorType for MockOutput {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

/// Input pin whose level is shared with the test body.  Starts high
/// (released, for an active-low button).
#[derive(Clone)]
pub struct MockInput {
    pub high: Rc<Cell<bool>>,
}

impl Default for MockInput {
    fn default() -> Self {
        Self {
            high: Rc::new(Cell::new(true)),
        }
    }
}

impl embedded_hal::digital::ErrorType for MockInput {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high.get())
    }
}

// ── Network (link + provisioning + restart) ───────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCall {
    Connect,
    StationMode,
    ApplyCredentials(String),
    AutoConnect(bool),
    StopProvisioning,
    StartProvisioning,
    Restart,
}

#[derive(Default)]
pub struct MockNet {
    pub calls: Vec<NetCall>,
    /// Handed out by the next `poll_credentials` while provisioning runs.
    pub pending: Option<Credentials>,
    pub provisioning: bool,
}

#[allow(dead_code)]
impl MockNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, call: &NetCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn take_calls(&mut self) -> Vec<NetCall> {
        std::mem::take(&mut self.calls)
    }
}

impl LinkPort for MockNet {
    fn request_connect(&mut self) -> Result<(), LinkError> {
        self.calls.push(NetCall::Connect);
        Ok(())
    }

    fn enter_station_mode(&mut self) {
        self.calls.push(NetCall::StationMode);
    }

    fn apply_credentials(&mut self, creds: &Credentials) -> Result<(), LinkError> {
        creds.validate()?;
        self.calls.push(NetCall::ApplyCredentials(creds.ssid_lossy().into_owned()));
        Ok(())
    }

    fn set_auto_connect(&mut self, enabled: bool) {
        self.calls.push(NetCall::AutoConnect(enabled));
    }
}

impl ProvisioningPort for MockNet {
    fn stop_provisioning(&mut self) {
        self.provisioning = false;
        self.calls.push(NetCall::StopProvisioning);
    }

    fn start_provisioning(&mut self) -> Result<(), ProvisioningError> {
        self.provisioning = true;
        self.calls.push(NetCall::StartProvisioning);
        Ok(())
    }

    fn poll_credentials(&mut self) -> Option<Credentials> {
        if !self.provisioning {
            return None;
        }
        self.pending.take()
    }
}

impl RestartPort for MockNet {
    fn restart(&mut self) {
        self.calls.push(NetCall::Restart);
    }
}

// ── Broker transport ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: String,
    pub qos: QosLevel,
    pub retain: bool,
}

#[derive(Default)]
pub struct MockTransport {
    pub endpoint: Option<BrokerEndpoint>,
    pub connects: u32,
    pub subscriptions: Vec<(String, QosLevel)>,
    pub published: Vec<Publish>,
    pub reject_subscribe: Vec<String>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribed_topics(&self) -> Vec<&str> {
        self.subscriptions.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl BrokerTransport for MockTransport {
    fn configure(&mut self, endpoint: &BrokerEndpoint) -> Result<(), TransportError> {
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn connect(&mut self) {
        self.connects += 1;
    }

    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), TransportError> {
        if self.reject_subscribe.iter().any(|t| t == topic) {
            return Err(TransportError::Rejected(-1));
        }
        self.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        qos: QosLevel,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.published.push(Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Appliance switch ──────────────────────────────────────────

/// Records every `set_switch` call; clones share the record.
#[derive(Clone, Default)]
pub struct MockSwitch {
    pub states: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.states.borrow().last().copied().unwrap_or(false)
    }

    pub fn changes(&self) -> usize {
        self.states.borrow().len()
    }
}

impl SwitchPort for MockSwitch {
    fn set_switch(&mut self, on: bool) {
        self.states.borrow_mut().push(on);
    }
}

// ── Full runtime rig ──────────────────────────────────────────

pub type TestRuntime = Runtime<MockOutput, MockInput, MockTransport>;

pub const HOSTNAME: &str = "XE1234567";

/// A runtime wired to mocks, with a simulated clock stepped in 10 ms
/// increments like the firmware main loop.
#[allow(dead_code)]
pub struct Rig {
    pub runtime: TestRuntime,
    pub queue: EventQueue,
    pub net: MockNet,
    pub sink: RecordingSink,
    pub led: MockOutput,
    pub button: MockInput,
    pub config: SystemConfig,
    pub now: u64,
}

#[allow(dead_code)]
impl Rig {
    pub const STEP_MS: u64 = 10;

    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        let led = MockOutput::new();
        let button = MockInput::default();
        let supervisor = LinkSupervisor::with_pins(
            Some(led.clone()),
            true,
            Some(button.clone()),
            true,
            &config,
            0,
        );
        let session = SessionManager::new(
            MockTransport::new(),
            config.broker.endpoint(HOSTNAME),
            SessionSettings::from(&config),
        );
        let runtime = Runtime::new(supervisor, session, &config);
        Self {
            runtime,
            queue: EventQueue::new(),
            net: MockNet::new(),
            sink: RecordingSink::new(),
            led,
            button,
            config,
            now: 0,
        }
    }

    pub fn start(&mut self) {
        self.runtime.start(self.now, &mut self.net, &mut self.sink);
    }

    /// Run the main loop for `ms` of simulated time.
    pub fn advance(&mut self, ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.now += Self::STEP_MS;
            self.runtime
                .step(self.now, &self.queue, &mut self.net, &mut self.sink);
        }
    }

    pub fn push(&self, event: Event) {
        assert!(self.queue.push(event), "test queue overflow");
    }

    pub fn push_message(&self, topic: &str, payload: &str) {
        self.push(Event::message(topic, payload).expect("topic fits"));
    }

    pub fn press(&self) {
        self.button.high.set(false);
    }

    pub fn release(&self) {
        self.button.high.set(true);
    }

    /// Start, bring the link up, and establish the broker session.
    pub fn bring_up(&mut self) {
        self.start();
        self.push(Event::LinkUp);
        self.advance(Self::STEP_MS);
        self.push(Event::SessionConnected);
        self.advance(Self::STEP_MS);
    }

    pub fn transport(&self) -> &MockTransport {
        self.runtime.session().transport()
    }
}
