//! The runtime wired to the host simulation adapters, the same set the
//! firmware uses on target: WiFi, SmartConfig, MQTT, restart, NVS.

use linkcore::adapters::device_id;
use linkcore::adapters::hardware::SwitchAdapter;
use linkcore::adapters::log_sink::LogEventSink;
use linkcore::adapters::mqtt::MqttTransport;
use linkcore::adapters::network::Network;
use linkcore::adapters::nvs::NvsConfigStore;
use linkcore::adapters::provisioning::{SmartConfig, raw_credentials};
use linkcore::adapters::system::SystemRestart;
use linkcore::adapters::wifi::WifiLink;
use linkcore::app::commands::{register_switch_handler, switch_topic};
use linkcore::app::ports::{ConfigPort, Credentials, QosLevel};
use linkcore::app::runtime::Runtime;
use linkcore::app::supervisor::LinkSupervisor;
use linkcore::config::SystemConfig;
use linkcore::drivers::input_monitor::HoldEvent;
use linkcore::events::{Event, EventQueue};
use linkcore::fsm::DeviceState;
use linkcore::session::{SessionManager, SessionSettings};

use crate::mock_hw::{MockInput, MockOutput};

type SimNet = Network<WifiLink, SmartConfig, SystemRestart>;

struct Device {
    runtime: Runtime<MockOutput, MockInput, MqttTransport>,
    queue: &'static EventQueue,
    net: SimNet,
    sink: LogEventSink,
    appliance: MockOutput,
    topic: String,
    now: u64,
}

impl Device {
    fn boot(config: &SystemConfig, stored_ssid: Option<&str>) -> Self {
        let queue: &'static EventQueue = Box::leak(Box::new(EventQueue::new()));
        let hostname = device_id::hostname(&config.hostname_prefix, &device_id::read_mac());

        let mut link = WifiLink::new(queue);
        if let Some(ssid) = stored_ssid {
            link = link.with_stored_ssid(ssid);
        }
        let net = Network::new(link, SmartConfig::new().unwrap(), SystemRestart::new());

        let supervisor =
            LinkSupervisor::with_pins(None::<MockOutput>, true, None::<MockInput>, true, config, 0);
        let session = SessionManager::new(
            MqttTransport::new(queue),
            config.broker.endpoint(&hostname),
            SessionSettings::from(config),
        );
        let mut runtime = Runtime::new(supervisor, session, config);

        let appliance = MockOutput::new();
        let switch = SwitchAdapter::new(appliance.clone(), true, None::<MockOutput>, true);
        let topic = switch_topic(&hostname).to_string();
        register_switch_handler(runtime.session_mut(), &topic, switch, config.ack_qos).unwrap();

        let mut dev = Self {
            runtime,
            queue,
            net,
            sink: LogEventSink::new(),
            appliance,
            topic,
            now: 0,
        };
        dev.runtime.start(0, &mut dev.net, &mut dev.sink);
        dev
    }

    fn advance(&mut self, ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.now += 10;
            self.runtime
                .step(self.now, self.queue, &mut self.net, &mut self.sink);
        }
    }

    fn transport(&mut self) -> &mut MqttTransport {
        self.runtime.session_mut().transport_mut()
    }
}

#[test]
fn hostname_and_topic_derive_from_mac() {
    let dev = Device::boot(&SystemConfig::default(), None);
    assert_eq!(dev.topic, "xe15715070x002");
}

#[test]
fn stored_network_reaches_broker_on_boot() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("HomeWiFi"));
    dev.advance(10);

    assert_eq!(dev.runtime.state(), DeviceState::Ready);
    assert!(dev.runtime.session().is_connected());
    let topic = dev.topic.clone();
    let subs = dev.transport().subscriptions().to_vec();
    assert_eq!(subs, vec![(topic, QosLevel::AtLeastOnce)]);
    assert_eq!(dev.transport().endpoint().unwrap().client_id.as_str(), "XE15715070");
}

#[test]
fn no_stored_network_stays_connecting() {
    let mut dev = Device::boot(&SystemConfig::default(), None);
    dev.advance(1_000);
    assert_eq!(dev.runtime.state(), DeviceState::Connecting);
    assert_eq!(dev.transport().connects(), 0);
}

#[test]
fn broker_command_drives_appliance_and_acks() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("HomeWiFi"));
    dev.advance(10);

    let topic = dev.topic.clone();
    assert!(dev.transport().deliver(&topic, "on#42"));
    dev.advance(10);

    assert_eq!(dev.appliance.last(), Some(true));
    let acks = dev.transport().published().to_vec();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].payload, b"on#42");
    assert_eq!(acks[0].qos, QosLevel::ExactlyOnce);
    assert!(acks[0].retain);
}

#[test]
fn unreachable_broker_retries_every_delay() {
    let mut dev = Device::boot(&SystemConfig::default(), None);
    dev.transport().set_reachable(false);
    dev.net.link = WifiLink::new(dev.queue).with_stored_ssid("HomeWiFi");
    dev.queue.push(Event::LinkUp);
    dev.advance(10);
    assert_eq!(dev.transport().connects(), 1);

    dev.advance(2_000);
    assert_eq!(dev.transport().connects(), 2);

    dev.transport().set_reachable(true);
    dev.advance(2_000);
    assert_eq!(dev.transport().connects(), 3);
    assert!(dev.runtime.session().is_connected());
}

#[test]
fn dropped_session_reconnects_once_after_delay() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("HomeWiFi"));
    dev.advance(10);
    assert_eq!(dev.transport().connects(), 1);

    dev.transport().drop_session();
    dev.advance(1_990);
    assert_eq!(dev.transport().connects(), 1);
    assert!(!dev.runtime.session().is_connected());

    dev.advance(30);
    assert_eq!(dev.transport().connects(), 2);
    assert!(dev.runtime.session().is_connected());

    dev.advance(10_000);
    assert_eq!(dev.transport().connects(), 2);
}

#[test]
fn smartconfig_recovery_joins_new_network() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("OldNet"));
    dev.advance(10);
    assert_eq!(dev.runtime.state(), DeviceState::Ready);

    let now = dev.now;
    dev.runtime.dispatch(
        Event::ButtonHeld(HoldEvent::EnterRecovery { held_ms: 6_000 }),
        now,
        &mut dev.net,
        &mut dev.sink,
    );
    assert_eq!(dev.runtime.state(), DeviceState::RecoveryMode);
    assert!(dev.net.provisioning.is_active());
    assert_eq!(dev.net.link.station_resets(), 1);

    dev.advance(500);
    assert_eq!(dev.runtime.state(), DeviceState::RecoveryMode);

    assert!(
        dev.net
            .provisioning
            .inject_credentials(Credentials::new("NewNet", "password1").unwrap())
    );
    dev.advance(100);

    assert_eq!(dev.runtime.state(), DeviceState::Ready);
    assert_eq!(dev.net.link.ssid(), b"NewNet");
    assert_eq!(dev.net.link.stored_ssid(), b"NewNet");
    assert!(dev.net.link.auto_connect());
    assert!(!dev.net.provisioning.is_active());
    assert!(dev.queue.is_empty());
}

#[test]
fn recovery_without_credentials_keeps_stored_network() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("HomeWiFi"));
    dev.advance(10);
    let now = dev.now;
    dev.runtime.dispatch(
        Event::ButtonHeld(HoldEvent::EnterRecovery { held_ms: 6_000 }),
        now,
        &mut dev.net,
        &mut dev.sink,
    );
    assert_eq!(dev.runtime.state(), DeviceState::RecoveryMode);
    dev.advance(500);

    // Power lost mid-recovery: the next boot still knows the old network.
    dev.net.link.power_cycle();
    assert_eq!(dev.net.link.stored_ssid(), b"HomeWiFi");
    assert_eq!(dev.net.link.ssid(), b"HomeWiFi");
}

#[test]
fn non_ascii_network_joins_through_recovery() {
    let mut dev = Device::boot(&SystemConfig::default(), None);
    let now = dev.now;
    dev.runtime.dispatch(
        Event::ButtonHeld(HoldEvent::EnterRecovery { held_ms: 6_000 }),
        now,
        &mut dev.net,
        &mut dev.sink,
    );
    assert!(dev.net.provisioning.is_active());
    assert!(dev.net.provisioning.inject_credentials(raw_credentials(
        "咖啡店WiFi".as_bytes(),
        b"password1"
    )));
    dev.advance(100);

    assert_eq!(dev.runtime.state(), DeviceState::Ready);
    assert_eq!(dev.net.link.stored_ssid(), "咖啡店WiFi".as_bytes());
}

#[test]
fn hard_reset_goes_through_restart_port() {
    let mut dev = Device::boot(&SystemConfig::default(), Some("HomeWiFi"));
    dev.advance(10);
    let now = dev.now;
    dev.runtime.dispatch(
        Event::ButtonHeld(HoldEvent::HardReset { held_ms: 10_500 }),
        now,
        &mut dev.net,
        &mut dev.sink,
    );
    assert_eq!(dev.net.restart.requests(), 1);
    assert!(dev.runtime.supervisor().is_rebooting());
}

#[test]
fn persisted_config_changes_the_endpoint() {
    let mut store = NvsConfigStore::new().unwrap();
    let cfg = SystemConfig::from_json(
        r#"{"broker":{"host":"broker.local","port":1883,"client_id":"lamp"}}"#,
    )
    .unwrap();
    store.save(&cfg).unwrap();

    let loaded = store.load().unwrap();
    let mut dev = Device::boot(&loaded, Some("HomeWiFi"));
    dev.advance(10);
    let ep = dev.transport().endpoint().unwrap().clone();
    assert_eq!(ep.host.as_str(), "broker.local");
    assert_eq!(ep.port, 1883);
    assert_eq!(ep.client_id.as_str(), "lamp");
    assert_eq!(ep.keep_alive_secs, 60);
}
