//! Fuzz target: inbound broker message path
//!
//! Builds a queued message from arbitrary bytes, parses it as a switch
//! command, and dispatches it through a session with the switch handler
//! registered.  Nothing may panic and the payload must stay bounded.
//!
//! cargo fuzz run fuzz_switch_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use linkcore::app::commands::{SwitchCommand, register_switch_handler, switch_topic};
use linkcore::app::ports::{BrokerEndpoint, BrokerTransport, QosLevel, SwitchPort};
use linkcore::config::{BrokerConfig, SystemConfig};
use linkcore::error::TransportError;
use linkcore::events::{Event, MAX_PAYLOAD_LEN};
use linkcore::session::{SessionManager, SessionSettings};

struct Sink;

impl BrokerTransport for Sink {
    fn configure(&mut self, _: &BrokerEndpoint) -> Result<(), TransportError> {
        Ok(())
    }
    fn connect(&mut self) {}
    fn subscribe(&mut self, _: &str, _: QosLevel) -> Result<(), TransportError> {
        Ok(())
    }
    fn publish(&mut self, _: &str, _: QosLevel, _: bool, _: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

struct Switch;

impl SwitchPort for Switch {
    fn set_switch(&mut self, _on: bool) {}
}

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let _ = SwitchCommand::parse(&text);

    let topic = switch_topic("XE1");
    let Some(Event::MessageReceived { topic, payload }) = Event::message(&topic, &text) else {
        panic!("command topic must fit the queue");
    };
    assert!(payload.len() <= MAX_PAYLOAD_LEN);

    let mut session = SessionManager::new(
        Sink,
        BrokerConfig::default().endpoint("XE1"),
        SessionSettings::from(&SystemConfig::default()),
    );
    let _ = session.begin();
    session.on_link_up();
    session.on_connected();
    let _ = register_switch_handler(&mut session, &topic, Switch, QosLevel::ExactlyOnce);
    assert_eq!(session.on_message_received(&topic, &payload), 1);
});
