//! MQTT broker transport.
//!
//! Implements [`BrokerTransport`] for the session manager.  Requests are
//! fire-and-forget; the connection's event stream is turned into
//! `SessionConnected` / `SessionLost` / `MessageReceived` events on the
//! shared [`EventQueue`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`
//!   with a dedicated thread draining `EspMqttConnection`.  Every
//!   `connect()` builds a fresh client; dropping the old one ends its
//!   connection thread.  The client's own auto-reconnect is off, so a
//!   lost session stays down until the next `connect()`.
//! - **all other targets**: in-memory broker that records subscriptions
//!   and publishes, with hooks to deliver messages and drop the session.

use log::{debug, info, warn};

use crate::app::ports::{BrokerEndpoint, BrokerTransport, QosLevel};
use crate::error::TransportError;
use crate::events::{Event, EventQueue};

/// `mqtt://host:port`.
pub fn broker_url(endpoint: &BrokerEndpoint) -> String {
    format!("mqtt://{}:{}", endpoint.host, endpoint.port)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

#[cfg(target_os = "espidf")]
const CONNECTION_STACK_SIZE: usize = 6 * 1024;

#[cfg(target_os = "espidf")]
fn to_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

#[cfg(target_os = "espidf")]
pub struct MqttTransport {
    queue: &'static EventQueue,
    endpoint: Option<BrokerEndpoint>,
    client: Option<EspMqttClient<'static>>,
}

#[cfg(target_os = "espidf")]
impl MqttTransport {
    pub fn new(queue: &'static EventQueue) -> Self {
        Self {
            queue,
            endpoint: None,
            client: None,
        }
    }

    fn spawn_connection(&self, mut connection: EspMqttConnection) -> std::io::Result<()> {
        let queue = self.queue;
        std::thread::Builder::new()
            .name("mqtt-conn".into())
            .stack_size(CONNECTION_STACK_SIZE)
            .spawn(move || {
                while let Ok(event) = connection.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            queue.push(Event::SessionConnected);
                        }
                        EventPayload::Disconnected => {
                            queue.push(Event::SessionLost);
                        }
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            ..
                        } => match Event::message_bytes(topic, data) {
                            Some(msg) => {
                                queue.push(msg);
                            }
                            None => warn!("MQTT: topic '{}' too long, message dropped", topic),
                        },
                        EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                        _ => {}
                    }
                }
                debug!("MQTT: connection thread exiting");
            })
            .map(|_| ())
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConfigured);
        }
        self.client
            .as_mut()
            .ok_or(TransportError::Rejected(esp_idf_svc::sys::ESP_FAIL))
    }
}

#[cfg(target_os = "espidf")]
impl BrokerTransport for MqttTransport {
    fn configure(&mut self, endpoint: &BrokerEndpoint) -> Result<(), TransportError> {
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn connect(&mut self) {
        let Some(endpoint) = self.endpoint.as_ref() else {
            warn!("MQTT: connect before configure ignored");
            return;
        };
        // Tear down the previous client first; its thread exits on drop.
        self.client = None;

        let url = broker_url(endpoint);
        let conf = MqttClientConfiguration {
            client_id: Some(endpoint.client_id.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(u64::from(
                endpoint.keep_alive_secs,
            ))),
            // Retries belong to the session manager's fixed-delay timer.
            disable_auto_reconnect: true,
            ..Default::default()
        };
        match EspMqttClient::new(&url, &conf) {
            Ok((client, connection)) => {
                if let Err(e) = self.spawn_connection(connection) {
                    warn!("MQTT: connection thread not started: {}", e);
                    self.queue.push(Event::SessionLost);
                    return;
                }
                self.client = Some(client);
                info!("MQTT: connecting to {}", url);
            }
            Err(e) => {
                warn!("MQTT: client creation failed: {}", e);
                self.queue.push(Event::SessionLost);
            }
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), TransportError> {
        self.client()?
            .subscribe(topic, to_qos(qos))
            .map(|_| ())
            .map_err(|e| TransportError::Rejected(e.code()))
    }

    fn publish(
        &mut self,
        topic: &str,
        qos: QosLevel,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.client()?
            .enqueue(topic, to_qos(qos), retain, payload)
            .map(|_| ())
            .map_err(|e| TransportError::Rejected(e.code()))
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation
// ───────────────────────────────────────────────────────────────

/// One publish seen by the simulated broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retain: bool,
}

#[cfg(not(target_os = "espidf"))]
pub struct MqttTransport {
    queue: &'static EventQueue,
    endpoint: Option<BrokerEndpoint>,
    reachable: bool,
    connected: bool,
    connects: u32,
    subscriptions: Vec<(String, QosLevel)>,
    published: Vec<Published>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttTransport {
    pub fn new(queue: &'static EventQueue) -> Self {
        info!("MQTT(sim): simulation backend");
        Self {
            queue,
            endpoint: None,
            reachable: true,
            connected: false,
            connects: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
        }
    }

    /// When unreachable, every connect attempt ends in `SessionLost`.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Deliver an inbound message if the topic is subscribed.
    pub fn deliver(&mut self, topic: &str, payload: &str) -> bool {
        if !self.connected || !self.subscriptions.iter().any(|(t, _)| t == topic) {
            debug!("MQTT(sim): '{}' not subscribed, not delivered", topic);
            return false;
        }
        match Event::message(topic, payload) {
            Some(msg) => self.queue.push(msg),
            None => false,
        }
    }

    /// Simulate the broker closing the session.
    pub fn drop_session(&mut self) {
        if self.connected {
            self.connected = false;
            self.subscriptions.clear();
            self.queue.push(Event::SessionLost);
        }
    }

    pub fn endpoint(&self) -> Option<&BrokerEndpoint> {
        self.endpoint.as_ref()
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn subscriptions(&self) -> &[(String, QosLevel)] {
        &self.subscriptions
    }

    pub fn published(&self) -> &[Published] {
        &self.published
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerTransport for MqttTransport {
    fn configure(&mut self, endpoint: &BrokerEndpoint) -> Result<(), TransportError> {
        debug!("MQTT(sim): endpoint {}", broker_url(endpoint));
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn connect(&mut self) {
        if self.endpoint.is_none() {
            warn!("MQTT(sim): connect before configure ignored");
            return;
        }
        self.connects = self.connects.wrapping_add(1);
        // A new session starts with no subscriptions.
        self.connected = false;
        self.subscriptions.clear();
        if self.reachable {
            self.connected = true;
            self.queue.push(Event::SessionConnected);
        } else {
            self.queue.push(Event::SessionLost);
        }
    }

    fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConfigured);
        }
        if !self.connected {
            return Err(TransportError::Rejected(-1));
        }
        if !self.subscriptions.iter().any(|(t, _)| t == topic) {
            self.subscriptions.push((topic.to_string(), qos));
        }
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        qos: QosLevel,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.endpoint.is_none() {
            return Err(TransportError::NotConfigured);
        }
        if !self.connected {
            return Err(TransportError::Rejected(-1));
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }
}
