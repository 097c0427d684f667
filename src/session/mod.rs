//! Broker session manager.
//!
//! Owns the MQTT-style session: the topic handler table, subscribe on
//! connect, exact-topic dispatch, and a fixed-delay reconnect timer.
//!
//! ```text
//!   link up ──▶ connect() ──▶ SessionConnected ──▶ subscribe all topics
//!                                   │
//!                              SessionLost
//!                                   │
//!                  link up? ──yes──▶ arm timer ──(2 s)──▶ connect()
//!                     │
//!                     no ──▶ wait for the next link up
//! ```
//!
//! All connection outcomes arrive as events; nothing here blocks.

pub mod reconnect;
pub mod topics;

use core::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{BrokerEndpoint, BrokerTransport, QosLevel};
use crate::config::SystemConfig;
use crate::error::TransportError;
use reconnect::ReconnectTimer;
use topics::{TopicHandler, TopicHandlerTable};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Topic exceeds the handler table key capacity.
    TopicTooLong,
    /// Publish attempted while the session is down.
    NotConnected,
    /// The transport refused the request.
    Transport(TransportError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopicTooLong => write!(f, "topic longer than {} bytes", topics::MAX_TOPIC_LEN),
            Self::NotConnected => write!(f, "session not connected"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Settings & reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub reconnect_delay_ms: u32,
    pub subscribe_qos: QosLevel,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

impl From<&SystemConfig> for SessionSettings {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            reconnect_delay_ms: cfg.reconnect_delay_ms,
            subscribe_qos: cfg.subscribe_qos,
        }
    }
}

/// Outcome of subscribe-on-connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeReport {
    pub subscribed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub connects_issued: u32,
    pub sessions_established: u32,
    pub sessions_lost: u32,
    pub messages_dispatched: u32,
    pub messages_dropped: u32,
    pub publishes: u32,
    pub publish_failures: u32,
    pub subscribe_failures: u32,
}

// ---------------------------------------------------------------------------
// Session handle (what handlers see)
// ---------------------------------------------------------------------------

/// Borrowed view of the session passed to topic handlers.
pub struct SessionHandle<'a> {
    transport: &'a mut dyn BrokerTransport,
    stats: &'a mut SessionStats,
    connected: bool,
}

impl SessionHandle<'_> {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        match self.transport.publish(topic, qos, retain, payload.as_bytes()) {
            Ok(()) => {
                self.stats.publishes = self.stats.publishes.wrapping_add(1);
                debug!("Session: published {} bytes to '{}'", payload.len(), topic);
                Ok(())
            }
            Err(e) => {
                self.stats.publish_failures = self.stats.publish_failures.wrapping_add(1);
                warn!("Session: publish to '{}' failed: {}", topic, e);
                Err(e.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session manager
// ---------------------------------------------------------------------------

pub struct SessionManager<T: BrokerTransport> {
    transport: T,
    endpoint: BrokerEndpoint,
    settings: SessionSettings,
    handlers: TopicHandlerTable,
    reconnect: ReconnectTimer,
    link_up: bool,
    connected: bool,
    stats: SessionStats,
}

impl<T: BrokerTransport> SessionManager<T> {
    pub fn new(transport: T, endpoint: BrokerEndpoint, settings: SessionSettings) -> Self {
        Self {
            transport,
            endpoint,
            settings,
            handlers: TopicHandlerTable::new(),
            reconnect: ReconnectTimer::new(),
            link_up: false,
            connected: false,
            stats: SessionStats::default(),
        }
    }

    // ── Registration ──────────────────────────────────────────

    /// Register a handler for an exact topic.  A topic first registered
    /// while connected is subscribed immediately.
    pub fn on_message<F>(&mut self, topic: &str, handler: F) -> Result<(), SessionError>
    where
        F: FnMut(&str, &str, &mut SessionHandle<'_>) + 'static,
    {
        let boxed: TopicHandler = Box::new(handler);
        let is_new = self.handlers.register(topic, boxed)?;
        info!("Session: handler registered for '{}'", topic);
        if is_new && self.connected {
            self.subscribe_one(topic);
        }
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Hand the endpoint to the transport.  Does not connect.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        info!(
            "Session: broker {}:{} as '{}'",
            self.endpoint.host, self.endpoint.port, self.endpoint.client_id
        );
        self.transport.configure(&self.endpoint)?;
        Ok(())
    }

    pub fn on_link_up(&mut self) {
        self.link_up = true;
        self.reconnect.cancel();
        if self.connected {
            debug!("Session: link up while already connected");
            return;
        }
        self.issue_connect();
    }

    pub fn on_link_down(&mut self) {
        self.link_up = false;
        if self.reconnect.cancel() {
            info!("Session: link down, pending reconnect cancelled");
        }
    }

    /// Session established: subscribe every registered topic.
    pub fn on_connected(&mut self) -> SubscribeReport {
        self.connected = true;
        self.reconnect.cancel();
        self.stats.sessions_established = self.stats.sessions_established.wrapping_add(1);

        let topics: Vec<topics::TopicKey> = self
            .handlers
            .topics()
            .filter_map(|t| heapless::String::try_from(t).ok())
            .collect();

        let mut report = SubscribeReport::default();
        for topic in &topics {
            if self.subscribe_one(topic) {
                report.subscribed += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(
            "Session: connected, {} subscribed, {} failed",
            report.subscribed, report.failed
        );
        report
    }

    /// Session dropped.  Returns `true` if a reconnect was armed.
    pub fn on_lost(&mut self, now_ms: u64) -> bool {
        self.connected = false;
        self.stats.sessions_lost = self.stats.sessions_lost.wrapping_add(1);
        if self.link_up {
            self.reconnect.arm(now_ms, self.settings.reconnect_delay_ms);
            info!(
                "Session: lost, reconnecting in {}ms",
                self.settings.reconnect_delay_ms
            );
            true
        } else {
            self.reconnect.cancel();
            info!("Session: lost while link is down, waiting for link");
            false
        }
    }

    /// Fire the reconnect timer if due.  Returns `true` if a connect was issued.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.reconnect.take_if_due(now_ms) {
            return false;
        }
        if !self.link_up || self.connected {
            return false;
        }
        self.issue_connect();
        true
    }

    // ── Messaging ─────────────────────────────────────────────

    /// Dispatch to every handler registered for `topic`, in registration
    /// order.  Returns how many ran.
    pub fn on_message_received(&mut self, topic: &str, payload: &str) -> usize {
        let Self {
            transport,
            handlers,
            stats,
            connected,
            ..
        } = self;

        let Some(list) = handlers.handlers_mut(topic) else {
            debug!("Session: no handler for '{}', dropped", topic);
            stats.messages_dropped = stats.messages_dropped.wrapping_add(1);
            return 0;
        };

        let mut handle = SessionHandle {
            transport: &mut *transport,
            stats: &mut *stats,
            connected: *connected,
        };
        for handler in list.iter_mut() {
            handler(topic, payload, &mut handle);
        }
        let count = list.len();
        stats.messages_dispatched = stats.messages_dispatched.wrapping_add(1);
        count
    }

    pub fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), SessionError> {
        self.handle().publish(topic, payload, qos, retain)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.topics()
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.handler_count(topic)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle(&mut self) -> SessionHandle<'_> {
        SessionHandle {
            transport: &mut self.transport,
            stats: &mut self.stats,
            connected: self.connected,
        }
    }

    fn issue_connect(&mut self) {
        self.stats.connects_issued = self.stats.connects_issued.wrapping_add(1);
        info!("Session: connecting to {}:{}", self.endpoint.host, self.endpoint.port);
        self.transport.connect();
    }

    fn subscribe_one(&mut self, topic: &str) -> bool {
        match self.transport.subscribe(topic, self.settings.subscribe_qos) {
            Ok(()) => {
                debug!("Session: subscribed '{}'", topic);
                true
            }
            Err(e) => {
                self.stats.subscribe_failures = self.stats.subscribe_failures.wrapping_add(1);
                warn!("Session: subscribe '{}' failed: {}", topic, e);
                false
            }
        }
    }
}
