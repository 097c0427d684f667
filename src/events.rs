//! Inbound event queue.
//!
//! Events are produced by:
//! - the WiFi event loop (link up / link down)
//! - the MQTT connection thread (connected, lost, message received)
//! - the credential exchange (credentials received)
//! - the recovery button sampler (hold events)
//!
//! Events are consumed by [`Runtime::dispatch`](crate::app::runtime::Runtime::dispatch),
//! one at a time in FIFO order.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ WiFi sysloop │────▶│              │     │              │
//! │ MQTT thread  │────▶│  EventQueue  │────▶│   Runtime    │
//! │ SmartConfig  │────▶│ (bounded 32) │     │  (consumer)  │
//! │ Button task  │────▶│              │     │              │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::Credentials;
use crate::drivers::input_monitor::HoldEvent;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 32;

/// Longest topic carried through the queue (matches the handler table key).
pub const MAX_TOPIC_LEN: usize = 64;

/// Longest inbound payload carried through the queue.
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Everything that can happen to the connectivity core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ── Link ──────────────────────────────────────────────
    /// The station obtained an address.
    LinkUp,
    /// The station lost its association.
    LinkDown,

    // ── User input ────────────────────────────────────────
    /// The recovery button crossed a hold threshold.
    ButtonHeld(HoldEvent),

    // ── Broker session ────────────────────────────────────
    SessionConnected,
    SessionLost,
    MessageReceived {
        topic: heapless::String<MAX_TOPIC_LEN>,
        payload: heapless::String<MAX_PAYLOAD_LEN>,
    },

    // ── Provisioning ──────────────────────────────────────
    CredentialsReceived(Credentials),
}

impl Event {
    /// Build a `MessageReceived` event.
    ///
    /// Returns `None` if the topic does not fit; such a topic can never
    /// match a registered handler.  Oversized payloads are truncated at a
    /// character boundary.
    pub fn message(topic: &str, payload: &str) -> Option<Self> {
        let mut t = heapless::String::new();
        t.push_str(topic).ok()?;

        let mut p = heapless::String::new();
        for ch in payload.chars() {
            if p.push(ch).is_err() {
                warn!("Event: payload on '{}' truncated to {} bytes", topic, p.len());
                break;
            }
        }
        Some(Self::MessageReceived { topic: t, payload: p })
    }

    /// Build a `MessageReceived` event from raw bytes (lossy UTF-8).
    pub fn message_bytes(topic: &str, payload: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(payload);
        Self::message(topic, &text)
    }
}

/// Bounded multi-producer / single-consumer queue.
///
/// Producers on other threads only ever `push` (non-blocking).  A full
/// queue drops the event and logs a warning.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    /// `const` so the queue can live in a `static`.
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue an event.  Returns `false` if the queue was full.
    pub fn push(&self, event: Event) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(embassy_sync::channel::TrySendError::Full(dropped)) => {
                warn!("EventQueue: full, dropping {:?}", dropped);
                false
            }
        }
    }

    /// Dequeue the oldest event.
    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, oldest first.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}
