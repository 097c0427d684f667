//! Topic → handler table.
//!
//! Exact-match only.  Topics are kept sorted (so subscribe-on-connect
//! walks them in a stable order) and each topic's handlers run in
//! registration order.  There is no removal path.

use std::collections::BTreeMap;

use super::{SessionError, SessionHandle};

/// Longest topic accepted at registration.
pub const MAX_TOPIC_LEN: usize = crate::events::MAX_TOPIC_LEN;

pub type TopicKey = heapless::String<MAX_TOPIC_LEN>;

/// Handler invoked with `(topic, payload, session)`.
pub type TopicHandler = Box<dyn FnMut(&str, &str, &mut SessionHandle<'_>)>;

#[derive(Default)]
pub struct TopicHandlerTable {
    entries: BTreeMap<TopicKey, Vec<TopicHandler>>,
}

impl TopicHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to `topic`.  Returns `true` if the topic is new.
    pub fn register(&mut self, topic: &str, handler: TopicHandler) -> Result<bool, SessionError> {
        let key = Self::key(topic).ok_or(SessionError::TopicTooLong)?;
        let list = self.entries.entry(key).or_default();
        list.push(handler);
        Ok(list.len() == 1)
    }

    /// Handlers for an exact topic.  `None` for unknown or oversized topics.
    pub fn handlers_mut(&mut self, topic: &str) -> Option<&mut Vec<TopicHandler>> {
        let key = Self::key(topic)?;
        self.entries.get_mut(&key)
    }

    pub fn contains(&self, topic: &str) -> bool {
        Self::key(topic).is_some_and(|k| self.entries.contains_key(&k))
    }

    /// Registered topics in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(heapless::String::as_str)
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        Self::key(topic)
            .and_then(|k| self.entries.get(&k))
            .map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(topic: &str) -> Option<TopicKey> {
        let mut key = TopicKey::new();
        key.push_str(topic).ok()?;
        Some(key)
    }
}
