//! Message definitions for the broker
//!
//! A `Message` is built once by [`Broker::publish`](super::Broker::publish)
//! and then shared read-only (`Arc<Message>`) into every session it reaches.
//!
//! Notes on fields:
//! - `id`: broker-wide, strictly increasing, assigned at publish time
//! - `topic`: topic name used for routing
//! - `text`: the raw body the publisher posted

use std::fmt;

pub type MessageId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    topic: String,
    text: String,
}

impl Message {
    pub fn new(id: MessageId, topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} on {}", self.id, self.topic)
    }
}
