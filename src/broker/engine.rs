//! Broker engine
//!
//! This module contains the in-memory topic registry responsible for:
//! - handing out sessions to subscribers and taking them back
//! - fanning a published message out to every session of its topic
//! - assigning each published message a broker-wide increasing id
//!
//! Concurrency and usage notes:
//! - All registry state sits behind one `Mutex`; publish, subscribe and
//!   unsubscribe each hold it for their whole duration. The broker is shared
//!   as `Arc<Broker>` and every method takes `&self`.
//! - Fan-out never waits while holding the lock: each delivery is a
//!   `try_send` into a one-slot queue, and a full or closed slot means the
//!   session is skipped for that message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;

use crate::broker::message::{Message, MessageId};
use crate::broker::topic::Topic;
use crate::config::BrokerSettings;
use crate::hint;
use crate::session::{Session, SessionId};
use crate::utils::trace::{NoopTracer, SharedTracer, Tracer};

/// Lifetime of a subscription when nothing else is configured.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Topic>,
    next_message_id: MessageId,
}

pub struct Broker {
    registry: Mutex<Registry>,
    idle_timeout: Duration,
    tracer: SharedTracer,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("registry", &self.registry)
            .field("idle_timeout", &self.idle_timeout)
            .field("tracing", &self.tracer.enabled())
            .finish()
    }
}

impl Broker {
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_tracer(idle_timeout, Arc::new(NoopTracer))
    }

    pub fn with_tracer(idle_timeout: Duration, tracer: SharedTracer) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            idle_timeout,
            tracer,
        }
    }

    pub fn from_settings(settings: &BrokerSettings, tracer: SharedTracer) -> Self {
        Self::with_tracer(Duration::from_secs(settings.idle_timeout_secs), tracer)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn tracer(&self) -> &SharedTracer {
        &self.tracer
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `text` to every session currently attached to `topic`.
    ///
    /// Always succeeds and returns the id given to the message. Sessions
    /// whose slot is still occupied, or whose queue is already closed, are
    /// skipped. Publishing to a topic nobody listens to only consumes an id.
    pub fn publish(&self, topic: &str, text: impl Into<String>) -> MessageId {
        let mut registry = self.lock();

        let id = registry.next_message_id;
        registry.next_message_id += 1;
        let message = Arc::new(Message::new(id, topic, text));

        hint!(self.tracer, "publish - message {message}");

        let Some(entry) = registry.topics.get(topic) else {
            hint!(self.tracer, "publish - no subscribers on {topic}");
            return id;
        };

        for (i, handle) in entry.sessions().iter().enumerate() {
            match handle.sender.try_send(Arc::clone(&message)) {
                Ok(()) => {
                    hint!(self.tracer, "publish - session {i} ({}) received #{id}", handle.id);
                }
                Err(TrySendError::Full(_)) => {
                    hint!(self.tracer, "publish - session {i} ({}) busy, skipped #{id}", handle.id);
                }
                Err(TrySendError::Closed(_)) => {
                    hint!(self.tracer, "publish - session {i} ({}) closed, skipped #{id}", handle.id);
                }
            }
        }

        id
    }

    /// Opens a new session on `topic`, creating the topic if needed.
    pub fn subscribe(&self, topic: &str) -> Session {
        let (session, handle) = Session::open(topic, self.idle_timeout);

        let mut registry = self.lock();
        registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .attach(handle);

        hint!(
            self.tracer,
            "subscribe - session {} on {topic} (idle timeout {}s)",
            session.id(),
            self.idle_timeout.as_secs()
        );

        session
    }

    /// Detaches `session` from its topic and closes its queue.
    ///
    /// Anything left in the slot is discarded. The topic entry is removed
    /// when this was its last session. Calling it again for the same session
    /// does nothing.
    pub fn unsubscribe(&self, session: &mut Session) {
        let mut registry = self.lock();
        let topic = session.topic();

        let (removed, left) = match registry.topics.get_mut(topic) {
            Some(entry) => (entry.detach(&session.id()).is_some(), entry.len()),
            None => (false, 0),
        };
        if left == 0 && registry.topics.remove(topic).is_some() {
            hint!(self.tracer, "unsubscribe - topic {topic} pruned");
        } else if removed {
            hint!(self.tracer, "unsubscribe - {left} sessions left on {topic}");
        }
        drop(registry);

        session.close();

        if removed {
            hint!(self.tracer, "unsubscribe - session {} removed", session.id());
        }
    }

    /// Number of topics that currently have at least one session.
    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    /// Number of sessions attached to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, Topic::len)
    }

    /// Session ids attached to `topic`, in subscription order.
    pub fn session_ids(&self, topic: &str) -> Vec<SessionId> {
        self.lock()
            .topics
            .get(topic)
            .map(Topic::session_ids)
            .unwrap_or_default()
    }

    /// Every live topic with its session count, sorted by name.
    pub fn topics(&self) -> Vec<(String, usize)> {
        let mut topics: Vec<_> = self
            .lock()
            .topics
            .values()
            .map(|t| (t.name.clone(), t.len()))
            .collect();
        topics.sort();
        topics
    }

    /// Id of the most recent publish, if any happened yet.
    pub fn last_message_id(&self) -> Option<MessageId> {
        self.lock().next_message_id.checked_sub(1)
    }
}
