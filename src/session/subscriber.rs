//! Subscriber session
//!
//! Each session owns a delivery queue with exactly [`DELIVERY_SLOTS`] slot.
//! The broker writes into it with a non-blocking `try_send`, so a subscriber
//! that has not drained its slot simply misses the next message.
//!
//! The idle deadline is fixed when the session is opened and is never pushed
//! back by deliveries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::broker::Message;

pub type SessionId = Uuid;

/// Capacity of every session's delivery queue.
pub const DELIVERY_SLOTS: usize = 1;

/// Deadline offset used when `connected_at + idle_timeout` does not fit.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Reading half of a subscription, owned by the streaming loop.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    topic: String,
    receiver: mpsc::Receiver<Arc<Message>>,
    deadline: Instant,
    connected_at: Instant,
}

/// Writing half of a subscription, owned by the broker's registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(crate) id: SessionId,
    pub(crate) sender: mpsc::Sender<Arc<Message>>,
}

impl Session {
    /// Opens a session on `topic` that expires `idle_timeout` from now.
    pub(crate) fn open(topic: &str, idle_timeout: Duration) -> (Session, SessionHandle) {
        let (sender, receiver) = mpsc::channel(DELIVERY_SLOTS);
        let id = Uuid::new_v4();
        let connected_at = Instant::now();

        let session = Session {
            id,
            topic: topic.to_string(),
            receiver,
            deadline: connected_at
                .checked_add(idle_timeout)
                .unwrap_or_else(|| connected_at + FAR_FUTURE),
            connected_at,
        };

        (session, SessionHandle { id, sender })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Time since the session was opened, rounded to the nearest second.
    pub fn connected_for(&self) -> Duration {
        round_to_secs(self.connected_at.elapsed())
    }

    /// Waits for the next delivered message. `None` once the queue is closed.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    /// Takes the message sitting in the slot, if any.
    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.try_recv().ok()
    }

    /// Closes the queue and throws away anything still in the slot.
    pub(crate) fn close(&mut self) {
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Rounds half-way values up, like `Duration` rounding in most clocks.
pub fn round_to_secs(elapsed: Duration) -> Duration {
    Duration::from_secs((elapsed.as_millis() as u64 + 500) / 1000)
}
