//! Scoped session cleanup
//!
//! `SessionGuard` owns a [`Session`] for the duration of one stream and
//! unsubscribes it from the broker when dropped. Timeout, cancellation, sink
//! failure and unwinding all go through the same `Drop`.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::broker::Broker;
use crate::session::Session;

#[derive(Debug)]
pub struct SessionGuard {
    broker: Arc<Broker>,
    session: Session,
}

impl SessionGuard {
    /// Subscribes to `topic` and wraps the new session.
    pub fn subscribe(broker: Arc<Broker>, topic: &str) -> Self {
        let session = broker.subscribe(topic);
        Self { broker, session }
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.broker.unsubscribe(&mut self.session);
    }
}
