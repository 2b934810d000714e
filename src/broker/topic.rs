//! Topic management
//!
//! A `Topic` holds the ordered list of sessions attached to one topic name.
//! Sessions are kept in subscription order and a session id appears at most
//! once; attaching an id that is already present is a no-op.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the broker
//! does so with its registry lock).

use crate::session::{SessionHandle, SessionId};

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    sessions: Vec<SessionHandle>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sessions: Vec::new(),
        }
    }

    /// Append a session. Returns `false` if its id was already attached.
    pub fn attach(&mut self, handle: SessionHandle) -> bool {
        if self.sessions.iter().any(|s| s.id == handle.id) {
            return false;
        }
        self.sessions.push(handle);
        true
    }

    /// Remove a session, keeping the others in order.
    pub fn detach(&mut self, id: &SessionId) -> Option<SessionHandle> {
        let pos = self.sessions.iter().position(|s| &s.id == id)?;
        Some(self.sessions.remove(pos))
    }

    pub fn sessions(&self) -> &[SessionHandle] {
        &self.sessions
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
