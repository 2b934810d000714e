//! The `session` module defines the server-side state of one subscriber
//! connection.
//!
//! [`Broker::subscribe`](crate::Broker::subscribe) hands out a [`Session`]
//! (the reading half) and keeps a [`SessionHandle`] (the writing half) in its
//! registry. [`SessionGuard`] ties the two back together: dropping the guard
//! unsubscribes the session, whatever made the stream end.

pub mod guard;
pub mod subscriber;

pub use guard::SessionGuard;
pub use subscriber::{DELIVERY_SLOTS, Session, SessionHandle, SessionId};
