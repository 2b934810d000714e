//! # InfoCenter
//!
//! `infocenter` is a minimalist, in-memory publish/subscribe server built with Rust.
//! Publishers `POST` short text messages to a topic and subscribers hold a
//! Server-Sent Events stream open on the same topic to receive them live.
//!
//! ## Core Modules
//!
//! - `broker`: the topic registry. Owns topics, their sessions, and fan-out.
//! - `session`: per-subscriber state handed out by the broker, plus the guard
//!   that tears it down.
//! - `stream`: the streaming loop that turns a session into a sequence of events.
//! - `config`: loading and merging server configuration.
//! - `transport`: the HTTP surface (publish, subscribe, stats).
//! - `utils`: error types, logging setup and the diagnostic tracer.

pub mod broker;
pub mod config;
pub mod session;
pub mod stream;
pub mod transport;
pub mod utils;

pub use broker::Broker;
pub use session::{Session, SessionGuard};
pub use stream::{StreamEnd, StreamEvent, stream_messages};
