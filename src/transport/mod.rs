//! The `transport` module is the HTTP surface of the broker.
//!
//! - `POST /infocenter/:topic` publishes the raw request body to a topic.
//! - `GET /infocenter/:topic` opens a Server-Sent Events stream on a topic.
//! - `GET /infocenter` returns a JSON snapshot of the registry.

pub mod http;

pub use http::{AppState, router, serve, serve_listener};
