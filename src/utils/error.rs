//! Error types used across `infocenter`.
//!
//! - [`StreamError`]: failures of a single subscriber stream.
//! - [`ServerError`]: failures while starting or running the HTTP server.
//!
//! Publishing has no error type of its own: publishing to an unknown topic
//! or skipping a busy subscriber are normal outcomes, not failures.

use std::io;

use config::ConfigError;
use thiserror::Error;

/// Errors produced by the streaming loop or its sink.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The output sink cannot flush incrementally, so no event can be streamed.
    #[error("flusher cast failed: sink does not support incremental flush")]
    SinkUnsupported,

    /// The peer side of the sink went away while an event was being written.
    #[error("sink closed")]
    SinkClosed,
}

/// Errors produced while bringing the server up or running it.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

impl StreamError {
    /// Short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::SinkUnsupported => "sink_unsupported",
            StreamError::SinkClosed => "sink_closed",
        }
    }
}
