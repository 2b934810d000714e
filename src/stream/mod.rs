//! The `stream` module drains one subscriber session into an ordered
//! sequence of [`StreamEvent`]s.
//!
//! [`stream_messages`] waits on three things at once: the session's fixed
//! idle deadline, its one-slot delivery queue, and the connection's
//! cancellation token. Each event is written and flushed to an
//! [`EventSink`] before the next wait.

pub mod sink;
pub mod sse;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, Message, MessageId};
use crate::hint;
use crate::session::{Session, SessionGuard};
use crate::utils::error::StreamError;
use crate::utils::trace::{self, Tracer};

pub use sink::{ChannelSink, EventSink};

/// One unit of output on a subscriber stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// First event of every stream.
    Established,
    /// A message delivered from the session's queue.
    Message(Arc<Message>),
    /// Terminal event once the idle deadline passes.
    Timeout { elapsed: Duration },
}

impl StreamEvent {
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            StreamEvent::Message(message) => Some(message.id()),
            _ => None,
        }
    }
}

/// Why a stream ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The idle deadline passed; a `Timeout` event was sent.
    TimedOut,
    /// The connection was cancelled; nothing more was sent.
    Cancelled,
    /// The session's queue was closed from the broker side.
    Closed,
}

/// Writes and flushes one event. `Ok(false)` if `cancel` fired while the
/// peer was not taking it.
async fn emit<S: EventSink>(
    sink: &mut S,
    event: &StreamEvent,
    cancel: &CancellationToken,
) -> Result<bool, StreamError> {
    sink.write_event(event)?;
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Ok(false),
        flushed = sink.flush() => flushed.map(|()| true),
    }
}

/// Streams `session` into `sink` until timeout, cancellation, or queue close.
///
/// Fails with [`StreamError::SinkUnsupported`] before emitting anything when
/// the sink cannot flush. While a flush waits on a stalled peer the session
/// slot stays full, so further publishes skip this subscriber. The caller
/// remains responsible for unsubscribing the session; [`run_session`] does
/// that with a [`SessionGuard`].
pub async fn stream_messages<S: EventSink>(
    session: &mut Session,
    cancel: &CancellationToken,
    sink: &mut S,
    tracer: &dyn Tracer,
) -> Result<StreamEnd, StreamError> {
    hint!(tracer, "stream - start: session {} on {}", session.id(), session.topic());

    if !sink.supports_flush() {
        hint!(tracer, "stream - flusher cast failed");
        return Err(StreamError::SinkUnsupported);
    }

    if !emit(sink, &StreamEvent::Established, cancel).await? {
        return Ok(StreamEnd::Cancelled);
    }

    let deadline = tokio::time::sleep_until(session.deadline());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                hint!(tracer, "stream - session ended at {}", trace::clock());
                return Ok(StreamEnd::Cancelled);
            }
            _ = &mut deadline => {
                hint!(tracer, "stream - timeout (timestamp: {})", trace::clock());
                let elapsed = session.connected_for();
                let event = StreamEvent::Timeout { elapsed };
                return if emit(sink, &event, cancel).await? {
                    Ok(StreamEnd::TimedOut)
                } else {
                    Ok(StreamEnd::Cancelled)
                };
            }
            received = session.recv() => match received {
                Some(message) => {
                    hint!(tracer, "stream - msg #{} sent", message.id());
                    let event = StreamEvent::Message(message);
                    if !emit(sink, &event, cancel).await? {
                        hint!(tracer, "stream - cancelled while peer stalled");
                        return Ok(StreamEnd::Cancelled);
                    }
                }
                None => {
                    hint!(tracer, "stream - queue closed");
                    return Ok(StreamEnd::Closed);
                }
            },
        }
    }
}

/// Subscribes to `topic`, streams until the session ends, and unsubscribes.
///
/// The session is torn down on every exit path, including a sink error.
pub async fn run_session<S: EventSink>(
    broker: Arc<Broker>,
    topic: &str,
    cancel: &CancellationToken,
    sink: &mut S,
) -> Result<StreamEnd, StreamError> {
    let tracer = Arc::clone(broker.tracer());
    let mut guard = SessionGuard::subscribe(broker, topic);

    let result = stream_messages(&mut guard, cancel, sink, &*tracer).await;
    hint!(tracer, "stream - end: {result:?}");
    result
}

#[cfg(test)]
mod tests;
