//! Output sinks for the streaming loop.

use std::future::Future;

use axum::body::Bytes;
use tokio::sync::mpsc;

use crate::stream::StreamEvent;
use crate::stream::sse;
use crate::utils::error::StreamError;

/// Chunks a [`ChannelSink`] may hold before `flush` waits for the peer.
pub const CHANNEL_CHUNKS: usize = 1;

/// Destination of a subscriber's events.
///
/// `write_event` may buffer; `flush` must push everything written so far to
/// the peer and only resolves once the peer has room for it, so a stalled
/// peer stalls the streaming loop. A sink that cannot flush incrementally
/// reports it through `supports_flush` and is rejected before the first event.
pub trait EventSink: Send {
    fn write_event(&mut self, event: &StreamEvent) -> Result<(), StreamError>;

    fn flush(&mut self) -> impl Future<Output = Result<(), StreamError>> + Send;

    fn supports_flush(&self) -> bool {
        true
    }
}

/// Frames events as Server-Sent Events and hands each flushed chunk to a
/// bounded channel.
///
/// The receiving side is the body of an HTTP response.
#[derive(Debug)]
pub struct ChannelSink {
    buf: String,
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            buf: String::new(),
            tx,
        }
    }

    pub fn channel() -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CHUNKS);
        (Self::new(tx), rx)
    }

    pub fn sender(&self) -> mpsc::Sender<Bytes> {
        self.tx.clone()
    }
}

impl EventSink for ChannelSink {
    fn write_event(&mut self, event: &StreamEvent) -> Result<(), StreamError> {
        sse::encode_into(&mut self.buf, event);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StreamError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.tx.send(chunk).await.map_err(|_| StreamError::SinkClosed)
    }
}
