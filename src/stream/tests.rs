use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::sink::{ChannelSink, EventSink};
use super::{StreamEnd, StreamEvent, run_session, sse, stream_messages};
use crate::broker::{Broker, Message};
use crate::utils::error::StreamError;
use crate::utils::trace::{MemoryTracer, NoopTracer};

#[derive(Debug, Default)]
struct RecordingSink {
    events: Vec<StreamEvent>,
    pending: Vec<StreamEvent>,
    flushes: usize,
    no_flush: bool,
    fail_on_message: bool,
}

impl RecordingSink {
    fn without_flush() -> Self {
        Self {
            no_flush: true,
            ..Self::default()
        }
    }

    fn failing_on_message() -> Self {
        Self {
            fail_on_message: true,
            ..Self::default()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Message(m) => Some(m.text().to_string()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn write_event(&mut self, event: &StreamEvent) -> Result<(), StreamError> {
        if self.fail_on_message && matches!(event, StreamEvent::Message(_)) {
            return Err(StreamError::SinkClosed);
        }
        self.pending.push(event.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StreamError> {
        self.flushes += 1;
        self.events.append(&mut self.pending);
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        !self.no_flush
    }
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn spawn_stream(
    broker: &Arc<Broker>,
    topic: &'static str,
    cancel: &CancellationToken,
    mut sink: RecordingSink,
) -> tokio::task::JoinHandle<(Result<StreamEnd, StreamError>, RecordingSink)> {
    let broker = Arc::clone(broker);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let result = run_session(broker, topic, &cancel, &mut sink).await;
        (result, sink)
    })
}

#[tokio::test(start_paused = true)]
async fn test_established_then_messages_in_order() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let handle = spawn_stream(&broker, "news", &cancel, RecordingSink::default());
    settle().await;
    assert_eq!(broker.subscriber_count("news"), 1);

    let mut published = Vec::new();
    for text in ["a", "b", "c"] {
        published.push(broker.publish("news", text));
        settle().await;
    }
    cancel.cancel();

    let (result, sink) = handle.await.unwrap();
    assert_eq!(result.unwrap(), StreamEnd::Cancelled);
    assert_eq!(sink.events.first(), Some(&StreamEvent::Established));
    assert_eq!(sink.texts(), vec!["a", "b", "c"]);
    let ids: Vec<_> = sink.events.iter().filter_map(StreamEvent::message_id).collect();
    assert_eq!(ids, published);
    // every event flushed on its own
    assert_eq!(sink.flushes, sink.events.len());
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_elapsed_and_unsubscribes() {
    let broker = Arc::new(Broker::new(Duration::from_secs(60)));
    let cancel = CancellationToken::new();
    let handle = spawn_stream(&broker, "news", &cancel, RecordingSink::default());

    let (result, sink) = handle.await.unwrap();
    assert_eq!(result.unwrap(), StreamEnd::TimedOut);
    assert_eq!(
        sink.events,
        vec![
            StreamEvent::Established,
            StreamEvent::Timeout {
                elapsed: Duration::from_secs(60)
            },
        ]
    );
    assert_eq!(broker.subscriber_count("news"), 0);
    broker.publish("news", "nobody home");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_not_reset_by_activity() {
    let broker = Arc::new(Broker::new(Duration::from_secs(10)));
    let cancel = CancellationToken::new();
    let handle = spawn_stream(&broker, "news", &cancel, RecordingSink::default());
    settle().await;

    tokio::time::sleep(Duration::from_secs(8)).await;
    broker.publish("news", "late but in time");

    let (result, sink) = handle.await.unwrap();
    assert_eq!(result.unwrap(), StreamEnd::TimedOut);
    assert_eq!(sink.texts(), vec!["late but in time"]);
    assert_eq!(
        sink.events.last(),
        Some(&StreamEvent::Timeout {
            elapsed: Duration::from_secs(10)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_ends_without_event() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let handle = spawn_stream(&broker, "news", &cancel, RecordingSink::default());
    settle().await;

    cancel.cancel();

    let (result, sink) = handle.await.unwrap();
    assert_eq!(result.unwrap(), StreamEnd::Cancelled);
    assert_eq!(sink.events, vec![StreamEvent::Established]);
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test]
async fn test_sink_without_flush_is_rejected() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let mut sink = RecordingSink::without_flush();

    let result = run_session(Arc::clone(&broker), "news", &cancel, &mut sink).await;

    assert!(matches!(result, Err(StreamError::SinkUnsupported)));
    assert!(sink.events.is_empty());
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_still_unsubscribes() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let handle = spawn_stream(&broker, "news", &cancel, RecordingSink::failing_on_message());
    settle().await;

    broker.publish("news", "boom");

    let (result, sink) = handle.await.unwrap();
    assert!(matches!(result, Err(StreamError::SinkClosed)));
    assert_eq!(sink.events, vec![StreamEvent::Established]);
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_subscriber_keeps_only_one_message() {
    let broker = Broker::default();
    let mut session = broker.subscribe("news");
    let first = broker.publish("news", "A");
    broker.publish("news", "B");

    let cancel = CancellationToken::new();
    let mut sink = RecordingSink::default();
    let stream = stream_messages(&mut session, &cancel, &mut sink, &NoopTracer);
    let canceller = async {
        settle().await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(stream, canceller);

    assert_eq!(result.unwrap(), StreamEnd::Cancelled);
    assert_eq!(sink.texts(), vec!["A"]);
    assert_eq!(sink.events[1].message_id(), Some(first));
    broker.unsubscribe(&mut session);
}

#[tokio::test]
async fn test_closed_queue_ends_stream() {
    let broker = Broker::default();
    let mut session = broker.subscribe("news");
    broker.unsubscribe(&mut session);

    let tracer = MemoryTracer::new();
    let mut sink = RecordingSink::default();
    let result = stream_messages(&mut session, &CancellationToken::new(), &mut sink, &tracer).await;

    assert_eq!(result.unwrap(), StreamEnd::Closed);
    assert_eq!(sink.events, vec![StreamEvent::Established]);
    assert!(tracer.contains("stream - queue closed"));
}

#[test]
fn test_sse_framing() {
    let msg = StreamEvent::Message(Arc::new(Message::new(3, "news", "hello")));
    assert_eq!(sse::encode(&StreamEvent::Established), ": connected\n\n");
    assert_eq!(sse::encode(&msg), "id: 3\nevent: msg\ndata: hello\n\n");
    assert_eq!(
        sse::encode(&StreamEvent::Timeout {
            elapsed: Duration::from_secs(60)
        }),
        "event: timeout\ndata: 60s\n\n"
    );
}

#[test]
fn test_sse_multiline_text() {
    let msg = StreamEvent::Message(Arc::new(Message::new(7, "news", "one\r\ntwo\n")));
    assert_eq!(
        sse::encode(&msg),
        "id: 7\nevent: msg\ndata: one\ndata: two\ndata: \n\n"
    );

    // a bare CR ends the line too, so the text cannot inject fields
    let forged = StreamEvent::Message(Arc::new(Message::new(8, "news", "x\revent: timeout\rid: 999")));
    assert_eq!(
        sse::encode(&forged),
        "id: 8\nevent: msg\ndata: x\ndata: event: timeout\ndata: id: 999\n\n"
    );
}

#[tokio::test]
async fn test_channel_sink_sends_one_chunk_per_flush() {
    let (mut sink, mut rx) = ChannelSink::channel();
    sink.write_event(&StreamEvent::Established).unwrap();
    sink.write_event(&StreamEvent::Timeout {
        elapsed: Duration::from_secs(1),
    })
    .unwrap();
    sink.flush().await.unwrap();
    // nothing buffered, nothing sent
    sink.flush().await.unwrap();

    let chunk = rx.recv().await.unwrap();
    assert_eq!(&chunk[..], b": connected\n\nevent: timeout\ndata: 1s\n\n");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_channel_sink_reports_closed_peer() {
    let (mut sink, rx) = ChannelSink::channel();
    drop(rx);

    sink.write_event(&StreamEvent::Established).unwrap();
    assert!(matches!(sink.flush().await, Err(StreamError::SinkClosed)));
}

#[tokio::test]
async fn test_channel_sink_waits_for_stalled_peer() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let (mut sink, mut rx) = ChannelSink::channel();
    let handle = tokio::spawn({
        let broker = Arc::clone(&broker);
        let cancel = cancel.clone();
        async move { run_session(broker, "news", &cancel, &mut sink).await }
    });
    settle().await;

    // nobody reads: the loop blocks on the first message, the slot keeps the
    // second and everything after is skipped
    for i in 0..1000 {
        broker.publish("news", format!("m{i}"));
        settle().await;
    }
    assert_eq!(broker.last_message_id(), Some(999));

    assert_eq!(&rx.recv().await.unwrap()[..], b": connected\n\n");
    let first = rx.recv().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&first), "id: 0\nevent: msg\ndata: m0\n\n");
    let second = rx.recv().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&second), "id: 1\nevent: msg\ndata: m1\n\n");
    settle().await;
    assert!(rx.try_recv().is_err());

    cancel.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), StreamEnd::Cancelled);
    assert_eq!(broker.topic_count(), 0);
}

#[tokio::test]
async fn test_cancel_while_peer_stalled() {
    let broker = Arc::new(Broker::default());
    let cancel = CancellationToken::new();
    let (mut sink, mut rx) = ChannelSink::channel();
    let handle = tokio::spawn({
        let broker = Arc::clone(&broker);
        let cancel = cancel.clone();
        async move { run_session(broker, "news", &cancel, &mut sink).await }
    });
    settle().await;

    broker.publish("news", "stuck");
    settle().await;
    cancel.cancel();

    assert_eq!(handle.await.unwrap().unwrap(), StreamEnd::Cancelled);
    assert_eq!(broker.topic_count(), 0);
    // the pending frame was never handed over
    assert_eq!(&rx.recv().await.unwrap()[..], b": connected\n\n");
    assert!(rx.recv().await.is_none());
}
