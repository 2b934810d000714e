//! HTTP transport
//!
//! Translates HTTP requests into broker operations:
//! - publish: read the whole body, treat it as text, publish, answer `204`
//! - subscribe: open a session, run the streaming loop in its own task and
//!   forward its flushed chunks as the response body
//!
//! Every subscriber connection gets a child of the server's shutdown token.
//! It is cancelled when the peer goes away (the response body is dropped) or
//! when the server shuts down.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::{Broker, MessageId};
use crate::hint;
use crate::stream::{ChannelSink, run_session, sse};
use crate::utils::error::ServerError;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(broker: Arc<Broker>, shutdown: CancellationToken) -> Self {
        Self { broker, shutdown }
    }
}

#[derive(Debug, Serialize)]
struct TopicStats {
    topic: String,
    subscribers: usize,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    last_message_id: Option<MessageId>,
    topics: Vec<TopicStats>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/infocenter", get(stats))
        .route("/infocenter/:topic", get(subscribe).post(publish))
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` is cancelled.
pub async fn serve(
    addr: &str,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    serve_listener(listener, broker, shutdown).await
}

/// Serves on an already bound listener until `shutdown` is cancelled.
pub async fn serve_listener(
    listener: TcpListener,
    broker: Arc<Broker>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    match listener.local_addr() {
        Ok(addr) => info!("InfoCenter listening on http://{addr}"),
        Err(e) => warn!("InfoCenter listening on an unknown address: {e}"),
    }

    let app = router(Arc::new(AppState::new(broker, shutdown.clone())));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ServerError::Serve)?;

    info!("InfoCenter stopped");
    Ok(())
}

async fn publish(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    body: Body,
) -> Response {
    let tracer = state.broker.tracer();
    hint!(tracer, "POST - start.");

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            hint!(tracer, "! POST - error reading body.");
            warn!("failed to read publish body for {topic}: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading request body",
            )
                .into_response();
        }
    };

    let text = String::from_utf8_lossy(&bytes).into_owned();
    let id = state.broker.publish(&topic, text);
    debug!("published message {id} to {topic}");

    hint!(tracer, "POST - end.");
    StatusCode::NO_CONTENT.into_response()
}

async fn subscribe(State(state): State<Arc<AppState>>, Path(topic): Path<String>) -> Response {
    let tracer = Arc::clone(state.broker.tracer());
    hint!(tracer, "GET - start.");

    let (mut sink, mut rx) = ChannelSink::channel();
    let cancel = state.shutdown.child_token();

    watch_peer(sink.sender(), cancel.clone());

    let broker = Arc::clone(&state.broker);
    let loop_cancel = cancel.clone();
    let loop_topic = topic.clone();
    let task = tokio::spawn(async move {
        // Stops the peer watcher once the loop is over, whatever the reason.
        let _stop_watcher = loop_cancel.clone().drop_guard();
        run_session(broker, &loop_topic, &loop_cancel, &mut sink).await
    });

    // The first chunk decides between a stream and an up-front error.
    let Some(first) = rx.recv().await else {
        return match task.await {
            Ok(Err(e)) => {
                warn!(error = e.as_label(), "subscription to {topic} failed: {e}");
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            Ok(Ok(end)) => {
                debug!("subscription to {topic} ended before streaming: {end:?}");
                StatusCode::NO_CONTENT.into_response()
            }
            Err(e) => {
                warn!("subscription task for {topic} failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    };

    debug!("subscriber connected to {topic}");
    hint!(tracer, "GET - streaming.");

    let rest = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });
    let body = stream::once(async move { Ok::<_, Infallible>(first) }).chain(rest);

    (
        [
            (header::CONTENT_TYPE, sse::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Cancels `cancel` when the response body behind `tx` is dropped.
fn watch_peer(tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tx.closed() => cancel.cancel(),
            _ = cancel.cancelled() => {}
        }
    });
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let topics = state
        .broker
        .topics()
        .into_iter()
        .map(|(topic, subscribers)| TopicStats { topic, subscribers })
        .collect();

    Json(StatsResponse {
        last_message_id: state.broker.last_message_id(),
        topics,
    })
}
