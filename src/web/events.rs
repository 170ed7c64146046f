//! Server-Sent Events for live team updates

use axum::{
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use teamscope_core::stream::StreamMessage;
use teamscope_core::teams::validate_team_name;
use teamscope_core::{open_channel, ChannelEvent, ChannelHandle, TeamMonitor};

use crate::config::StreamSettings;

use super::api::json_error;

/// State for SSE handler
pub struct SseState {
    pub monitor: Arc<TeamMonitor>,
    pub stream: StreamSettings,
    /// Server-wide token; each channel gets a child
    pub shutdown: CancellationToken,
}

/// Query parameters of `/api/stream`
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub team: Option<String>,
}

/// Channel events as an SSE body
///
/// Holds the channel handle, so the channel closes when axum drops the body
/// on client disconnect.
struct ChannelStream {
    rx: ReceiverStream<ChannelEvent>,
    _handle: ChannelHandle,
}

impl Stream for ChannelStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_next_unpin(cx)
            .map(|event| event.map(|e| Ok(to_sse_event(e))))
    }
}

fn to_sse_event(event: ChannelEvent) -> Event {
    match event {
        ChannelEvent::Heartbeat => Event::default().comment("heartbeat"),
        ChannelEvent::Message(msg) => message_event(&msg),
    }
}

fn message_event(msg: &StreamMessage) -> Event {
    Event::default().json_data(msg).unwrap_or_else(|e| {
        tracing::error!("SSE: failed to encode message: {}", e);
        Event::default().comment("encode-error")
    })
}

/// SSE stream of `update`/`error` messages plus heartbeats
///
/// `?team=<name>` scopes the channel to one team; an empty value means all.
pub async fn stream(
    State(state): State<Arc<SseState>>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let filter = query.team.filter(|t| !t.is_empty());
    if let Some(team) = &filter {
        if let Err(e) = validate_team_name(team) {
            tracing::warn!("SSE: {}", e);
            return json_error(StatusCode::BAD_REQUEST, "Invalid team name").into_response();
        }
    }

    tracing::debug!("SSE: channel opened filter={:?}", filter);

    let (tx, rx) = mpsc::channel(state.stream.channel_capacity);
    let handle = open_channel(
        Arc::clone(&state.monitor),
        filter,
        state.stream.publisher_config(),
        tx,
        state.shutdown.child_token(),
    );

    let body = ChannelStream {
        rx: ReceiverStream::new(rx),
        _handle: handle,
    };

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(body),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use teamscope_core::teams::StorePaths;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(root: &std::path::Path, shutdown: CancellationToken) -> Router {
        let sse_state = Arc::new(SseState {
            monitor: Arc::new(TeamMonitor::new(StorePaths::from_claude_dir(root))),
            stream: StreamSettings::default(),
            shutdown,
        });
        Router::new()
            .route("/stream", get(stream))
            .with_state(sse_state)
    }

    fn seeded_store() -> TempDir {
        let dir = TempDir::new().unwrap();
        let team_dir = dir.path().join("teams/alpha");
        fs::create_dir_all(&team_dir).unwrap();
        fs::write(
            team_dir.join("config.json"),
            r#"{"name":"alpha","members":[{"agentId":"lead@alpha","name":"lead"}]}"#,
        )
        .unwrap();
        dir
    }

    async fn first_frame(body: &mut Body) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("no frame within timeout")
            .expect("body ended")
            .unwrap();
        String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_rejects_invalid_team() {
        let dir = seeded_store();
        let app = test_router(dir.path(), CancellationToken::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stream?team=..%2Fetc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_sends_initial_update() {
        let dir = seeded_store();
        let app = test_router(dir.path(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");
        assert_eq!(response.headers().get("x-accel-buffering").unwrap(), "no");

        let frame = first_frame(&mut response.into_body()).await;
        assert!(frame.starts_with("data: "), "frame: {frame}");
        assert!(frame.contains(r#""type":"update""#), "frame: {frame}");
        assert!(frame.contains(r#""name":"alpha""#), "frame: {frame}");
    }

    #[tokio::test]
    async fn test_stream_sends_error_frame_when_store_unreadable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("teams"), "not a directory").unwrap();
        let app = test_router(dir.path(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frame = first_frame(&mut response.into_body()).await;
        let payload: serde_json::Value =
            serde_json::from_str(frame.trim().trim_start_matches("data: ")).unwrap();
        assert_eq!(payload["type"], "error");
        assert_eq!(payload["error"], "Failed to fetch monitor data");
        assert!(payload["timestamp"].is_i64());
        assert!(payload.get("data").is_none());
    }

    #[tokio::test]
    async fn test_stream_empty_team_means_all() {
        let dir = seeded_store();
        let app = test_router(dir.path(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/stream?team=").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frame = first_frame(&mut response.into_body()).await;
        assert!(frame.contains(r#""name":"alpha""#), "frame: {frame}");
    }

    #[tokio::test]
    async fn test_stream_filter_to_unknown_team_is_empty_update() {
        let dir = seeded_store();
        let app = test_router(dir.path(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/stream?team=beta").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let frame = first_frame(&mut response.into_body()).await;
        assert!(frame.contains(r#""data":[]"#), "frame: {frame}");
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let dir = seeded_store();
        let shutdown = CancellationToken::new();
        let app = test_router(dir.path(), shutdown.clone());
        let response = app
            .oneshot(Request::builder().uri("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = response.into_body();
        first_frame(&mut body).await;

        shutdown.cancel();
        let end = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("stream did not end after shutdown");
        assert!(end.is_none());
    }
}
