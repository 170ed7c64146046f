//! Web server implementation using axum

use anyhow::{Context, Result};
use axum::http::{HeaderName, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use teamscope_core::TeamMonitor;

use crate::config::{Settings, StreamSettings};

use super::api::{self, ApiState};
use super::events::{self, SseState};

/// Web server exposing the aggregation engine
pub struct WebServer {
    settings: Settings,
    monitor: TeamMonitor,
}

impl WebServer {
    /// Create a new web server
    pub fn new(settings: Settings, monitor: TeamMonitor) -> Self {
        Self { settings, monitor }
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Open live channels are children of `shutdown` and close with it.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.settings.web.host, self.settings.web.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid bind address {}:{}",
                    self.settings.web.host, self.settings.web.port
                )
            })?;

        let app = router(
            self.monitor,
            self.settings.stream.clone(),
            shutdown.clone(),
        );

        tracing::info!("Web server starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}

/// Build the application router
pub fn router(monitor: TeamMonitor, stream: StreamSettings, shutdown: CancellationToken) -> Router {
    let api_state = Arc::new(ApiState {
        monitor: monitor.clone(),
    });

    let sse_state = Arc::new(SseState {
        monitor: Arc::new(monitor),
        stream,
        shutdown,
    });

    // Read-only dashboard: any origin may read
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([HeaderName::from_static("content-type")]);

    let api_routes = Router::new()
        .route("/health", get(api::health))
        .route("/teams", get(api::get_teams))
        .route("/tasks/{team_id}", get(api::get_team_detail))
        .route("/inboxes", get(api::get_all_inboxes))
        .route("/inboxes/{team_name}", get(api::get_team_inboxes))
        .with_state(api_state);

    let events_routes = Router::new()
        .route("/stream", get(events::stream))
        .with_state(sse_state);

    Router::new()
        .nest("/api", api_routes.merge(events_routes))
        .layer(cors)
}
