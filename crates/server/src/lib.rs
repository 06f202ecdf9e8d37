// crates/server/src/lib.rs
//! HTTP surface for project export jobs.
//!
//! Clients start an export, then poll its progress and messages (or follow
//! the SSE stream) until the runner reports it finished.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::*;
pub use logging::init_tracing;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use curation_export_jobs::ProjectExporter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, exports)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind `config.socket_addr()` and serve until the listener fails.
pub async fn serve(
    config: ServerConfig,
    exporter: Arc<dyn ProjectExporter>,
) -> anyhow::Result<()> {
    let state = AppState::with_jobs_config(config.jobs.clone(), exporter);
    let app = create_app(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Export server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use curation_export_jobs::{CancelSignal, ExportArtifact, ExportJobState};
    use tower::ServiceExt;

    struct InstantExporter;

    #[async_trait]
    impl ProjectExporter for InstantExporter {
        async fn export(
            &self,
            _job: Arc<ExportJobState>,
            _cancel: CancelSignal,
        ) -> Result<ExportArtifact, String> {
            Ok(ExportArtifact::new("/tmp/instant.zip", 1))
        }
    }

    /// Helper to make a GET request to the app.
    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        (status, body_str)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_app(AppState::new(Arc::new(InstantExporter)));
        let (status, body) = get(app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"ok\""));
        assert!(body.contains("\"exports\":{\"active\":0"));
    }

    #[tokio::test]
    async fn test_exports_endpoint_mounted() {
        let app = create_app(AppState::new(Arc::new(InstantExporter)));
        let (status, body) = get(app, "/api/exports").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn test_serve_answers_over_tcp() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        let addr = config.socket_addr();
        let server = tokio::spawn(serve(config, Arc::new(InstantExporter)));

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        }
        let mut stream = stream.expect("server never accepted a connection");
        let request = "GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));
        server.abort();
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_app(AppState::new(Arc::new(InstantExporter)));
        let (status, _) = get(app, "/api/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
