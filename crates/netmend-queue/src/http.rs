//! HTTP ingestion endpoint for alerts.

use crate::error::QueueError;
use crate::queue::AlertQueue;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the HTTP router for alert ingestion.
pub fn create_router(queue: Arc<AlertQueue>) -> Router {
    Router::new()
        .route("/alert", post(handle_alert))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(queue)
}

/// Accept any JSON document and append it to the queue.
///
/// The body is parsed by hand so that malformed input gets the same error
/// shape as a failed write.
async fn handle_alert(State(queue): State<Arc<AlertQueue>>, body: Bytes) -> impl IntoResponse {
    let alert: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return error_response(format!("Invalid JSON: {e}")),
    };

    match queue.enqueue(&alert).await {
        Ok(()) => {
            tracing::info!(bytes = body.len(), "Alert queued");
            (StatusCode::OK, Json(json!({"status": "success"})))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to queue alert");
            error_response(format!("Invalid JSON: {e}"))
        }
    }
}

fn error_response(message: String) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": message})),
    )
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "netmend-queue",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server in front of an [`AlertQueue`].
pub struct QueueServer {
    addr: String,
    queue: Arc<AlertQueue>,
}

impl QueueServer {
    pub fn new(addr: impl Into<String>, queue: Arc<AlertQueue>) -> Self {
        Self {
            addr: addr.into(),
            queue,
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), QueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.queue.clone());

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| QueueError::StartupFailed(format!("failed to bind {}: {e}", self.addr)))?;

        tracing::info!(
            addr = %self.addr,
            file = %self.queue.path().display(),
            "Alert queue listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_alert(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/alert")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn accepts_any_json() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(AlertQueue::new(dir.path().join("alerts.jsonl")));
        let app = create_router(queue.clone());

        let response = app
            .oneshot(post_alert(r#"{"device": "core-rtr-01", "event": "BGP down"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "success"}));

        let line = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(line, r#"{"device":"core-rtr-01","event":"BGP down"}"#);
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(AlertQueue::new(dir.path().join("alerts.jsonl")));
        let app = create_router(queue.clone());

        let response = app.oneshot(post_alert("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid JSON: "));
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(Arc::new(AlertQueue::new(dir.path().join("q.jsonl"))));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "netmend-queue");
    }
}
