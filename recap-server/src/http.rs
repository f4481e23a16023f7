//! Recap HTTP API
//!
//! Axum-based HTTP server exposing the question-answering pipeline.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET  /health   service-account login check
//! - GET  /version  server version info
//! - POST /chat     answer a question about past interviews

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use recap_core::{Pipeline, PipelineError, RecapConfig};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<Pipeline>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pipeline: Arc<Pipeline>,
    config: RecapConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { pipeline });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Recap HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
    pub kind: String,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(e: &PipelineError) -> Self {
        Self {
            error: e.client_message(),
            status: "error".to_string(),
            kind: e.kind().to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: obtains (or reuses) a backend session token.
pub async fn health_inner(pipeline: &Pipeline) -> (StatusCode, serde_json::Value) {
    match pipeline.check_backend().await {
        Ok(()) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": "ok",
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "version": env!("CARGO_PKG_VERSION"),
                "error": e.client_message(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "recap/1",
    })
}

/// Inner chat: runs the pipeline and maps its outcome to a status + body.
pub async fn chat_inner(pipeline: &Pipeline, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let question = req.question.unwrap_or_default();
    let start = Instant::now();

    let result = pipeline.answer(&question).await;
    let took_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(answer) => {
            tracing::info!(took_ms, "Chat request answered");
            let body = ChatResponse { answer };
            (StatusCode::OK, serde_json::to_value(body).unwrap_or_default())
        }
        Err(e) => {
            tracing::info!(took_ms, kind = e.kind(), "Chat request failed");
            let body = ErrorResponse::from(&e);
            (error_status(&e), serde_json::to_value(body).unwrap_or_default())
        }
    }
}

/// Inner rejection mapping: a body axum could not read as a `ChatRequest`
/// still gets the standard error shape.
pub fn invalid_request_inner(rejection: &JsonRejection) -> (StatusCode, serde_json::Value) {
    let body = ErrorResponse {
        error: rejection.body_text(),
        status: "error".to_string(),
        kind: "invalid_request".to_string(),
    };
    (rejection.status(), serde_json::to_value(body).unwrap_or_default())
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pipeline).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => chat_inner(&state.pipeline, req).await,
        Err(rejection) => {
            tracing::info!(error = %rejection, "Chat request rejected");
            invalid_request_inner(&rejection)
        }
    };
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn error_status(e: &PipelineError) -> StatusCode {
    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
