//! HTTP Handlers

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::agent::run_agent;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// JSON error body - always a human-readable detail, never a stack trace
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness check - deliberately does not probe the model backend
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    // A missing or malformed body is a client error with a JSON detail,
    // same as a blank message
    let Json(payload) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                detail: rejection.body_text(),
            }),
        )
    })?;

    // Reject blank input before touching the agent
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                detail: "Field 'message' must not be empty.".into(),
            }),
        ));
    }

    let response = run_agent(&state.agents, &payload.message).await.map_err(|e| {
        tracing::error!("Agent error: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                detail: format!("Failed to process message: {}", e),
            }),
        )
    })?;

    Ok(Json(ChatResponse { response }))
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat_handler))
        .with_state(state)
}
