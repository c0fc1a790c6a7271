//! Axum handlers for `/api/*` routes.
//!
//! Each handler receives [`AxumState`] via [`axum::extract::State`] and
//! returns an axum [`Response`].  Every desk call is bounded by a timeout;
//! chat turns get the long one because they may wait on the LLM.

use std::future::Future;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::AppError;

use super::AxumState;

const TURN_TIMEOUT: Duration = Duration::from_secs(120);
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct MessageRequest {
    message: String,
    session_id: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn error_response(channel_id: &str, err: AppError) -> Response {
    match err {
        AppError::Session(msg) => (StatusCode::NOT_FOUND, json_error("not_found", msg)).into_response(),
        AppError::Underwriting(e) => (StatusCode::BAD_REQUEST, json_error("bad_request", e)).into_response(),
        other => {
            warn!(%channel_id, "request failed: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", other)).into_response()
        }
    }
}

/// Await `fut` under `limit`, mapping errors and timeouts to JSON responses.
async fn bounded<T, F>(state: &AxumState, limit: Duration, what: &str, fut: F) -> Response
where
    T: Serialize,
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(e)) => error_response(&state.channel_id, e),
        Err(_) => {
            warn!(channel_id = %state.channel_id, "{what} timed out");
            (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", format!("{what} timed out")))
                .into_response()
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    let report = state.comms.health().await;
    (StatusCode::OK, Json(report)).into_response()
}

/// GET /api/customers — the synthetic test customers.
pub(super) async fn customers(State(state): State<AxumState>) -> Response {
    (StatusCode::OK, Json(json!({ "customers": state.comms.customers() }))).into_response()
}

/// GET /api/sessions
pub(super) async fn sessions(State(state): State<AxumState>) -> Response {
    let sessions = state.comms.sessions().await;
    (StatusCode::OK, Json(json!({ "sessions": sessions }))).into_response()
}

/// POST /api/sessions — open a session and return its greeting.
pub(super) async fn create_session(State(state): State<AxumState>) -> Response {
    bounded(&state, TURN_TIMEOUT, "session create", state.comms.open_session(&state.channel_id)).await
}

/// GET /api/sessions/{session_id}
pub(super) async fn session_detail(
    State(state): State<AxumState>,
    Path(session_id): Path<String>,
) -> Response {
    bounded(&state, QUERY_TIMEOUT, "session detail", state.comms.session(&session_id)).await
}

/// POST /api/sessions/{session_id}/reset
pub(super) async fn reset_session(
    State(state): State<AxumState>,
    Path(session_id): Path<String>,
) -> Response {
    bounded(&state, TURN_TIMEOUT, "session reset", state.comms.reset_session(&session_id)).await
}

/// POST /api/message
pub(super) async fn message(
    State(state): State<AxumState>,
    Json(req): Json<MessageRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, json_error("bad_request", "message must not be empty"))
            .into_response();
    }
    let session_id = req.session_id.as_deref().filter(|s| !s.is_empty());
    bounded(
        &state,
        TURN_TIMEOUT,
        "chat turn",
        state.comms.send_message(&state.channel_id, session_id, &req.message),
    )
    .await
}

/// GET /api/sessions/{session_id}/letter — the sanction letter PDF.
pub(super) async fn letter(
    State(state): State<AxumState>,
    Path(session_id): Path<String>,
) -> Response {
    match tokio::time::timeout(QUERY_TIMEOUT, state.comms.letter(&session_id)).await {
        Ok(Ok(Some(file))) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.file_name),
                ),
            ],
            file.bytes,
        )
            .into_response(),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            json_error("not_found", "no sanction letter has been issued for this session"),
        )
            .into_response(),
        Ok(Err(e)) => error_response(&state.channel_id, e),
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", "letter request timed out"))
            .into_response(),
    }
}
