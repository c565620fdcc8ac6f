use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared_types::{Input, LessonId};
use tracing::error;

use crate::engine::{Engine, EngineError};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/sessions/{conversation_id}",
            post(begin_session)
                .get(get_session)
                .delete(cancel_session),
        )
        .route("/sessions/{conversation_id}/input", post(submit_input))
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": code, "message": message })),
    )
        .into_response()
}

fn engine_error_response(err: EngineError) -> Response {
    let (status, code) = match &err {
        EngineError::LessonNotFound(_) => (StatusCode::NOT_FOUND, "lesson_not_found"),
        EngineError::NoActiveSession(_) => (StatusCode::NOT_FOUND, "no_active_session"),
        EngineError::EmptyGroup(_) => (StatusCode::UNPROCESSABLE_ENTITY, "empty_group"),
        EngineError::SessionAborted(_) => (StatusCode::CONFLICT, "session_aborted"),
        EngineError::StorageWriteFailed(_) => {
            error!("report storage write: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, "storage_write_failed")
        }
        EngineError::StorageReadFailed(_) => {
            error!("report storage read: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, "storage_read_failed")
        }
    };
    error_body(status, code, err.to_string())
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct BeginRequest {
    pub lesson_id: i64,
}

/// POST /sessions/:conversation_id: start a report interview
pub async fn begin_session(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<BeginRequest>,
) -> Response {
    let _guard = state.conversations.acquire(&conversation_id).await;
    match state
        .engine
        .begin(&conversation_id, LessonId(req.lesson_id))
        .await
    {
        Ok(session) => {
            let prompt = Engine::prompt(&session);
            Json(serde_json::json!({ "session": session, "prompt": prompt })).into_response()
        }
        Err(e) => engine_error_response(e),
    }
}

/// GET /sessions/:conversation_id: current question of the active session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Response {
    match state.engine.session(&conversation_id).await {
        Ok(Some(session)) => {
            let prompt = Engine::prompt(&session);
            Json(serde_json::json!({ "session": session, "prompt": prompt })).into_response()
        }
        Ok(None) => engine_error_response(EngineError::NoActiveSession(conversation_id)),
        Err(e) => engine_error_response(e),
    }
}

/// Answer as sent by the transport. `token` carries a raw callback token.
#[derive(Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InputRequest {
    Choice(bool),
    Text(String),
    Token(String),
}

/// POST /sessions/:conversation_id/input: answer the current question
pub async fn submit_input(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<InputRequest>,
) -> Response {
    let input = match req {
        InputRequest::Choice(value) => Input::Choice(value),
        InputRequest::Text(text) => Input::Text(text),
        InputRequest::Token(token) => match Input::from_token(&token) {
            Some(input) => input,
            None => {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "invalid_token",
                    format!("unknown choice token '{token}'"),
                )
            }
        },
    };

    let _guard = state.conversations.acquire(&conversation_id).await;
    match state.engine.handle(&conversation_id, input).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// DELETE /sessions/:conversation_id: abandon the interview
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Response {
    let _guard = state.conversations.acquire(&conversation_id).await;
    match state.engine.cancel(&conversation_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error_response(e),
    }
}
