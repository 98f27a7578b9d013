//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, SessionId, session::SessionSnapshot};
use product_advisor::TurnResponse;

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ollama_connected: bool,
    pub tools: Vec<String>,
    pub active_sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    /// Continue an existing conversation; a new one is started when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn session_error(e: &AgentError) -> ApiError {
    tracing::error!("Session store error: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "SESSION_ERROR")
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ollama_connected = state.advisor.provider_healthy().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ollama_connected,
        tools: state.advisor.tools().into_iter().map(String::from).collect(),
        active_sessions: state.advisor.sessions().len().unwrap_or_default(),
    })
}

/// Handle one conversational turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Vui lòng nhập nội dung câu hỏi.",
            "EMPTY_MESSAGE",
        ));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .map_or_else(SessionId::new, SessionId::from_string);

    let response = state.advisor.handle_turn(&session_id, &payload.message).await;
    if !response.success {
        tracing::warn!(
            session = %session_id,
            intent = %response.intent,
            error_count = response.error_count,
            "Turn completed with errors"
        );
    }
    Ok(Json(response))
}

/// Conversation history of one session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let record = state
        .advisor
        .sessions()
        .get(&SessionId::from_string(id))
        .await
        .map_err(|e| session_error(&e))?;
    Ok(Json(SessionSnapshot::from(&record)))
}

/// Forget a session's history
pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cleared = state
        .advisor
        .sessions()
        .clear(&SessionId::from_string(id))
        .await
        .map_err(|e| session_error(&e))?;

    if cleared {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "Không tìm thấy phiên trò chuyện.", "SESSION_NOT_FOUND"))
    }
}
