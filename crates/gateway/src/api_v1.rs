//! Versioned JSON API used by the web chat.
//!
//! | Method | Path                 | Purpose                                  |
//! |--------|----------------------|------------------------------------------|
//! | POST   | `/v1/chat`           | run one turn, creating a session if needed |
//! | GET    | `/v1/sessions`       | saved sessions, newest first             |
//! | GET    | `/v1/sessions/{id}`  | one session's displayable messages       |
//! | DELETE | `/v1/sessions/{id}`  | delete a session                         |
//! | GET    | `/v1/items`          | the to-do list                           |
//! | DELETE | `/v1/items`          | clear the to-do list                     |

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use snello_agent::display_messages;
use snello_core::error::{Error, StoreError};
use snello_core::store::{SessionSummary, ToDoItem};
use tracing::{error, info};

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/sessions", get(list_sessions_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/items", get(list_items_handler).delete(clear_items_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing session ID (omit to start a new chat).
    #[serde(default)]
    session_id: Option<String>,

    /// The user's message.
    message: String,

    /// Start from the "new chat" greeting instead of the startup one.
    #[serde(default)]
    new_chat: bool,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    session_id: String,
    reply: String,
    degraded: bool,
}

#[derive(Serialize, Deserialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
}

#[derive(Serialize, Deserialize)]
struct MessageDto {
    role: String,
    content: String,
}

#[derive(Serialize, Deserialize)]
struct SessionDetailResponse {
    id: String,
    messages: Vec<MessageDto>,
}

#[derive(Serialize, Deserialize)]
struct ItemListResponse {
    items: Vec<ToDoItem>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Maps service errors onto HTTP statuses with a JSON `{error}` body.
struct ApiError(StatusCode, String);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Store(StoreError::SessionNotFound(id)) => {
                Self(StatusCode::NOT_FOUND, format!("Chat session not found: {id}"))
            }
            other => {
                error!(error = %other, "Request failed");
                Self(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "message must not be empty".into(),
        ));
    }

    info!(session = ?payload.session_id, "v1/chat request");

    let turn = state
        .chat
        .send_to(payload.session_id.as_deref(), payload.new_chat, &payload.message)
        .await?;

    Ok(Json(ChatResponse {
        session_id: turn.session_id,
        reply: turn.reply,
        degraded: turn.degraded,
    }))
}

async fn list_sessions_handler(
    State(state): State<SharedState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.chat.list_sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let chat = state.chat.resume(&id).await?;

    Ok(Json(SessionDetailResponse {
        id,
        messages: display_messages(&chat.messages)
            .map(|m| MessageDto {
                role: m.role().to_string(),
                content: m.content().to_string(),
            })
            .collect(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.chat.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_items_handler(
    State(state): State<SharedState>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let items = state.chat.list_items().await?;
    Ok(Json(ItemListResponse {
        count: items.len(),
        items,
    }))
}

async fn clear_items_handler(State(state): State<SharedState>) -> Result<StatusCode, ApiError> {
    state.chat.clear_items().await?;
    Ok(StatusCode::NO_CONTENT)
}
