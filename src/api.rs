//! REST endpoints for conversations, runs, and client records.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::conversation::ConversationEngine;
use crate::error::{Error, SessionError};
use crate::orchestrator::Orchestrator;
use crate::store::{KnowledgeStore, RecordKind};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ConversationEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn KnowledgeStore>,
}

#[derive(Debug, Deserialize)]
struct StartConversationRequest {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: String,
}

fn error_response(err: Error) -> Response {
    match err {
        Error::Session(session_err) => {
            let status = match session_err {
                SessionError::UnknownSession { .. } => StatusCode::NOT_FOUND,
                SessionError::SessionBusy { .. } => StatusCode::CONFLICT,
            };
            (
                status,
                Json(json!({
                    "error": session_err.code(),
                    "detail": session_err.to_string(),
                })),
            )
                .into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal", "detail": other.to_string()})),
        )
            .into_response(),
    }
}

/// POST /api/conversations
///
/// Starts a session and returns the opening greeting.
async fn start_conversation(
    State(state): State<ApiState>,
    Json(request): Json<StartConversationRequest>,
) -> impl IntoResponse {
    let label = if request.label.trim().is_empty() {
        "onboarding".to_string()
    } else {
        request.label
    };
    let (conversation_id, message) = state.engine.start_session(&label).await;
    Json(json!({
        "conversation_id": conversation_id,
        "message": message,
    }))
}

/// POST /api/conversations/{id}/messages
///
/// Processes one user turn. 404 `unknown_session` for absent or terminal
/// sessions, 409 `session_busy` when a concurrent turn is in flight.
async fn send_message(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Response {
    match state.engine.send_message(id, &request.message).await {
        Ok(reply) => Json(json!({
            "message": reply.message,
            "completion_percentage": reply.completion_percentage,
            "is_complete": reply.is_complete,
            "client_info": reply.client_info,
            "run_id": reply.run_id,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/conversations/{id}
async fn conversation_status(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.engine.session(id).await {
        Ok(session) => Json(json!({
            "conversation_id": session.id,
            "label": session.label,
            "status": session.status,
            "completion_percentage": session.completeness,
            "client_info": session.slots,
            "turns": session.turns.len(),
            "created_at": session.created_at,
            "last_activity": session.last_activity,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/runs/{id}
async fn run_status(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.orchestrator.run(id).await {
        Ok(run) => Json(run).into_response(),
        Err(err) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "run_not_found", "detail": err.to_string()})),
        )
            .into_response(),
    }
}

/// GET /api/clients/{name}
///
/// All knowledge-store records for a client, grouped by kind.
async fn client_records(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    let mut records = serde_json::Map::new();
    for kind in RecordKind::ALL {
        match state.store.list_records(kind, &name).await {
            Ok(found) => {
                records.insert(kind.as_str().to_string(), json!(found));
            }
            Err(err) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "store", "detail": err.to_string()})),
                )
                    .into_response();
            }
        }
    }

    let runs = state.orchestrator.runs_for_client(&name).await;
    Json(json!({
        "client_name": name,
        "records": records,
        "runs": runs,
    }))
    .into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

/// Build the REST router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/conversations", post(start_conversation))
        .route("/api/conversations/{id}/messages", post(send_message))
        .route("/api/conversations/{id}", get(conversation_status))
        .route("/api/runs/{id}", get(run_status))
        .route("/api/clients/{name}", get(client_records))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
