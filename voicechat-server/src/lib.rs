//! HTTP relay between chat clients and the hosted assistant.
//!
//! ## Endpoints
//!
//! - `POST /chat`: run one turn, reply with `{ threadId, message }`
//! - `GET /chat/history/{thread_id}`: thread transcript, oldest first
//! - `GET /health`: liveness

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;
use voicechat_core::types::ThreadId;
use voicechat_engine::orchestrator::{RunOrchestrator, TurnError};
use voicechat_runtime::wire::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, HistoryResponse,
};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<RunOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: RunOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handle_chat))
        .route("/chat/history/{thread_id}", get(handle_history))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serves until ctrl-c.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("shutting down");
        })
        .await?;
    Ok(())
}

struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, details: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: status
                    .canonical_reason()
                    .unwrap_or("Error")
                    .to_string(),
                details: details.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiError::new(status, e.to_string())
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let turn = Uuid::new_v4();
    // An empty id from a client starts a new thread.
    let thread = req.thread_id.filter(|t| !t.as_str().trim().is_empty());
    log::info!(
        "turn {turn}: thread={}",
        thread.as_ref().map(ThreadId::as_str).unwrap_or("<new>")
    );

    match state
        .orchestrator
        .submit_turn(&req.message, thread.as_ref())
        .await
    {
        Ok(out) => {
            log::info!("turn {turn}: replied on {}", out.thread_id);
            Ok(Json(ChatResponse {
                thread_id: out.thread_id,
                message: out.reply,
            }))
        }
        Err(e) => {
            log::error!("turn {turn}: {e}");
            Err(e.into())
        }
    }
}

async fn handle_history(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let thread = ThreadId::new(thread_id);
    let messages = state.orchestrator.history(&thread).await.map_err(|e| {
        log::warn!("history for {thread} failed: {e}");
        ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
    })?;
    Ok(Json(HistoryResponse { messages }))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
