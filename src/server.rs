//! JSON HTTP API over a built chatbot.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, crate version, and passage count |
//! | `POST` | `/search` | Retrieval only: `{query, limit?, mode?}` → `{results}` |
//! | `POST` | `/ask` | Retrieval + generation: `{question, limit?, mode?}` → `{answer, passages}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! All origins, methods, and headers are permitted (CORS).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chatbot::RagChatbot;
use crate::config::Config;
use crate::error::QueryError;
use crate::models::RetrievedPassage;
use crate::retriever::SearchMode;

#[derive(Clone)]
struct AppState {
    chatbot: Arc<RagChatbot>,
}

/// Build the router without binding a socket.
pub fn router(chatbot: Arc<RagChatbot>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(AppState { chatbot })
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config, chatbot: Arc<RagChatbot>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let passages = chatbot.index().len();
    let app = router(chatbot);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, passages, "server listening");
    println!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Only [`QueryError`] is the caller's fault; everything else is ours.
fn classify(err: anyhow::Error) -> AppError {
    if let Some(query_err) = err.downcast_ref::<QueryError>() {
        return bad_request(query_err.to_string());
    }
    let msg = format!("{:#}", err);
    tracing::error!(error = %msg, "request failed");
    internal(msg)
}

/// Any body the JSON extractor refuses is reported as `bad_request`.
fn reject(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    passages: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        passages: state.chatbot.index().len(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    mode: Option<SearchMode>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedPassage>,
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload.map_err(reject)?;
    if req.query.trim().is_empty() {
        return Err(bad_request(QueryError::Empty("query").to_string()));
    }

    let results = state
        .chatbot
        .search(&req.query, req.mode, req.limit)
        .await
        .map_err(classify)?;

    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    mode: Option<SearchMode>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    passages: Vec<RetrievedPassage>,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload.map_err(reject)?;
    let answer = state
        .chatbot
        .ask(&req.question, req.mode, req.limit)
        .await
        .map_err(classify)?;

    Ok(Json(AskResponse {
        answer: answer.text,
        passages: answer.passages,
    }))
}
