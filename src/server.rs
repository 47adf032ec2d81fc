//! HTTP server.
//!
//! Exposes sessions over a JSON API. Each session holds its own vector
//! index and conversation; nothing is shared between sessions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Start a session |
//! | `GET`    | `/sessions/{id}` | Session summary |
//! | `DELETE` | `/sessions/{id}` | Discard a session |
//! | `POST`   | `/sessions/{id}/documents` | Multipart upload of one or more PDFs |
//! | `POST`   | `/sessions/{id}/ask` | `{ "question": "...", "k": 4 }` |
//! | `GET`    | `/sessions/{id}/history` | Conversation turns |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_documents_indexed", "message": "no documents indexed", "retryable": false } }
//! ```
//!
//! Error codes: `bad_request` (400), `extract_error` (400), `not_found` (404),
//! `no_documents_indexed` (409), `embedding_service_error` (502),
//! `answer_generation_error` (502). `retryable` is true for the two
//! upstream-service errors.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use docchat_core::{CoreError, SessionState, Turn};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::qa::{AnswerView, IngestReport, QaError, QaService, SkippedFile, Upload};
use crate::sessions::{SessionStore, SharedSession};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    qa: QaService,
    sessions: SessionStore,
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(qa: QaService) -> anyhow::Result<()> {
    let bind_addr = qa.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);
    serve(listener, qa).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, qa: QaService) -> anyhow::Result<()> {
    axum::serve(listener, build_router(qa)).await?;
    Ok(())
}

pub fn build_router(qa: QaService) -> Router {
    let max_upload = qa.config().server.max_upload_bytes;
    let state = AppState {
        qa,
        sessions: SessionStore::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/documents", post(handle_upload))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/history", get(handle_history))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<SkippedFile>,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
    skipped: Vec<SkippedFile>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
            skipped: Vec::new(),
        }
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
                skipped: self.skipped,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidConfiguration(_) | CoreError::InvalidArgument(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            CoreError::NoDocumentsIndexed => {
                AppError::new(StatusCode::CONFLICT, "no_documents_indexed", message)
            }
            CoreError::EmbeddingService(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "embedding_service_error", message)
                    .retryable()
            }
            CoreError::AnswerGeneration(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "answer_generation_error", message)
                    .retryable()
            }
        }
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        match err {
            QaError::Core(e) => e.into(),
            QaError::NothingExtracted { skipped } => {
                let mut e = AppError::new(
                    StatusCode::BAD_REQUEST,
                    "extract_error",
                    "no text could be extracted from the uploaded files",
                );
                e.skipped = skipped;
                e
            }
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(id: &Uuid) -> AppError {
    AppError::new(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("no session with id {}", id),
    )
}

async fn lookup(state: &AppState, id: &Uuid) -> Result<SharedSession, AppError> {
    state.sessions.get(id).await.ok_or_else(|| not_found(id))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Sessions ============

#[derive(Serialize)]
struct SessionSummary {
    session_id: Uuid,
    state: SessionState,
    created_at: DateTime<Utc>,
    documents: Vec<String>,
    chunks: usize,
    turns: usize,
}

fn summarize(session: &docchat_core::Session) -> SessionSummary {
    SessionSummary {
        session_id: session.id(),
        state: session.state(),
        created_at: session.created_at(),
        documents: session.documents().to_vec(),
        chunks: session.index().len(),
        turns: session.memory().len(),
    }
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSummary>), AppError> {
    let session = state.qa.new_session()?;
    let summary = summarize(&session);
    state.sessions.insert(session).await;
    info!(session = %summary.session_id, "session created");
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let session = lookup(&state, &id).await?;
    let guard = session.lock().await;
    Ok(Json(summarize(&guard)))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&id).await {
        info!(session = %id, "session discarded");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

// ============ POST /sessions/{id}/documents ============

async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, AppError> {
    let session = lookup(&state, &id).await?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field
            .file_name()
            .or_else(|| field.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", uploads.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read {}: {}", name, e)))?;
        uploads.push(Upload::new(name, bytes.to_vec()));
    }

    if uploads.is_empty() {
        return Err(bad_request("no files in upload"));
    }

    let extracted = state.qa.extract(uploads).await?;
    let mut guard = session.lock().await;
    let report = state.qa.index(&mut guard, extracted).await?;
    Ok(Json(report))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerView>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let session = lookup(&state, &id).await?;
    let mut guard = session.lock().await;
    let view = state.qa.ask(&mut guard, &req.question, req.k).await?;
    Ok(Json(view))
}

// ============ GET /sessions/{id}/history ============

#[derive(Serialize)]
struct HistoryResponse {
    session_id: Uuid,
    turns: Vec<Turn>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session = lookup(&state, &id).await?;
    let guard = session.lock().await;
    Ok(Json(HistoryResponse {
        session_id: id,
        turns: guard.memory().turns().to_vec(),
    }))
}
