//! JSON HTTP API.
//!
//! Exposes the upload → rank → chat flow over HTTP for browser clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/uploads` | List uploads, newest first |
//! | `POST` | `/api/uploads` | Multipart CSV upload (field `csv_file`) |
//! | `GET`  | `/api/uploads/{id}` | Top-ranked window plus totals |
//! | `DELETE` | `/api/uploads/{id}?confirm=true` | Cascade-delete an upload |
//! | `GET`  | `/api/uploads/{id}/chat?session=TOKEN` | Session history (lazily created) |
//! | `POST` | `/api/uploads/{id}/chat` | One chat turn |
//!
//! # Error Contract
//!
//! All error responses use the same JSON shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "File must be a CSV file" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Relay faults are NOT errors at this boundary: a failed model call
//! still returns 200 with a displayable assistant message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::chat;
use crate::config::Config;
use crate::db;
use crate::ingest;
use crate::models::{ChatMessage, Record, Upload};
use crate::relay::{GenerationClient, OllamaClient};
use crate::show::{display_columns, score_range};
use crate::store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    llm: Arc<dyn GenerationClient>,
}

/// Starts the HTTP server on the configured bind address. Runs until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let llm: Arc<dyn GenerationClient> = Arc::new(
        OllamaClient::new(&config.llm).map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        llm,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/uploads", get(handle_list_uploads).post(handle_upload))
        .route(
            "/api/uploads/{id}",
            get(handle_view_upload).delete(handle_delete_upload),
        )
        .route(
            "/api/uploads/{id}/chat",
            get(handle_chat_history).post(handle_chat_turn),
        )
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    info!("rankchat server listening on http://{}", bind_addr);
    println!("rankchat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps domain errors to HTTP status codes by message, so the library
/// functions can stay on plain `anyhow` errors.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must not be empty")
        || msg.contains("must be a CSV")
        || msg.contains("No file selected")
        || msg.contains("failed to parse CSV")
    {
        bad_request(msg)
    } else {
        internal(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/uploads ============

#[derive(Serialize)]
struct UploadSummary {
    #[serde(flatten)]
    upload: Upload,
    record_count: i64,
}

#[derive(Serialize)]
struct UploadListResponse {
    uploads: Vec<UploadSummary>,
}

async fn handle_list_uploads(
    State(state): State<AppState>,
) -> Result<Json<UploadListResponse>, AppError> {
    let uploads = store::list_uploads(&state.pool, 50)
        .await
        .map_err(classify_error)?;

    Ok(Json(UploadListResponse {
        uploads: uploads
            .into_iter()
            .map(|(upload, record_count)| UploadSummary {
                upload,
                record_count,
            })
            .collect(),
    }))
}

// ============ POST /api/uploads ============

#[derive(Serialize)]
struct IngestResponse {
    upload_id: String,
    record_count: usize,
}

/// Multipart upload handler. Expects a single `csv_file` field carrying
/// the file bytes; anything else is rejected before persistence.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("csv_file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let outcome = ingest::ingest_csv(&state.pool, &state.config, &file_name, None, None, &bytes)
            .await
            .map_err(classify_error)?;

        return Ok(Json(IngestResponse {
            upload_id: outcome.upload_id,
            record_count: outcome.record_count,
        }));
    }

    Err(bad_request("No file selected"))
}

// ============ GET /api/uploads/{id} ============

#[derive(Serialize)]
struct ViewResponse {
    #[serde(flatten)]
    upload: Upload,
    total_records: i64,
    columns: Vec<String>,
    highest_score: f64,
    lowest_score: f64,
    records: Vec<Record>,
}

async fn handle_view_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let upload = store::get_upload(&state.pool, &id)
        .await
        .map_err(classify_error)?
        .ok_or_else(|| not_found(format!("upload not found: {}", id)))?;

    let records = store::top_records(&state.pool, &id, state.config.ranking.display_limit)
        .await
        .map_err(classify_error)?;
    let total_records = store::count_records(&state.pool, &id)
        .await
        .map_err(classify_error)?;

    let columns = display_columns(&records);
    let (highest_score, lowest_score) = score_range(&records);

    Ok(Json(ViewResponse {
        upload,
        total_records,
        columns,
        highest_score,
        lowest_score,
        records,
    }))
}

// ============ DELETE /api/uploads/{id} ============

#[derive(Deserialize)]
struct DeleteParams {
    #[serde(default)]
    confirm: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

/// Destructive: cascades to all records, sessions, and messages. The
/// explicit `confirm=true` guard keeps a stray DELETE from wiping data.
async fn handle_delete_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, AppError> {
    if params.confirm.as_deref() != Some("true") {
        return Err(bad_request("deletion requires confirm=true"));
    }

    let deleted = store::delete_upload(&state.pool, &id)
        .await
        .map_err(classify_error)?;
    if !deleted {
        return Err(not_found(format!("upload not found: {}", id)));
    }

    info!(upload_id = %id, "deleted upload");
    Ok(Json(DeleteResponse { deleted: true }))
}

// ============ GET /api/uploads/{id}/chat ============

#[derive(Deserialize)]
struct ChatHistoryParams {
    #[serde(default)]
    session: Option<String>,
}

#[derive(Serialize)]
struct ChatHistoryResponse {
    session: String,
    messages: Vec<ChatMessage>,
}

/// Returns the conversation for an upload + session token, creating the
/// session lazily. A missing token gets a fresh one, echoed back so the
/// client can hold on to it.
async fn handle_chat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ChatHistoryParams>,
) -> Result<Json<ChatHistoryResponse>, AppError> {
    if store::get_upload(&state.pool, &id)
        .await
        .map_err(classify_error)?
        .is_none()
    {
        return Err(not_found(format!("upload not found: {}", id)));
    }

    let token = params
        .session
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let session = store::get_or_create_session(&state.pool, &id, &token)
        .await
        .map_err(classify_error)?;
    let messages = store::session_messages(&state.pool, &session.id)
        .await
        .map_err(classify_error)?;

    Ok(Json(ChatHistoryResponse {
        session: token,
        messages,
    }))
}

// ============ POST /api/uploads/{id}/chat ============

#[derive(Deserialize)]
struct ChatTurnRequest {
    #[serde(default)]
    session: Option<String>,
    message: String,
}

#[derive(Serialize)]
struct ChatTurnResponse {
    session: String,
    response: String,
    status: String,
}

async fn handle_chat_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, AppError> {
    let token = request
        .session
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let reply = chat::run_turn(
        &state.pool,
        &state.config,
        state.llm.as_ref(),
        &id,
        &token,
        &request.message,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(ChatTurnResponse {
        session: token,
        response: reply.content,
        status: "success".to_string(),
    }))
}
