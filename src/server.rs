//! HTTP facade over the store, lifecycle, and search.
//!
//! Thin adapters only: each handler validates its body, calls into the
//! store or the lifecycle manager, triggers a best-effort persistence
//! write on mutations, and maps crate errors onto HTTP statuses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/libraries` | Create a library (inline documents allowed) |
//! | `GET` | `/api/libraries` | List libraries |
//! | `GET` | `/api/libraries/{id}` | Fetch one library |
//! | `PATCH` | `/api/libraries/{id}` | Rename / replace metadata |
//! | `DELETE` | `/api/libraries/{id}` | Cascade delete |
//! | `POST` | `/api/libraries/{id}/index` | Start an index build (202) |
//! | `GET` | `/api/libraries/{id}/index/status` | Index status record |
//! | `POST` | `/api/libraries/{id}/search` | k-NN search over the library |
//! | `POST` | `/api/documents` | Create a document (inline chunks allowed) |
//! | `GET` | `/api/documents` | List documents |
//! | `GET` | `/api/documents/{id}` | Fetch one document |
//! | `GET` | `/api/documents/library/{library_id}` | Documents of a library |
//! | `PATCH` | `/api/documents/{id}` | Rename / replace metadata |
//! | `DELETE` | `/api/documents/{id}` | Cascade delete |
//! | `POST` | `/api/chunks` | Create a chunk |
//! | `POST` | `/api/chunks/batch` | Create many chunks |
//! | `GET` | `/api/chunks` | List chunks |
//! | `GET` | `/api/chunks/{id}` | Fetch one chunk |
//! | `GET` | `/api/chunks/document/{document_id}` | Chunks of a document |
//! | `PATCH` | `/api/chunks/{id}` | Patch text / metadata / embedding |
//! | `DELETE` | `/api/chunks/{id}` | Delete |
//! | `GET` | `/health` | Liveness check |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "NotIndexed", "message": "library is not indexed ..." }
//! ```
//!
//! `400` validation and vector errors, `404` missing entities, `409`
//! lifecycle conflicts, `502` embedding-provider failures, `500`
//! everything else. The `X-API-Version` header is advisory: absent is
//! fine, any value other than `1.0` is rejected.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::app::AppContext;
use crate::error::Error;
use crate::index::IndexerKind;
use crate::lifecycle::IndexStatus;
use crate::models::{
    Chunk, ChunkCreate, ChunkPatch, DocumentCreate, DocumentPatch, DocumentView, LibraryCreate,
    LibraryPatch, LibraryView, SearchResult,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: Arc<AppContext>,
}

/// Build the full router for the given context.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let state = AppState { ctx };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/libraries", post(create_library).get(list_libraries))
        .route(
            "/libraries/{id}",
            get(get_library).patch(update_library).delete(delete_library),
        )
        .route("/libraries/{id}/index", post(index_library))
        .route("/libraries/{id}/index/status", get(index_status))
        .route("/libraries/{id}/search", post(search_library))
        .route("/documents", post(create_document).get(list_documents))
        .route(
            "/documents/{id}",
            get(get_document).patch(update_document).delete(delete_document),
        )
        .route("/documents/library/{library_id}", get(documents_by_library))
        .route("/chunks", post(create_chunk).get(list_chunks))
        .route("/chunks/batch", post(create_chunk_batch))
        .route(
            "/chunks/{id}",
            get(get_chunk).patch(update_chunk).delete(delete_chunk),
        )
        .route("/chunks/document/{document_id}", get(chunks_by_document))
        .layer(middleware::from_fn(check_api_version));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn run_server(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let bind = ctx.config.bind.clone();
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "corpusdb listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error body: machine-readable kind plus a human message.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Wrapper turning crate errors into HTTP responses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) | Error::DimMismatch { .. } | Error::BadVector => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotIndexed(_)
            | Error::AlreadyIndexing(_)
            | Error::Superseded
            | Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::EmbeddingUnavailable(_)
            | Error::EmbeddingAuth(_)
            | Error::EmbeddingProtocol(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Reject requests carrying an unsupported `X-API-Version`. Absent means
/// current.
async fn check_api_version(req: Request, next: Next) -> Response {
    if let Some(value) = req.headers().get("x-api-version") {
        if value.to_str().ok() != Some("1.0") {
            return ApiError(Error::Validation(format!(
                "API version {} not supported; current version is 1.0",
                value.to_str().unwrap_or("<invalid>")
            )))
            .into_response();
        }
    }
    next.run(req).await
}

// ============ Libraries ============

async fn create_library(
    State(state): State<AppState>,
    Json(req): Json<LibraryCreate>,
) -> Result<(StatusCode, Json<LibraryView>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("library name must not be empty".into()).into());
    }
    let view = state.ctx.store.create_library(req)?;
    state.ctx.persist_library(view.id).await;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_libraries(State(state): State<AppState>) -> Json<Vec<LibraryView>> {
    Json(state.ctx.store.list_libraries())
}

async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LibraryView>, ApiError> {
    Ok(Json(state.ctx.store.get_library(id)?))
}

async fn update_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<LibraryPatch>,
) -> Result<Json<LibraryView>, ApiError> {
    let view = state.ctx.store.update_library(id, patch)?;
    state.ctx.persist_library(id).await;
    Ok(Json(view))
}

async fn delete_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.ctx.store.delete_library(id)?;
    state.ctx.drop_library_file(id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Indexing & search ============

/// Body for `POST /api/libraries/{id}/index`.
#[derive(Deserialize)]
struct IndexRequest {
    indexer_type: String,
    #[serde(default)]
    leaf_size: Option<usize>,
}

async fn index_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IndexRequest>,
) -> Result<(StatusCode, Json<IndexStatus>), ApiError> {
    let kind = IndexerKind::parse(&req.indexer_type)?;
    if req.leaf_size == Some(0) {
        return Err(Error::Validation("leaf_size must be > 0".into()).into());
    }
    let status = state.ctx.lifecycle.start_index(id, kind, req.leaf_size)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn index_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.ctx.lifecycle.status(id)?))
}

/// Body for `POST /api/libraries/{id}/search`.
#[derive(Deserialize)]
struct SearchRequest {
    query_text: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn search_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if req.query_text.trim().is_empty() {
        return Err(Error::Validation("query_text must not be empty".into()).into());
    }
    if req.top_k == 0 {
        return Err(Error::Validation("top_k must be >= 1".into()).into());
    }
    let results = state
        .ctx
        .lifecycle
        .search(id, &req.query_text, req.top_k)
        .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ Documents ============

async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<DocumentCreate>,
) -> Result<(StatusCode, Json<DocumentView>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("document name must not be empty".into()).into());
    }
    let view = state.ctx.store.create_document(req)?;
    state.ctx.persist_library(view.library_id).await;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentView>> {
    Json(state.ctx.store.list_documents())
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentView>, ApiError> {
    Ok(Json(state.ctx.store.get_document(id)?))
}

async fn documents_by_library(
    State(state): State<AppState>,
    Path(library_id): Path<Uuid>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    Ok(Json(state.ctx.store.documents_by_library(library_id)?))
}

async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<DocumentView>, ApiError> {
    let (view, library_id) = state.ctx.store.update_document(id, patch)?;
    state.ctx.persist_library(library_id).await;
    Ok(Json(view))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let library_id = state.ctx.store.delete_document(id)?;
    state.ctx.persist_library(library_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ============ Chunks ============

async fn create_chunk(
    State(state): State<AppState>,
    Json(req): Json<ChunkCreate>,
) -> Result<(StatusCode, Json<Chunk>), ApiError> {
    let (chunk, library_id) = state.ctx.store.create_chunk(req)?;
    state.ctx.persist_library(library_id).await;
    Ok((StatusCode::CREATED, Json(chunk)))
}

async fn create_chunk_batch(
    State(state): State<AppState>,
    Json(reqs): Json<Vec<ChunkCreate>>,
) -> Result<(StatusCode, Json<Vec<Chunk>>), ApiError> {
    let (chunks, affected) = state.ctx.store.create_chunks(reqs)?;
    for library_id in affected {
        state.ctx.persist_library(library_id).await;
    }
    Ok((StatusCode::CREATED, Json(chunks)))
}

async fn list_chunks(State(state): State<AppState>) -> Json<Vec<Chunk>> {
    Json(state.ctx.store.list_chunks())
}

async fn get_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Chunk>, ApiError> {
    Ok(Json(state.ctx.store.get_chunk(id)?))
}

async fn chunks_by_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<Chunk>>, ApiError> {
    Ok(Json(state.ctx.store.chunks_by_document(document_id)?))
}

async fn update_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ChunkPatch>,
) -> Result<Json<Chunk>, ApiError> {
    let (chunk, library_id) = state.ctx.store.update_chunk(id, patch)?;
    state.ctx.persist_library(library_id).await;
    Ok(Json(chunk))
}

async fn delete_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let library_id = state.ctx.store.delete_chunk(id)?;
    state.ctx.persist_library(library_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
