//! HTTP API over [`RagService`].
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Health check |
//! | `POST` | `/ingest` | Ingest one PDF by path, skipping known content |
//! | `POST` | `/query` | Answer a question with cited sources |
//!
//! Errors are returned as `{"detail": "..."}` with status 404 (missing
//! file), 422 (malformed body or empty query) or 500 (everything else).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_rag_core::{
    AnswerGenerator, PdfExtractor, RagError, RagService, SourceRef, VectorIndex,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub fn router<I, G, X>(service: Arc<RagService<I, G, X>>) -> Router
where
    I: VectorIndex + 'static,
    G: AnswerGenerator + 'static,
    X: PdfExtractor + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/ingest", post(handle_ingest::<I, G, X>))
        .route("/query", post(handle_query::<I, G, X>))
        .layer(cors)
        .with_state(service)
}

pub async fn serve<I, G, X>(service: Arc<RagService<I, G, X>>, bind: &str) -> anyhow::Result<()>
where
    I: VectorIndex + 'static,
    G: AnswerGenerator + 'static,
    X: PdfExtractor + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind = %bind, "rag api listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn invalid(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// ============ GET / ============

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "okay".to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub source_doc: String,
    pub chunks: usize,
    pub message: String,
}

async fn handle_ingest<I, G, X>(
    State(service): State<Arc<RagService<I, G, X>>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError>
where
    I: VectorIndex + 'static,
    G: AnswerGenerator + 'static,
    X: PdfExtractor + Send + Sync + 'static,
{
    let Json(request) = payload.map_err(AppError::invalid)?;

    let outcome = service.ingest(&request.file_path).await.map_err(|error| {
        error!(file_path = %request.file_path, %error, "ingest failed");
        match error {
            error if error.is_not_found() => AppError::new(StatusCode::NOT_FOUND, "File Not Found"),
            RagError::Validation(message) => AppError::new(StatusCode::UNPROCESSABLE_ENTITY, message),
            error => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing document: {error}"),
            ),
        }
    })?;

    Ok(Json(IngestResponse {
        source_doc: outcome.source_doc,
        chunks: outcome.chunks,
        message: outcome.message,
    }))
}

// ============ POST /query ============

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub rerank: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub reference: Vec<SourceRef>,
    pub rerank: bool,
}

async fn handle_query<I, G, X>(
    State(service): State<Arc<RagService<I, G, X>>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError>
where
    I: VectorIndex + 'static,
    G: AnswerGenerator + 'static,
    X: PdfExtractor + Send + Sync + 'static,
{
    let Json(request) = payload.map_err(AppError::invalid)?;

    let answer = service
        .answer(&request.query, request.rerank)
        .await
        .map_err(|error| {
            error!(%error, rerank = request.rerank, "query failed");
            match error {
                RagError::Validation(message) => {
                    AppError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
                }
                error => AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error generating answer: {error}"),
                ),
            }
        })?;

    Ok(Json(QueryResponse {
        answer: answer.answer,
        reference: answer.reference,
        rerank: answer.rerank,
    }))
}
