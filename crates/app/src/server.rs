//! HTTP surface: PDF upload and chat over the same index.

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdf_rag_core::{ingest_uploads, ChatCoordinator, FileOutcome, IngestionPipeline, UploadedFile};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Base64 inflates uploads by a third; leave room for a handful of large PDFs.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionPipeline>,
    pub chat: Arc<ChatCoordinator>,
    pub namespace: Arc<str>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<FileOutcome>,
    pub total_chunks: usize,
    /// Human-readable status line per file, then the summary line.
    pub messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Json<UploadResponse> {
    info!(files = request.files.len(), "upload received");
    let report = ingest_uploads(&state.ingestion, &request.files, &state.namespace).await;

    let mut messages = report
        .files
        .iter()
        .map(FileOutcome::status_line)
        .collect::<Vec<_>>();
    messages.push(report.summary_line());

    Json(UploadResponse {
        total_chunks: report.total_chunks,
        files: report.files,
        messages,
    })
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    Json(ChatResponse {
        response: state.chat.reply(&request.message).await,
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(error) => error!(%error, "failed to install Ctrl+C handler"),
    }
}
