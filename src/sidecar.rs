//! File-upload sidecar (EXPANSION §E5) — a small HTTP surface alongside the
//! chat relay for exchanging file attachments out of band, matching
//! `original_source/server/OlafServer.py`'s `handle_file_upload` /
//! `handle_file_download` / `handle_file_list` one for one: `POST
//! /api/upload` saves a multipart upload and returns its URL, `GET
//! /files/{filename}` serves it back, and `GET /files` lists what's there.
//!
//! This never touches the `Registry` or `Router` — it's a stateless sidecar
//! a relay operator runs next to the chat process, not part of the wire
//! protocol core.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Matches `max_file_size` in `OlafServer.py`'s `handle_file_upload`.
pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
struct SidecarState {
    upload_dir: PathBuf,
    public_base_url: String,
}

#[derive(Serialize)]
struct UploadResponse {
    file_url: String,
}

#[derive(Serialize)]
struct FileListResponse {
    files: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

/// Builds the sidecar's router, bounded to `MAX_FILE_SIZE_BYTES` per request
/// body (§E5).
pub fn build_app(upload_dir: PathBuf, public_base_url: String) -> AxumRouter {
    let state = SidecarState { upload_dir, public_base_url };
    AxumRouter::new()
        .route("/api/upload", post(upload_file))
        .route("/files/:filename", get(serve_file))
        .route("/files", get(list_files))
        .layer(RequestBodyLimitLayer::new(MAX_FILE_SIZE_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves the sidecar until the process is stopped. Kept separate
/// from `build_app` so tests can exercise the router without a real socket.
pub async fn serve(addr: SocketAddr, upload_dir: PathBuf, public_base_url: String) -> std::io::Result<()> {
    std::fs::create_dir_all(&upload_dir)?;
    let app = build_app(upload_dir, public_base_url);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "file sidecar listening");
    axum::serve(listener, app).await
}

async fn upload_file(State(state): State<SidecarState>, mut multipart: Multipart) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(field)) if field.name() == Some("file") => field,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "No file field in request"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let file_name = match field.file_name() {
        Some(name) => sanitize_file_name(name),
        None => return error_response(StatusCode::BAD_REQUEST, "No file field in request"),
    };

    let contents = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if contents.len() > MAX_FILE_SIZE_BYTES {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "File size exceeds limit");
    }

    let destination = state.upload_dir.join(&file_name);
    if let Err(e) = tokio::fs::write(&destination, &contents).await {
        error!(error = %e, "file upload failed");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to write file");
    }

    let file_url = format!("{}/files/{file_name}", state.public_base_url);
    Json(UploadResponse { file_url }).into_response()
}

async fn serve_file(State(state): State<SidecarState>, AxumPath(file_name): AxumPath<String>) -> Response {
    let file_name = sanitize_file_name(&file_name);
    let path = state.upload_dir.join(&file_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => bytes.into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_files(State(state): State<SidecarState>) -> Response {
    let mut entries = match tokio::fs::read_dir(&state.upload_dir).await {
        Ok(read_dir) => read_dir,
        Err(_) => return Json(FileListResponse { files: vec![] }).into_response(),
    };

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            files.push(name.to_string());
        }
    }
    files.sort();
    Json(FileListResponse { files }).into_response()
}

/// Strips any path component from a client-supplied filename so an upload
/// or fetch can never escape `upload_dir` (`../../etc/passwd` and friends).
/// The Python original joins the raw filename onto `UPLOAD_DIR` unchecked;
/// this is a hardening fix applied while porting it, not a new feature.
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
