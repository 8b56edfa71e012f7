// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload form and the upload-and-process endpoint.

use crate::error::{AppError, Result};
use crate::models::ProcessSummary;
use crate::services::filename::{
    allowed_file, output_name, secure_upload_name, unique_upload_name,
};
use crate::AppState;
use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Multipart field carrying the video.
const FILE_FIELD: &str = "file";

/// Upload routes. `max_upload_bytes` bounds the request body.
pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/",
        get(index)
            .post(upload)
            .layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}

// ─── Form ────────────────────────────────────────────────────

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let accept = state
        .config
        .allowed_extensions
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Signwatch</title>
<style>body {{ font-family: sans-serif; max-width: 40em; margin: 3em auto; }}</style>
</head>
<body>
<h1>Traffic sign detection</h1>
<p>Upload a video ({allowed}). Processing runs before the response is returned.</p>
<form method="post" action="/" enctype="multipart/form-data">
<input type="file" name="{FILE_FIELD}" accept="{accept}" required>
<button type="submit">Upload and process</button>
</form>
</body>
</html>
"#,
        allowed = state.config.allowed_extensions_display(),
    ))
}

// ─── Upload ──────────────────────────────────────────────────

/// Successful processing response.
#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub original_filename: String,
    pub output_filename: String,
    pub download_url: String,
    pub processed_at: String,
    pub summary: ProcessSummary,
}

/// Accept a video, run detection over it and report where the result is.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return handle_file(&state, field).await;
        }
    }

    Err(AppError::BadRequest(
        "No file part in the request".to_string(),
    ))
}

async fn handle_file(state: &AppState, field: Field<'_>) -> Result<Json<UploadResponse>> {
    let filename = field.file_name().unwrap_or("").to_string();
    if filename.is_empty() {
        return Err(AppError::BadRequest("No selected file".to_string()));
    }

    let allowed = &state.config.allowed_extensions;
    let secured = secure_upload_name(&filename, allowed);
    if secured.is_empty() {
        return Err(AppError::BadRequest(
            "No file selected or file type not allowed.".to_string(),
        ));
    }
    if !allowed_file(&filename, allowed) {
        return Err(AppError::BadRequest(format!(
            "Invalid file type for \"{}\". Allowed types are: {}",
            secured,
            state.config.allowed_extensions_display()
        )));
    }

    let unique = unique_upload_name(&secured);
    let output_filename = output_name(&unique);

    // Dropped on every exit path, including a client disconnect that
    // drops this future mid-request.
    let upload = StagedFile::new(state.config.upload_dir.join(&unique));
    let output = StagedFile::new(state.config.output_dir.join(&output_filename));

    let bytes = save_field(field, upload.path()).await?;
    tracing::info!(
        original = %secured,
        path = %upload.path().display(),
        bytes,
        "File uploaded, starting processing"
    );

    // The staged files move into the blocking task, so cleanup happens
    // when processing ends even if nobody is awaiting the result.
    let processor = state.processor.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = processor.process(upload.path(), output.path());
        if result.is_ok() {
            output.keep();
        }
        result
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|r| r.map_err(|e| e.to_string()));

    match outcome {
        Ok(summary) => Ok(Json(UploadResponse {
            message: format!("Video processing complete for \"{secured}\"."),
            original_filename: secured,
            download_url: format!("/download/{output_filename}"),
            output_filename,
            processed_at: chrono::Utc::now().to_rfc3339(),
            summary,
        })),
        Err(message) => {
            tracing::error!(
                original = %secured,
                error = %message,
                "Error processing file"
            );
            Err(AppError::Processing(message))
        }
    }
}

/// A file that is deleted when dropped unless `keep` was called.
struct StagedFile {
    path: PathBuf,
    keep: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Error deleting file"
            ),
        }
    }
}

/// Stream a multipart field to `path`.
async fn save_field(mut field: Field<'_>, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(anyhow::Error::from)?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(anyhow::Error::from)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(anyhow::Error::from)?;

    Ok(written)
}
