// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Download of processed videos.

use crate::error::{AppError, Result};
use crate::services::filename::{secure_filename, split_extension};
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/download/{filename}", get(download_file))
}

/// MIME type for a processed video, by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let (_, ext) = split_extension(filename);
    match ext.to_ascii_lowercase().as_str() {
        ".mp4" => "video/mp4",
        ".avi" => "video/x-msvideo",
        ".mov" => "video/quicktime",
        ".mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Stream a file from the output directory as an attachment.
///
/// Only names that are already in secured form are served, which keeps
/// lookups inside the output directory.
async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    if secure_filename(&filename) != filename {
        tracing::warn!(filename = %filename, "Rejected download of unsafe filename");
        return Err(AppError::BadRequest("Invalid filename.".to_string()));
    }

    let path = state.config.output_dir.join(&filename);
    let not_found = || AppError::NotFound(format!("File not found: {filename}"));

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(not_found()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };

    tracing::info!(filename = %filename, bytes = metadata.len(), "Serving processed file");

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(anyhow::Error::from)?;

    Ok(response)
}
