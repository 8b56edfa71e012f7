// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use signwatch::config::Config;
use signwatch::models::ProcessSummary;
use signwatch::routes::create_router;
use signwatch::services::video::VideoError;
use signwatch::services::{ProcessError, VideoProcessor};
use signwatch::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "signwatch-test-boundary";

/// What the stub processor does with an upload.
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum StubBehavior {
    /// Copy the input to the output and report three frames.
    Copy,
    /// Sleep, then behave like `Copy`.
    Slow(Duration),
    /// Write a partial output, then fail.
    Fail,
}

/// Processor that avoids ffmpeg and the model.
pub struct StubProcessor {
    pub behavior: StubBehavior,
}

impl VideoProcessor for StubProcessor {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessSummary, ProcessError> {
        match self.behavior {
            StubBehavior::Slow(delay) => {
                std::thread::sleep(delay);
                StubProcessor {
                    behavior: StubBehavior::Copy,
                }
                .process(input, output)
            }
            StubBehavior::Copy => {
                std::fs::copy(input, output)
                    .map_err(|e| VideoError::Writer {
                        path: output.display().to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ProcessSummary {
                    frames_read: 3,
                    frames_written: 3,
                    ..ProcessSummary::default()
                })
            }
            StubBehavior::Fail => {
                std::fs::write(output, b"partial").ok();
                Err(VideoError::Open(input.display().to_string()).into())
            }
        }
    }
}

/// Test app backed by temp directories.
/// Returns the router, the shared state and the directory guard.
#[allow(dead_code)]
pub fn create_test_app(behavior: StubBehavior) -> (axum::Router, Arc<AppState>, TempDir) {
    create_test_app_with(behavior, Config::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(
    behavior: StubBehavior,
    config: Config,
) -> (axum::Router, Arc<AppState>, TempDir) {
    let tmp = tempfile::tempdir().expect("temp dir");
    let config = Config {
        upload_dir: tmp.path().join("uploads"),
        output_dir: tmp.path().join("outputs"),
        ..config
    };
    config.ensure_dirs().expect("create dirs");

    let state = Arc::new(AppState {
        config,
        processor: Arc::new(StubProcessor { behavior }),
    });

    (create_router(state.clone()), state, tmp)
}

/// Build a multipart POST to `/` with one file part.
#[allow(dead_code)]
pub fn multipart_upload(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    multipart_request(body)
}

/// Build a multipart POST to `/` with a single text part and no file.
#[allow(dead_code)]
pub fn multipart_text_only(field: &str, value: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n--{BOUNDARY}--\r\n"
    );
    multipart_request(body.into_bytes())
}

#[allow(dead_code)]
fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Number of entries in a directory.
#[allow(dead_code)]
pub fn dir_len(path: &Path) -> usize {
    std::fs::read_dir(path).map(|d| d.count()).unwrap_or(0)
}
