// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use signwatch::error::AppError;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_client_errors_carry_details() {
    let (status, body) = render(AppError::BadRequest("No selected file".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"], "No selected file");

    let (status, body) = render(AppError::PayloadTooLarge).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_internal_errors_hide_details() {
    let (status, body) = render(AppError::Internal(anyhow::anyhow!("disk on fire"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_processing_error_message() {
    let (status, body) = render(AppError::Processing("Cannot open video file: x.mp4".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["details"],
        "An error occurred during processing: Cannot open video file: x.mp4"
    );
}
