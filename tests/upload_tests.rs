// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload endpoint tests: validation, processing outcome and cleanup.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use signwatch::config::Config;
use std::time::{Duration, Instant};
use tower::ServiceExt;

mod common;

use common::{dir_len, multipart_text_only, multipart_upload, StubBehavior};

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

#[tokio::test]
async fn test_upload_form_is_served() {
    let (app, _state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains(r#"enctype="multipart/form-data""#));
    assert!(html.contains(r#"name="file""#));
    assert!(html.contains(".avi,.mkv,.mov,.mp4"));
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let (app, _state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(multipart_text_only("comment", "hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"], "No file part in the request");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let (app, _state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(multipart_upload("file", "", b""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"], "No selected file");
}

#[tokio::test]
async fn test_upload_with_disallowed_extension() {
    let (app, _state, tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(multipart_upload("file", "my photo.gif", b"GIF89a"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["details"],
        "Invalid file type for \"my_photo.gif\". Allowed types are: avi, mkv, mov, mp4"
    );
    assert_eq!(dir_len(&tmp.path().join("uploads")), 0);
}

#[tokio::test]
async fn test_upload_with_unusable_filename() {
    let (app, _state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(multipart_upload("file", "???", b"data"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"], "No file selected or file type not allowed.");
}

#[tokio::test]
async fn test_upload_success_then_download() {
    let (app, state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .clone()
        .oneshot(multipart_upload("file", "Road Trip.MP4", b"fake video bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let output = body["output_filename"].as_str().unwrap().to_string();
    assert!(output.starts_with("processed_"));
    assert!(output.ends_with("_Road_Trip.MP4"));
    assert_eq!(body["original_filename"], "Road_Trip.MP4");
    assert_eq!(
        body["message"],
        "Video processing complete for \"Road_Trip.MP4\"."
    );
    assert_eq!(body["download_url"], format!("/download/{output}"));
    assert_eq!(body["summary"]["frames_written"], 3);
    assert!(body["processed_at"].as_str().is_some());

    // Upload is removed once processing succeeds.
    assert_eq!(dir_len(&state.config.upload_dir), 0);
    assert!(state.config.output_dir.join(&output).is_file());

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/download/{output}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        &format!("attachment; filename=\"{output}\"")
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake video bytes");
}

#[tokio::test]
async fn test_processing_failure_cleans_up() {
    let (app, state, _tmp) = common::create_test_app(StubBehavior::Fail);

    let response = app
        .oneshot(multipart_upload("file", "clip.mp4", b"not really a video"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "processing_failed");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .starts_with("An error occurred during processing: Cannot open video file"));

    assert_eq!(dir_len(&state.config.upload_dir), 0);
    assert_eq!(dir_len(&state.config.output_dir), 0);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let config = Config {
        max_upload_bytes: 1024,
        ..Config::default()
    };
    let (app, state, _tmp) = common::create_test_app_with(StubBehavior::Copy, config);

    let response = app
        .oneshot(multipart_upload("file", "big.mp4", &vec![0u8; 64 * 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(dir_len(&state.config.upload_dir), 0);
    assert_eq!(dir_len(&state.config.output_dir), 0);
}

#[tokio::test]
async fn test_client_disconnect_still_removes_upload() {
    let (app, state, _tmp) =
        common::create_test_app(StubBehavior::Slow(Duration::from_millis(300)));

    // The client gives up while processing is still running.
    let result = tokio::time::timeout(
        Duration::from_millis(100),
        app.oneshot(multipart_upload("file", "clip.mp4", b"fake video bytes")),
    )
    .await;
    assert!(result.is_err());

    let deadline = Instant::now() + Duration::from_secs(5);
    while dir_len(&state.config.upload_dir) > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(dir_len(&state.config.upload_dir), 0);
}

#[tokio::test]
async fn test_name_stripped_to_extension_keeps_extension() {
    let (app, state, _tmp) = common::create_test_app(StubBehavior::Copy);

    let response = app
        .oneshot(multipart_upload("file", "@@.mp4", b"fake video bytes"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["original_filename"], "mp4.mp4");
    let output = body["output_filename"].as_str().unwrap();
    assert!(output.ends_with("_mp4.mp4"));
    assert!(state.config.output_dir.join(output).is_file());
}
