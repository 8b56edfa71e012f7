// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signwatch API Server
//!
//! Accepts video uploads, runs traffic-sign detection on every frame and
//! serves the annotated result for download.

use anyhow::Context;
use signwatch::{
    config::Config,
    services::{Annotator, DetectParams, PipelineProcessor, VideoTools, YoloDetector},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;

    init_logging(config.debug);
    tracing::info!(port = config.port, debug = config.debug, "Starting Signwatch");

    config
        .ensure_dirs()
        .context("Failed to create upload/output directories")?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        output_dir = %config.output_dir.display(),
        "Storage directories ready"
    );

    // Load the detector once; it is shared by all requests.
    let detector = YoloDetector::load(
        &config.model_path,
        config.model_labels_path.as_deref(),
        DetectParams::from(&config),
    )
    .context("Failed to load detection model")?;

    let annotator = match &config.label_font_path {
        Some(path) => Annotator::with_font_file(path).context("Failed to load label font")?,
        None => {
            tracing::warn!("LABEL_FONT_PATH not set, labels will not be drawn");
            Annotator::boxes_only()
        }
    };

    let processor = PipelineProcessor::new(
        Arc::new(detector),
        Arc::new(annotator),
        VideoTools::from(&config),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        processor: Arc::new(processor),
    });

    // Build router
    let app = signwatch::routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize logging: JSON by default, human-readable in debug mode.
fn init_logging(debug: bool) {
    let crate_level = if debug { "signwatch=debug" } else { "signwatch=info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(crate_level.parse().expect("static directive"))
        .add_directive("info".parse().expect("static directive"));

    if debug {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}
