// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run the detection pipeline on a local video without the HTTP server.

use anyhow::Context;
use clap::Parser;
use signwatch::services::{process_video, Annotator, DetectParams, VideoTools, YoloDetector};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "signwatch-process")]
#[command(about = "Annotate traffic signs in a video file")]
struct Cli {
    /// Path to input video file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Where to write the annotated video
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// YOLOv8 model in .rten format
    #[arg(long, default_value = "ml_model/best.rten")]
    model: PathBuf,

    /// Class names, one per line
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Font used to render labels (boxes only when omitted)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Minimum class confidence
    #[arg(long, default_value_t = 0.25)]
    conf: f32,

    /// NMS IoU threshold
    #[arg(long, default_value_t = 0.7)]
    iou: f32,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.input.exists() {
        anyhow::bail!("Input video not found at {}", args.input.display());
    }

    let params = DetectParams {
        confidence_threshold: args.conf,
        iou_threshold: args.iou,
        ..DetectParams::default()
    };
    let detector = YoloDetector::load(&args.model, args.labels.as_deref(), params)
        .context("Failed to load detection model")?;

    let annotator = match &args.font {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::boxes_only(),
    };

    let tools = VideoTools {
        ffmpeg: args.ffmpeg,
        ffprobe: args.ffprobe,
    };

    let summary = process_video(&args.input, &args.output, &detector, &annotator, &tools)
        .context("Processing failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
