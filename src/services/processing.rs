// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Frame-by-frame detection pipeline: decode, detect, annotate, encode.

use crate::models::ProcessSummary;
use crate::services::annotate::Annotator;
use crate::services::detector::Detector;
use crate::services::video::{
    FfmpegReader, FfmpegWriter, FrameSink, FrameSource, VideoError, VideoTools,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Log progress every this many frames.
const PROGRESS_INTERVAL: u64 = 100;

/// Turns an input video into an annotated output video.
pub trait VideoProcessor: Send + Sync {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessSummary, ProcessError>;
}

/// Production processor: ffmpeg I/O around a shared detector.
pub struct PipelineProcessor {
    detector: Arc<dyn Detector>,
    annotator: Arc<Annotator>,
    tools: VideoTools,
}

impl PipelineProcessor {
    pub fn new(detector: Arc<dyn Detector>, annotator: Arc<Annotator>, tools: VideoTools) -> Self {
        Self {
            detector,
            annotator,
            tools,
        }
    }
}

impl VideoProcessor for PipelineProcessor {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessSummary, ProcessError> {
        process_video(
            input,
            output,
            self.detector.as_ref(),
            &self.annotator,
            &self.tools,
        )
    }
}

/// Run detection over every frame of `input` and write the annotated
/// result to `output`.
pub fn process_video(
    input: &Path,
    output: &Path,
    detector: &dyn Detector,
    annotator: &Annotator,
    tools: &VideoTools,
) -> Result<ProcessSummary, ProcessError> {
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        device = detector.device(),
        "Starting video processing"
    );

    let mut source = FfmpegReader::open(tools, input).map_err(|e| {
        tracing::error!(path = %input.display(), error = %e, "Error opening video file");
        e
    })?;

    let info = source.info().clone();
    tracing::info!(
        "Video properties: {}x{} @ {:.2} FPS, Total Frames: {}",
        info.width,
        info.height,
        info.fps,
        info.total_frames
    );

    let mut sink = FfmpegWriter::create(tools, output, info.width, info.height, info.fps)
        .map_err(|e| {
            tracing::error!(path = %output.display(), error = %e, "Error initializing video writer");
            e
        })?;

    let summary = process_frames(&mut source, &mut sink, detector, annotator)?;

    tracing::info!(
        output = %output.display(),
        frames = summary.frames_written,
        detections = summary.detections_total,
        elapsed_ms = summary.elapsed_ms,
        "Video processing complete"
    );
    Ok(summary)
}

/// Core loop over abstract frame I/O.
///
/// A frame whose detection fails is logged and dropped from the output.
/// The sink is finished once the source is exhausted.
pub fn process_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    detector: &dyn Detector,
    annotator: &Annotator,
) -> Result<ProcessSummary, ProcessError> {
    let started = Instant::now();
    let total = source.info().total_frames;
    let names = detector.class_names();
    let mut summary = ProcessSummary::default();

    tracing::debug!("Starting frame processing loop");
    while let Some(frame) = source.next_frame()? {
        summary.frames_read += 1;
        let frame_number = summary.frames_read;
        if frame_number % PROGRESS_INTERVAL == 0 {
            tracing::info!("Processing frame {frame_number}/{total}");
        }

        let detections = match detector.detect(&frame) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(frame = frame_number, error = %e, "Model prediction failed, skipping frame");
                summary.frames_skipped += 1;
                continue;
            }
        };

        for detection in &detections {
            *summary
                .detections_by_class
                .entry(names.name(detection.class_id))
                .or_insert(0) += 1;
        }
        summary.detections_total += detections.len() as u64;

        let annotated = annotator.annotate(&frame, &detections, names);
        sink.write_frame(&annotated)?;
        summary.frames_written += 1;
    }

    tracing::debug!(frames = summary.frames_read, "End of video reached");
    sink.finish()?;

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(summary)
}

/// Errors from a processing run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Video(#[from] VideoError),
}
