// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - detection, rendering and video plumbing.

pub mod annotate;
pub mod detector;
pub mod filename;
pub mod processing;
pub mod video;

pub use annotate::Annotator;
pub use detector::{DetectParams, Detector, YoloDetector};
pub use processing::{process_frames, process_video, PipelineProcessor, ProcessError, VideoProcessor};
pub use video::{VideoInfo, VideoTools};
