// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outcome of processing one video.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-run counters reported to clients and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    /// Frames decoded from the input
    pub frames_read: u64,
    /// Annotated frames written to the output
    pub frames_written: u64,
    /// Frames dropped because detection failed
    pub frames_skipped: u64,
    /// Detections across all written frames
    pub detections_total: u64,
    /// Detections per class name
    pub detections_by_class: BTreeMap<String, u64>,
    /// Wall-clock processing time
    pub elapsed_ms: u64,
}
