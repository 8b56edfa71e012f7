// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Signwatch: traffic-sign detection for uploaded videos
//!
//! This crate provides an HTTP service that runs a YOLOv8 detector over
//! every frame of an uploaded video and returns an annotated copy.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::VideoProcessor;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub processor: Arc<dyn VideoProcessor>,
}
