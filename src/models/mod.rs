// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod detection;
pub mod summary;

pub use detection::{BoundingBox, ClassNames, Detection};
pub use summary::ProcessSummary;
