// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drawing detection boxes and labels onto frames.

use crate::models::{ClassNames, Detection};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_SCALE: f32 = 18.0;
/// Gap between a box's top edge and the label baseline.
const LABEL_OFFSET: i32 = 10;

/// Renders detections onto copies of frames.
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

/// Placement of one label, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelLayout {
    /// Filled background: left, top, right, bottom (inclusive)
    pub background: (i32, i32, i32, i32),
    /// Top-left corner of the rendered text
    pub text_origin: (i32, i32),
}

/// Place a `text_w x text_h` label above a box whose top-left is
/// `(x1, y1)`, or just inside the box when there is no room above.
pub fn label_layout(x1: i32, y1: i32, text_w: i32, text_h: i32) -> LabelLayout {
    let baseline = (text_h as f32 / 4.0).round() as i32;
    let text_y = if y1 - LABEL_OFFSET > text_h {
        y1 - LABEL_OFFSET
    } else {
        y1 + text_h + baseline
    };

    LabelLayout {
        background: (x1, text_y - text_h - baseline, x1 + text_w, text_y),
        text_origin: (x1, text_y - text_h - baseline / 2),
    }
}

/// `"{name}: {score:.2}"`
pub fn label_text(names: &ClassNames, detection: &Detection) -> String {
    format!("{}: {:.2}", names.name(detection.class_id), detection.score)
}

impl Annotator {
    /// Annotator that draws boxes only.
    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    /// Annotator that also renders label text with the given font file.
    pub fn with_font_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| AnnotateError::FontRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| AnnotateError::InvalidFont(path.display().to_string()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Return a copy of `frame` with every detection drawn on it.
    pub fn annotate(
        &self,
        frame: &RgbImage,
        detections: &[Detection],
        names: &ClassNames,
    ) -> RgbImage {
        let mut canvas = frame.clone();

        for detection in detections {
            let x1 = detection.bbox.x1 as i32;
            let y1 = detection.bbox.y1 as i32;
            let x2 = detection.bbox.x2 as i32;
            let y2 = detection.bbox.y2 as i32;

            draw_box(&mut canvas, x1, y1, x2, y2);
            draw_box(&mut canvas, x1 + 1, y1 + 1, x2 - 1, y2 - 1);

            if let Some(font) = &self.font {
                let label = label_text(names, detection);
                let (text_w, text_h) = text_size(PxScale::from(LABEL_SCALE), font, &label);
                let layout = label_layout(x1, y1, text_w as i32, text_h as i32);

                let (left, top, right, bottom) = layout.background;
                if let Some(rect) = rect_from_corners(left, top, right, bottom) {
                    draw_filled_rect_mut(&mut canvas, rect, BOX_COLOR);
                }
                draw_text_mut(
                    &mut canvas,
                    TEXT_COLOR,
                    layout.text_origin.0,
                    layout.text_origin.1,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &label,
                );
            }
        }

        canvas
    }
}

fn draw_box(canvas: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
    if let Some(rect) = rect_from_corners(x1, y1, x2, y2) {
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}

/// Inclusive-corner rectangle; `None` when the corners are inverted.
fn rect_from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Rect> {
    if x2 < x1 || y2 < y1 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32))
}

/// Errors loading annotation resources.
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("Failed to read font {path}: {message}")]
    FontRead { path: String, message: String },

    #[error("Not a usable font file: {0}")]
    InvalidFont(String),
}
