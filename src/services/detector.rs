// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! YOLOv8 object detection on decoded frames.
//!
//! The model is expected to be an export of a YOLOv8 detector whose single
//! output has shape `[1, 4 + classes, anchors]`: rows 0-3 are box center and
//! size in model-input pixels, the remaining rows are per-class scores.

use crate::models::{BoundingBox, ClassNames, Detection};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::path::Path;

/// Letterbox fill value used by YOLO preprocessing.
const PAD_VALUE: u8 = 114;

/// A source of per-frame detections.
pub trait Detector: Send + Sync {
    /// Detect objects in one RGB frame. Box coordinates are frame pixels.
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>, DetectError>;

    /// Names used when labelling detections.
    fn class_names(&self) -> &ClassNames;

    /// Compute device, for logging.
    fn device(&self) -> &str {
        "cpu"
    }
}

/// Post-processing thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub input_size: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            input_size: 640,
        }
    }
}

impl From<&crate::config::Config> for DetectParams {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
            input_size: config.model_input_size,
        }
    }
}

/// Geometry of a letterbox transform, used to map boxes back to the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Letterbox {
    /// Compute the transform fitting `width x height` into a `size` square.
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: ((size - new_w) / 2) as f32,
            pad_y: ((size - new_h) / 2) as f32,
            frame_width: width,
            frame_height: height,
        }
    }

    fn resized_dims(&self) -> (u32, u32) {
        let size_w = (self.frame_width as f32 * self.scale).round() as u32;
        let size_h = (self.frame_height as f32 * self.scale).round() as u32;
        (size_w.max(1), size_h.max(1))
    }

    /// Map a box from model-input space back into clamped frame space.
    pub fn unmap(&self, bbox: BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: (bbox.x1 - self.pad_x) / self.scale,
            y1: (bbox.y1 - self.pad_y) / self.scale,
            x2: (bbox.x2 - self.pad_x) / self.scale,
            y2: (bbox.y2 - self.pad_y) / self.scale,
        }
        .clamp(self.frame_width, self.frame_height)
    }
}

/// Resize `frame` into a padded `size x size` canvas and lay it out as
/// normalized CHW floats.
pub fn letterbox(frame: &RgbImage, size: u32) -> (Vec<f32>, Letterbox) {
    let lb = Letterbox::new(frame.width(), frame.height(), size);
    let (new_w, new_h) = lb.resized_dims();

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);
    imageops::overlay(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);

    let plane = (size * size) as usize;
    let mut data = vec![0.0_f32; 3 * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = f32::from(pixel[c]) / 255.0;
        }
    }

    (data, lb)
}

/// Turn raw `[4 + classes, anchors]` predictions into frame-space detections.
///
/// `data` is row-major with `rows * anchors` elements.
pub fn decode_predictions(
    data: &[f32],
    rows: usize,
    anchors: usize,
    lb: &Letterbox,
    params: &DetectParams,
) -> Result<Vec<Detection>, DetectError> {
    if rows < 5 || data.len() != rows * anchors {
        return Err(DetectError::OutputShape(vec![1, rows, anchors]));
    }

    let classes = rows - 4;
    let mut candidates = Vec::new();

    for a in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for c in 0..classes {
            let score = data[(4 + c) * anchors + a];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < params.confidence_threshold {
            continue;
        }

        let bbox = BoundingBox::from_center(
            data[a],
            data[anchors + a],
            data[2 * anchors + a],
            data[3 * anchors + a],
        );

        candidates.push(Detection {
            bbox: lb.unmap(bbox),
            score: best_score,
            class_id: best_class,
        });
    }

    Ok(non_max_suppression(
        candidates,
        params.iou_threshold,
        params.max_detections,
    ))
}

/// Greedy per-class non-maximum suppression, highest score first.
pub fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// YOLOv8 detector backed by an rten model.
pub struct YoloDetector {
    model: Model,
    class_names: ClassNames,
    params: DetectParams,
}

impl YoloDetector {
    /// Load the model and optional label file.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        labels_path: Option<&Path>,
        params: DetectParams,
    ) -> Result<Self, DetectError> {
        let model_path = model_path.as_ref();
        let model = Model::load_file(model_path).map_err(|e| DetectError::ModelLoad {
            path: model_path.display().to_string(),
            message: e.to_string(),
        })?;

        let class_names = match labels_path {
            Some(path) => ClassNames::load_from_file(path).map_err(|e| DetectError::Labels {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            None => ClassNames::default(),
        };

        tracing::info!(
            model = %model_path.display(),
            classes = class_names.len(),
            input_size = params.input_size,
            "Model loaded"
        );

        Ok(Self {
            model,
            class_names,
            params,
        })
    }
}

impl Detector for YoloDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<Detection>, DetectError> {
        let size = self.params.input_size as usize;
        let (data, lb) = letterbox(frame, self.params.input_size);
        let input = NdTensor::from_data([1, 3, size, size], data);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|_| DetectError::Inference("model output is not a 3-D f32 tensor".into()))?;

        let [batch, rows, anchors] = output.shape();
        if batch != 1 {
            return Err(DetectError::OutputShape(vec![batch, rows, anchors]));
        }

        decode_predictions(&output.to_vec(), rows, anchors, &lb, &self.params)
    }

    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }
}

/// Errors from model loading and inference.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: String, message: String },

    #[error("Failed to read class labels {path}: {message}")]
    Labels { path: String, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape {0:?} (expected [1, 4 + classes, anchors])")]
    OutputShape(Vec<usize>),
}
