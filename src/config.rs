// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

/// Video extensions accepted when nothing else is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum accepted request body for uploads, in bytes
    pub max_upload_bytes: usize,
    /// Verbose logging and human-readable log output
    pub debug: bool,

    // --- Storage ---
    /// Staging directory for uploaded videos
    pub upload_dir: PathBuf,
    /// Directory holding processed videos available for download
    pub output_dir: PathBuf,
    /// Lowercase extensions accepted for upload
    pub allowed_extensions: BTreeSet<String>,

    // --- Model ---
    /// YOLOv8 detector converted to `.rten`
    pub model_path: PathBuf,
    /// Optional class-name file, one name per line
    pub model_labels_path: Option<PathBuf>,
    /// Optional font used to render detection labels
    pub label_font_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Side of the square model input
    pub model_input_size: u32,

    // --- External tools ---
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 16 * 1024 * 1024,
            debug: false,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            allowed_extensions: default_extensions(),
            model_path: PathBuf::from("ml_model/best.rten"),
            model_labels_path: None,
            label_font_path: None,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            model_input_size: 640,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let confidence_threshold = parse_var("CONFIDENCE_THRESHOLD", 0.25_f32)?;
        let iou_threshold = parse_var("IOU_THRESHOLD", 0.7_f32)?;
        check_unit_interval("CONFIDENCE_THRESHOLD", confidence_threshold)?;
        check_unit_interval("IOU_THRESHOLD", iou_threshold)?;

        let model_input_size = parse_var("MODEL_INPUT_SIZE", 640_u32)?;
        if model_input_size == 0 {
            return Err(ConfigError::Invalid("MODEL_INPUT_SIZE", "0".to_string()));
        }

        let allowed_extensions = match env::var("ALLOWED_EXTENSIONS") {
            Ok(raw) => parse_extensions(&raw),
            Err(_) => default_extensions(),
        };
        if allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "ALLOWED_EXTENSIONS",
                env::var("ALLOWED_EXTENSIONS").unwrap_or_default(),
            ));
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 512 * 1024 * 1024_usize)?,
            debug: env::var("DEBUG")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            upload_dir: path_var("UPLOAD_DIR", "uploads"),
            output_dir: path_var("OUTPUT_DIR", "outputs"),
            allowed_extensions,
            model_path: path_var("MODEL_PATH", "ml_model/best.rten"),
            model_labels_path: env::var("MODEL_LABELS_PATH").ok().map(PathBuf::from),
            label_font_path: env::var("LABEL_FONT_PATH").ok().map(PathBuf::from),
            confidence_threshold,
            iou_threshold,
            max_detections: parse_var("MAX_DETECTIONS", 300_usize)?,
            model_input_size,
            ffmpeg_path: path_var("FFMPEG_PATH", "ffmpeg"),
            ffprobe_path: path_var("FFPROBE_PATH", "ffprobe"),
        })
    }

    /// Create the upload and output directories if they are missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Allowed extensions as a comma-separated list, for user-facing messages.
    pub fn allowed_extensions_display(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn default_extensions() -> BTreeSet<String> {
    DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Parse a comma-separated extension list. Leading dots and case are ignored.
pub fn parse_extensions(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

fn check_unit_interval(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(name, value.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "PORT",
        "MAX_DETECTIONS",
        "CONFIDENCE_THRESHOLD",
        "IOU_THRESHOLD",
        "MODEL_INPUT_SIZE",
        "ALLOWED_EXTENSIONS",
    ];

    /// Load config with exactly `vars` set among the variables above.
    fn load_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        for name in VARS {
            env::remove_var(name);
        }
        for (name, value) in vars {
            env::set_var(name, value);
        }
        let result = Config::from_env();
        for (name, _) in vars {
            env::remove_var(name);
        }
        result
    }

    // One test, so the cases never race on the process environment.
    #[test]
    fn test_from_env() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_detections, 300);
        assert_eq!(config.model_input_size, 640);
        assert_eq!(config.allowed_extensions_display(), "avi, mkv, mov, mp4");

        let config = load_with(&[
            ("PORT", "8080"),
            ("MAX_DETECTIONS", "50"),
            ("CONFIDENCE_THRESHOLD", "0.5"),
            ("ALLOWED_EXTENSIONS", "MP4,.webm"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_detections, 50);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.allowed_extensions_display(), "mp4, webm");

        let config = load_with(&[("PORT", "http")]).unwrap();
        assert_eq!(config.port, 5000);

        assert!(matches!(
            load_with(&[("MAX_DETECTIONS", "lots")]),
            Err(ConfigError::Invalid("MAX_DETECTIONS", _))
        ));
        assert!(matches!(
            load_with(&[("CONFIDENCE_THRESHOLD", "1.5")]),
            Err(ConfigError::Invalid("CONFIDENCE_THRESHOLD", _))
        ));
        assert!(matches!(
            load_with(&[("IOU_THRESHOLD", "-0.1")]),
            Err(ConfigError::Invalid("IOU_THRESHOLD", _))
        ));
        assert!(matches!(
            load_with(&[("MODEL_INPUT_SIZE", "0")]),
            Err(ConfigError::Invalid("MODEL_INPUT_SIZE", _))
        ));
        assert!(matches!(
            load_with(&[("ALLOWED_EXTENSIONS", " , ,")]),
            Err(ConfigError::Invalid("ALLOWED_EXTENSIONS", _))
        ));
        assert!(matches!(
            load_with(&[("ALLOWED_EXTENSIONS", "")]),
            Err(ConfigError::Invalid("ALLOWED_EXTENSIONS", _))
        ));
    }

    #[test]
    fn test_parse_extensions() {
        let exts = parse_extensions(" MP4, .avi,,mov ");
        assert_eq!(
            exts.into_iter().collect::<Vec<_>>(),
            vec!["avi".to_string(), "mov".to_string(), "mp4".to_string()]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_unit_interval() {
        assert!(check_unit_interval("X", 0.0).is_ok());
        assert!(check_unit_interval("X", 1.0).is_ok());
        assert!(check_unit_interval("X", 1.5).is_err());
        assert!(check_unit_interval("X", -0.1).is_err());
    }

    #[test]
    fn test_default_extensions_display() {
        let config = Config::default();
        assert_eq!(config.allowed_extensions_display(), "avi, mkv, mov, mp4");
    }

    #[test]
    fn test_ensure_dirs_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            upload_dir: tmp.path().join("a/uploads"),
            output_dir: tmp.path().join("b/outputs"),
            ..Config::default()
        };
        config.ensure_dirs().unwrap();
        assert!(config.upload_dir.is_dir());
        assert!(config.output_dir.is_dir());
    }
}
