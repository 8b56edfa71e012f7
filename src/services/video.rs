// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Video decoding and encoding through `ffprobe`/`ffmpeg` subprocesses.
//!
//! Frames cross the process boundary as raw `rgb24`, so every frame is
//! exactly `width * height * 3` bytes.

use image::RgbImage;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

/// Frame rate used when the container does not report one.
const FALLBACK_FPS: f64 = 30.0;

/// Paths to the ffmpeg tool binaries.
#[derive(Debug, Clone)]
pub struct VideoTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for VideoTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl From<&crate::config::Config> for VideoTools {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }
}

/// Properties of the first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count; 0 when unknown
    pub total_frames: u64,
}

impl VideoInfo {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Sequential frame reader.
pub trait FrameSource {
    fn info(&self) -> &VideoInfo;

    /// Next decoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;
}

/// Sequential frame writer.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError>;

    /// Flush and close the output. Must be called once after the last frame.
    fn finish(&mut self) -> Result<(), VideoError>;
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse ffprobe's `-of json` stream report.
pub fn parse_probe_output(json: &str) -> Option<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_str(json).ok()?;
    let stream = probe.streams.into_iter().next()?;

    let width = stream.width.filter(|w| *w > 0)?;
    let height = stream.height.filter(|h| *h > 0)?;
    let fps = stream
        .r_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .unwrap_or(0.0);
    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    Some(VideoInfo {
        width,
        height,
        fps,
        total_frames,
    })
}

/// Parse `num/den` or a plain number. Anything unparsable, or a zero
/// denominator, yields 0.
pub fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => raw.trim().parse().unwrap_or(0.0),
    }
}

/// Query stream properties of `path`.
pub fn probe(tools: &VideoTools, path: &Path) -> Result<VideoInfo, VideoError> {
    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::Tool {
            tool: tools.ffprobe.display().to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        tracing::warn!(
            path = %path.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "ffprobe failed"
        );
        return Err(VideoError::Open(path.display().to_string()));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| VideoError::Open(path.display().to_string()))
}

/// Longest stderr tail kept from an ffmpeg child.
const STDERR_TAIL: usize = 8 * 1024;

/// Collect a child's stderr on its own thread so the pipe never fills.
/// Only the last `STDERR_TAIL` bytes are kept.
fn drain_stderr(stderr: Option<ChildStderr>) -> Option<JoinHandle<String>> {
    let mut stderr = stderr?;
    Some(std::thread::spawn(move || {
        let mut tail = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&tail).trim().to_string()
    }))
}

fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Message for a failed child: its stderr, or the exit status if it said nothing.
fn failure_message(status: ExitStatus, stderr: String) -> String {
    if stderr.is_empty() {
        format!("ffmpeg exited with {status}")
    } else {
        stderr
    }
}

/// Decoder arguments for `path`. Rotation metadata is ignored so frames
/// arrive in the coded orientation that `probe` reports.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        ["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// Decodes a video file into RGB frames.
pub struct FfmpegReader {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    exited: bool,
    buf: Vec<u8>,
}

impl FfmpegReader {
    pub fn open(tools: &VideoTools, path: &Path) -> Result<Self, VideoError> {
        let info = probe(tools, path)?;

        let mut child = Command::new(&tools.ffmpeg)
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::Tool {
                tool: tools.ffmpeg.display().to_string(),
                message: e.to_string(),
            })?;

        let stderr = drain_stderr(child.stderr.take());
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::Open(path.display().to_string()));
        };

        let buf = vec![0; info.frame_len()];
        Ok(Self {
            info,
            child,
            stdout,
            stderr,
            exited: false,
            buf,
        })
    }

    /// Reap the decoder once its output is exhausted. A nonzero exit
    /// means the stream ended on an error, not at its real end.
    fn reap(&mut self) -> Result<(), VideoError> {
        if self.exited {
            return Ok(());
        }
        self.exited = true;

        let status = self
            .child
            .wait()
            .map_err(|e| VideoError::Decode(e.to_string()))?;
        let stderr = join_stderr(self.stderr.take());
        if status.success() {
            Ok(())
        } else {
            Err(VideoError::Decode(failure_message(status, stderr)))
        }
    }
}

impl FrameSource for FfmpegReader {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.stdout.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(VideoError::Decode(e.to_string())),
            }
        }

        if filled < self.buf.len() {
            self.reap()?;
            if filled > 0 {
                tracing::warn!(
                    bytes = filled,
                    expected = self.buf.len(),
                    "Truncated final frame, ending stream"
                );
            }
            return Ok(None);
        }

        Ok(RgbImage::from_raw(
            self.info.width,
            self.info.height,
            self.buf.clone(),
        ))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if !self.exited {
            // The decoder may still be blocked writing if we stopped early.
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        join_stderr(self.stderr.take());
    }
}

/// Encodes RGB frames into an `mp4v` video file.
pub struct FfmpegWriter {
    width: u32,
    height: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegWriter {
    pub fn create(
        tools: &VideoTools,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Self, VideoError> {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            tracing::warn!(fps, fallback = FALLBACK_FPS, "Invalid frame rate, using fallback");
            FALLBACK_FPS
        };

        let mut child = Command::new(&tools.ffmpeg)
            .args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s"])
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(format!("{fps}"))
            .args(["-i", "-", "-c:v", "mpeg4", "-tag:v", "mp4v", "-q:v", "5"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::Writer {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let stderr = drain_stderr(child.stderr.take());
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            let _ = child.wait();
            join_stderr(stderr);
            return Err(VideoError::Writer {
                path: path.display().to_string(),
                message: "encoder stdin unavailable".to_string(),
            });
        }

        Ok(Self {
            width,
            height,
            child: Some(child),
            stdin,
            stderr,
        })
    }
}

impl FrameSink for FfmpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(VideoError::FrameSize {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VideoError::Encoder("writer already finished".to_string()))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| VideoError::Encoder(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        // Closing stdin signals end of input to the encoder.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| VideoError::Encoder(e.to_string()))?;
        let stderr = join_stderr(self.stderr.take());

        if status.success() {
            Ok(())
        } else {
            Err(VideoError::Encoder(failure_message(status, stderr)))
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        join_stderr(self.stderr.take());
    }
}

/// Errors from video I/O.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Cannot open video file: {0}")]
    Open(String),

    #[error("Cannot initialize video writer for {path}: {message}")]
    Writer { path: String, message: String },

    #[error("Failed to run {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Video encoder failed: {0}")]
    Encoder(String),

    #[error("Frame size {actual:?} does not match output size {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
