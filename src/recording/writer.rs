//! Video writers.
//!
//! Frames are piped as raw BGR24 into an `ffmpeg` child process which
//! encodes them into an MPEG-4 file.

use chrono::{DateTime, Local};
use log::{debug, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use thiserror::Error;

use crate::capture::{Frame, FrameSize};

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to start encoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write frame to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder for {path} exited with {status}")]
    EncoderFailed { path: PathBuf, status: String },

    #[error("writer for {0} is already finished")]
    Finished(PathBuf),
}

/// Appends frames of a fixed size to one output file.
pub trait FrameWriter {
    fn path(&self) -> &Path;

    /// Dimensions fixed at creation.
    fn size(&self) -> FrameSize;

    fn append(&mut self, frame: &Frame) -> Result<(), WriterError>;

    /// Flushes and closes the file. Safe to call more than once.
    fn finish(&mut self) -> Result<(), WriterError>;
}

/// Creates writers for newly bound recorder slots.
pub trait WriterFactory {
    fn create(
        &mut self,
        path: &Path,
        size: FrameSize,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>, WriterError>;
}

/// `<prefix>capture_<slot>_<YYYYMMDD_HHMMSS>.mp4`
pub fn output_path(prefix: &str, slot: usize, started: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "{}capture_{}_{}.mp4",
        prefix,
        slot,
        started.format("%Y%m%d_%H%M%S")
    ))
}

pub struct FfmpegFactory {
    program: PathBuf,
}

impl FfmpegFactory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl WriterFactory for FfmpegFactory {
    fn create(
        &mut self,
        path: &Path,
        size: FrameSize,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>, WriterError> {
        let writer = FfmpegWriter::spawn(&self.program, path, size, fps)?;
        Ok(Box::new(writer))
    }
}

pub struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    size: FrameSize,
}

impl FfmpegWriter {
    pub fn spawn(
        program: &Path,
        path: &Path,
        size: FrameSize,
        fps: u32,
    ) -> Result<Self, WriterError> {
        let args = encoder_args(path, size, fps);
        debug!("{} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| WriterError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take();

        Ok(Self {
            child,
            stdin,
            path: path.to_path_buf(),
            size,
        })
    }
}

/// Raw BGR24 frames on stdin, `mpeg4` in an MP4 container on disk.
fn encoder_args(path: &Path, size: FrameSize, fps: u32) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "bgr24".to_string(),
        "-s".to_string(),
        size.to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
        // yuv420p needs even dimensions
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        "-c:v".to_string(),
        "mpeg4".to_string(),
        "-q:v".to_string(),
        "3".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        path.display().to_string(),
    ]
}

impl FrameWriter for FfmpegWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> FrameSize {
        self.size
    }

    fn append(&mut self, frame: &Frame) -> Result<(), WriterError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| WriterError::Finished(self.path.clone()))?;

        stdin
            .write_all(&frame.data)
            .map_err(|source| WriterError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(&mut self) -> Result<(), WriterError> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        // Closing stdin is the end-of-stream signal for ffmpeg.
        drop(stdin);

        let status = self.child.wait().map_err(|source| WriterError::Io {
            path: self.path.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(WriterError::EncoderFailed {
                path: self.path.clone(),
                status: status.to_string(),
            })
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("{}", e);
        }
    }
}
