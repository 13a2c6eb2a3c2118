//! Recording module
//!
//! Per-window recorder slots, the video writers behind them and the capture
//! loop that drives both.

mod capture_loop;
mod rename;
mod slot;
mod writer;

pub use capture_loop::{CaptureLoop, OverlayNotifier};
pub use rename::{annotate_recordings, annotate_sizes};
pub use writer::FfmpegFactory;
