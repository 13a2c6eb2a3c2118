//! Application module
//!
//! This module contains the run configuration and the state shared between
//! the overlay and the capture worker.

mod config;
mod state;

pub use config::{CaptureArgs, CaptureConfig, Cli, Command};
pub use state::{CancelToken, OverlayState};
