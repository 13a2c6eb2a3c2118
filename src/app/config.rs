use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{DesktopSession, FrameSize, TitleQuery};

/// Track windows by title, outline them on screen and record each one.
#[derive(Parser, Debug)]
#[command(name = "window-recorder", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prefix every .mp4 file in a directory with its size in megabytes.
    Annotate {
        /// Directory containing the recordings
        dir: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Window title to capture
    #[arg(long, default_value = "Calculator")]
    pub title: String,

    /// Require the window title to match exactly instead of as a substring
    #[arg(long)]
    pub exact_title: bool,

    /// Output file destination prefix (default: current directory)
    #[arg(long, default_value = "")]
    pub output: String,

    /// Capture frame rate
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// Expected window size (e.g. 464x838); other sizes are resized to it
    #[arg(long, value_parser = parse_frame_size)]
    pub template: Option<FrameSize>,

    /// Captured pixels per window pixel (default: 2 on macOS, 1 elsewhere)
    #[arg(long)]
    pub scale_factor: Option<f32>,

    /// Maximum number of windows recorded at once
    #[arg(long, default_value_t = 10)]
    pub slots: usize,

    /// ffmpeg executable used to encode the recordings
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Prefix recordings with their size once capture stops
    #[arg(long)]
    pub annotate_sizes: bool,
}

fn parse_frame_size(value: &str) -> Result<FrameSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width: u32 = w.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let height: u32 = h.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    if width == 0 || height == 0 {
        return Err("size must be positive".to_string());
    }
    Ok(FrameSize::new(width, height))
}

/// Settings for one capture run, fixed at startup.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub title: TitleQuery,
    pub output_prefix: String,
    pub fps: u32,
    pub template: Option<FrameSize>,
    pub scale_factor: f32,
    pub slot_capacity: usize,
    pub encoder: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            title: TitleQuery::substring("Calculator"),
            output_prefix: String::new(),
            fps: 60,
            template: None,
            scale_factor: 1.0,
            slot_capacity: 10,
            encoder: PathBuf::from("ffmpeg"),
        }
    }
}

impl CaptureConfig {
    pub fn from_args(args: &CaptureArgs, session: &DesktopSession) -> Self {
        let title = if args.exact_title {
            TitleQuery::exact(args.title.clone())
        } else {
            TitleQuery::substring(args.title.clone())
        };

        Self {
            title,
            output_prefix: args.output.clone(),
            fps: args.fps,
            template: args.template,
            scale_factor: args
                .scale_factor
                .filter(|f| *f > 0.0)
                .unwrap_or_else(|| session.default_scale_factor()),
            slot_capacity: args.slots,
            encoder: args.ffmpeg.clone(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}
