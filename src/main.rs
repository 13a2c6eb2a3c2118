mod app;
mod capture;
mod recording;
mod ui;

use libadwaita as adw;

use adw::prelude::*;
use clap::Parser;
use log::{error, info, warn};
use std::cell::RefCell;
use std::path::Path;
use std::process::ExitCode;
use std::thread;

use app::{CancelToken, CaptureArgs, CaptureConfig, Cli, Command};
use capture::{DesktopSession, ScreenGrabber, WindowLocator};
use recording::{annotate_recordings, annotate_sizes, CaptureLoop, FfmpegFactory};

const APP_ID: &str = "org.example.WindowRecorder";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Annotate { dir }) => annotate(&dir),
        None => record(&cli.capture),
    }
}

fn annotate(dir: &Path) -> ExitCode {
    match annotate_sizes(dir) {
        Ok(renamed) => {
            info!("Annotated {} recordings in {}", renamed.len(), dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to annotate recordings in {}: {}", dir.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn record(args: &CaptureArgs) -> ExitCode {
    let session = DesktopSession::detect();
    let config = CaptureConfig::from_args(args, &session);
    info!("Detected session: {}", session);

    let locator = match WindowLocator::for_session(&session, config.template) {
        Ok(locator) => locator,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Using {} window backend", locator.backend_name());

    if session.is_wayland() {
        warn!("On Wayland the compositor decides where the overlay is placed");
    }

    let cancel = CancelToken::new();
    let (notifier, receiver) = ui::overlay_channel();

    info!("Starting capture thread...");
    let worker = thread::Builder::new().name("capture".to_string()).spawn({
        let cancel = cancel.clone();
        move || {
            let factory = FfmpegFactory::new(config.encoder.clone());
            let mut capture = CaptureLoop::new(config, locator, notifier, factory);
            capture.run(ScreenGrabber::open, &cancel)
        }
    });
    let worker = match worker {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to start capture thread: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = adw::Application::builder().application_id(APP_ID).build();
    let receiver = RefCell::new(Some(receiver));
    app.connect_activate({
        let cancel = cancel.clone();
        move |app| {
            if let Some(receiver) = receiver.borrow_mut().take() {
                ui::build_overlay(app, receiver, cancel.clone());
            }
        }
    });
    // Arguments were already handled by clap.
    app.run_with_args::<&str>(&[]);

    // The main loop may also end without the overlay's close handler.
    cancel.cancel();

    let report = match worker.join() {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            error!("Capture failed: {}", e);
            return ExitCode::FAILURE;
        }
        Err(_) => {
            error!("Capture thread panicked");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Capture stopped after {} ticks, {} recordings",
        report.ticks,
        report.recordings.len()
    );

    if args.annotate_sizes {
        if let Err(e) = annotate_recordings(&report.recordings) {
            error!("Failed to annotate recordings: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
