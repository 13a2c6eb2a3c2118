//! The capture worker: polls window positions, feeds the overlay and writes
//! one frame per located window per tick.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use thiserror::Error;

use super::slot::{RecorderSlot, SlotError, SlotState};
use super::writer::WriterFactory;
use crate::app::{CancelToken, CaptureConfig};
use crate::capture::{FrameSource, GrabError, Region, TitleQuery, WindowError, WindowLocator};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Grab(#[from] GrabError),
}

/// Produces the ordered region list for a title.
pub trait RegionSource {
    fn regions(&self, query: &TitleQuery) -> Result<Vec<Region>, WindowError>;
}

impl RegionSource for WindowLocator {
    fn regions(&self, query: &TitleQuery) -> Result<Vec<Region>, WindowError> {
        self.locate_regions(query)
    }
}

/// Receives the regions of every tick, before any frame of that tick is written.
pub trait OverlayNotifier {
    fn update_regions(&self, regions: Vec<Region>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Default)]
pub struct LoopReport {
    pub ticks: u64,
    pub recordings: Vec<PathBuf>,
}

pub struct CaptureLoop<L, N, F> {
    config: CaptureConfig,
    locator: L,
    notifier: N,
    factory: F,
    slots: Vec<RecorderSlot>,
    failures: FailureLog,
    discovery_error: Option<String>,
    state: LoopState,
    ticks: u64,
}

impl<L, N, F> CaptureLoop<L, N, F>
where
    L: RegionSource,
    N: OverlayNotifier,
    F: WriterFactory,
{
    pub fn new(config: CaptureConfig, locator: L, notifier: N, factory: F) -> Self {
        let slots = (0..config.slot_capacity).map(RecorderSlot::new).collect();
        let failures = FailureLog::new(config.slot_capacity);
        Self {
            config,
            locator,
            notifier,
            factory,
            slots,
            failures,
            discovery_error: None,
            state: LoopState::Idle,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn slots(&self) -> &[RecorderSlot] {
        &self.slots
    }

    /// Runs ticks until `cancel` is set, then closes every recording.
    ///
    /// `open` creates the grab session shared by all ticks of the run.
    pub fn run<G, O>(&mut self, open: O, cancel: &CancelToken) -> Result<LoopReport, CaptureError>
    where
        G: FrameSource,
        O: FnOnce() -> Result<G, GrabError>,
    {
        let mut grabber = match open() {
            Ok(grabber) => grabber,
            Err(e) => {
                self.state = LoopState::Stopped;
                return Err(e.into());
            }
        };

        self.state = LoopState::Running;
        info!(
            "Capturing windows matching '{}' @ {} FPS",
            self.config.title.text, self.config.fps
        );

        let interval = self.config.tick_interval();
        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.tick(&mut grabber, cancel);
            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }

        info!("Stopping capture...");
        self.drain();

        Ok(LoopReport {
            ticks: self.ticks,
            recordings: self
                .slots
                .iter()
                .filter_map(|s| s.path().map(PathBuf::from))
                .collect(),
        })
    }

    /// One polling iteration: locate, notify, then grab and write per slot.
    pub fn tick<G: FrameSource>(&mut self, grabber: &mut G, cancel: &CancelToken) {
        self.ticks += 1;

        let regions = match self.locator.regions(&self.config.title) {
            Ok(regions) => {
                if self.discovery_error.take().is_some() {
                    info!("Window discovery recovered");
                }
                regions
            }
            Err(e) => {
                let message = e.to_string();
                if self.discovery_error.as_ref() != Some(&message) {
                    warn!("Window discovery failed: {}", message);
                }
                self.discovery_error = Some(message);
                Vec::new()
            }
        };

        self.notifier.update_regions(regions.clone());

        if regions.len() > self.slots.len() {
            debug!(
                "{} windows found, recording only the first {}",
                regions.len(),
                self.slots.len()
            );
        }

        for (slot, region) in self.slots.iter_mut().zip(&regions) {
            if cancel.is_cancelled() {
                debug!("Cancelled before slot {}", slot.index());
                break;
            }

            let result = record(slot, region, grabber, &self.config, &mut self.factory);
            let changed = self.failures.record(slot.index(), &result);
            match result {
                Err(e) if changed => warn!("{}", e),
                Err(e) => debug!("{}", e),
                Ok(()) if changed => info!("Slot {} recording again", slot.index()),
                Ok(()) => {}
            }
        }
    }

    /// Closes every active slot; returns how many were closed. Idempotent.
    pub fn drain(&mut self) -> usize {
        if self.state == LoopState::Stopped {
            return 0;
        }
        self.state = LoopState::Draining;

        let mut closed = 0;
        for slot in &mut self.slots {
            match slot.close() {
                Ok(true) => {
                    closed += 1;
                    if let Some(path) = slot.path() {
                        info!("Recording finished and file closed: {}", path.display());
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to close slot {}: {}", slot.index(), e),
            }
        }

        self.state = LoopState::Stopped;
        closed
    }
}

fn record<G: FrameSource>(
    slot: &mut RecorderSlot,
    region: &Region,
    grabber: &mut G,
    config: &CaptureConfig,
    factory: &mut dyn WriterFactory,
) -> Result<(), SlotError> {
    if slot.state() == SlotState::Closed {
        return Err(SlotError::Closed(slot.index()));
    }
    // The file is only created once there is a frame to put in it.
    let frame = grabber.grab(region)?;
    slot.bind(region, config, factory)?;
    slot.write(&frame)
}

/// Remembers the last failure of each slot so a persistent error is
/// reported once instead of on every tick.
#[derive(Debug, Default)]
struct FailureLog {
    last: Vec<Option<String>>,
}

impl FailureLog {
    fn new(slots: usize) -> Self {
        Self {
            last: vec![None; slots],
        }
    }

    /// Returns whether the outcome differs from the slot's previous one.
    fn record(&mut self, slot: usize, result: &Result<(), SlotError>) -> bool {
        let current = result.as_ref().err().map(ToString::to_string);
        let changed = self.last[slot] != current;
        self.last[slot] = current;
        changed
    }
}

impl<L, N, F> Drop for CaptureLoop<L, N, F> {
    fn drop(&mut self) {
        // Slots close themselves on drop; only report what is still open.
        let open = self
            .slots
            .iter()
            .filter(|s| s.state() == SlotState::Active)
            .count();
        if open > 0 {
            warn!("Capture loop dropped with {} open recordings", open);
        }
    }
}
