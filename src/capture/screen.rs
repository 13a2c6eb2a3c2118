//! Region grabbing using the xcap library.
//!
//! A `ScreenGrabber` is opened once per capture run and reused every tick;
//! it caches the monitor layout so each grab only has to find the monitors
//! overlapping the requested region. Regions spanning several monitors are
//! stitched together, and parts outside every monitor stay black.

use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;
use xcap::Monitor;

use super::region::{FrameSize, Region};

#[derive(Debug, Error)]
pub enum GrabError {
    #[error("failed to open capture session: {0}")]
    SessionFailed(String),

    #[error("region {0} is outside every monitor")]
    OutOfBounds(Region),

    #[error("failed to capture region {region}: {reason}")]
    CaptureFailed { region: Region, reason: String },
}

/// A captured frame, three bytes per pixel in BGR order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub size: FrameSize,
    pub data: Vec<u8>,
}

impl Frame {
    /// Drops alpha and reorders RGBA into the encoder's BGR layout.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let size = FrameSize::new(image.width(), image.height());
        let mut data = Vec::with_capacity(size.pixel_count() * 3);
        for pixel in image.pixels() {
            let [r, g, b, _] = pixel.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self { size, data }
    }
}

/// Source of raw pixels for a screen region.
pub trait FrameSource {
    fn grab(&mut self, region: &Region) -> Result<Frame, GrabError>;
}

/// Information about a monitor, cached for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorInfo {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f32,
}

impl MonitorInfo {
    fn from_xcap(monitor: &Monitor) -> Result<Self, GrabError> {
        let info = |e: xcap::XCapError| GrabError::SessionFailed(e.to_string());
        Ok(Self {
            name: monitor.name().map_err(info)?,
            x: monitor.x().map_err(info)?,
            y: monitor.y().map_err(info)?,
            width: monitor.width().map_err(info)?,
            height: monitor.height().map_err(info)?,
            scale_factor: monitor.scale_factor().map_err(info)?,
        })
    }

    pub fn bounds(&self) -> Region {
        Region::new(self.x, self.y, self.width, self.height)
    }
}

/// The part of a requested region that one monitor can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabPiece {
    pub monitor: usize,
    /// Covered area, in virtual-screen coordinates
    pub area: Region,
}

impl GrabPiece {
    fn monitor_offset(&self, info: &MonitorInfo) -> (u32, u32) {
        (
            (self.area.left - info.x) as u32,
            (self.area.top - info.y) as u32,
        )
    }
}

/// Splits `region` into the pieces each monitor overlaps.
pub fn plan_grab(monitors: &[MonitorInfo], region: &Region) -> Vec<GrabPiece> {
    monitors
        .iter()
        .enumerate()
        .filter_map(|(monitor, info)| {
            info.bounds()
                .intersection(region)
                .map(|area| GrabPiece { monitor, area })
        })
        .collect()
}

/// Pastes captured pieces onto a black canvas covering `region`.
///
/// The canvas takes the pixel density of the first piece, so HiDPI captures
/// keep their backing-store size.
pub fn compose(region: &Region, pieces: &[(Region, RgbaImage)]) -> RgbaImage {
    let scale = pieces
        .first()
        .map(|(area, image)| image.width() as f64 / area.width.max(1) as f64)
        .unwrap_or(1.0);
    let size = region.size().scaled(scale as f32);

    let mut canvas = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
    for (area, image) in pieces {
        let x = ((area.left - region.left) as f64 * scale).round() as i64;
        let y = ((area.top - region.top) as f64 * scale).round() as i64;
        imageops::replace(&mut canvas, image, x, y);
    }
    canvas
}

/// Shared capture context for one run.
pub struct ScreenGrabber {
    monitors: Vec<Monitor>,
    infos: Vec<MonitorInfo>,
}

impl ScreenGrabber {
    pub fn open() -> Result<Self, GrabError> {
        let monitors =
            Monitor::all().map_err(|e| GrabError::SessionFailed(e.to_string()))?;

        let mut infos = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            let info = MonitorInfo::from_xcap(monitor)?;
            log::debug!(
                "Monitor {}: {}x{} at ({}, {}) scale {}",
                info.name,
                info.width,
                info.height,
                info.x,
                info.y,
                info.scale_factor
            );
            infos.push(info);
        }

        if infos.is_empty() {
            return Err(GrabError::SessionFailed("no monitors found".to_string()));
        }

        Ok(Self { monitors, infos })
    }

    fn capture_piece(&self, region: &Region, piece: &GrabPiece) -> Result<RgbaImage, GrabError> {
        let (x, y) = piece.monitor_offset(&self.infos[piece.monitor]);
        self.monitors[piece.monitor]
            .capture_region(x, y, piece.area.width, piece.area.height)
            .map_err(|e| GrabError::CaptureFailed {
                region: *region,
                reason: e.to_string(),
            })
    }
}

impl FrameSource for ScreenGrabber {
    fn grab(&mut self, region: &Region) -> Result<Frame, GrabError> {
        let plan = plan_grab(&self.infos, region);

        match plan.as_slice() {
            [] => Err(GrabError::OutOfBounds(*region)),
            [piece] if piece.area == *region => {
                Ok(Frame::from_rgba(&self.capture_piece(region, piece)?))
            }
            pieces => {
                let mut captured = Vec::with_capacity(pieces.len());
                for piece in pieces {
                    captured.push((piece.area, self.capture_piece(region, piece)?));
                }
                Ok(Frame::from_rgba(&compose(region, &captured)))
            }
        }
    }
}
