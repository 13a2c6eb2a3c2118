//! Screen regions and their deterministic ordering.
//!
//! The ordered region list drives both the overlay and recorder slot
//! binding, so its order must depend only on geometry.

use std::collections::HashSet;
use std::fmt;

/// A rectangle in virtual-screen pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Top-left corner, the identity used for deduplication.
    pub fn corner(&self) -> (i32, i32) {
        (self.left, self.top)
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Windows parked at the screen edge (or origin) are desktop furniture,
    /// not capturable content.
    pub fn is_background(&self) -> bool {
        self.left <= 1 || self.top <= 1
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    /// The overlapping part of two regions, if any.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left as i64 || bottom <= top as i64 {
            return None;
        }
        Some(Region::new(
            left,
            top,
            (right - left as i64) as u32,
            (bottom - top as i64) as u32,
        ))
    }

    /// The same rectangle expressed relative to `origin`.
    pub fn relative_to(&self, origin: (i32, i32)) -> Region {
        Region::new(
            self.left - origin.0,
            self.top - origin.1,
            self.width,
            self.height,
        )
    }

    pub fn label(&self) -> String {
        format!("({}, {}, {})", self.left, self.top, self.width)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Pixel dimensions of a frame or a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Applies a backing-store density factor (e.g. 2.0 on Retina displays).
    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |v: u32| (v as f64 * factor as f64).round().max(1.0) as u32;
        Self::new(scale(self.width), scale(self.height))
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Keeps the first region seen at each top-left corner.
pub fn dedup_by_corner<T, F>(items: Vec<T>, region_of: F) -> Vec<T>
where
    F: Fn(&T) -> Region,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(region_of(item).corner()))
        .collect()
}

/// Deduplicates by corner and sorts by `(top, left)` ascending.
pub fn order_regions<I>(regions: I) -> Vec<Region>
where
    I: IntoIterator<Item = Region>,
{
    let mut ordered = dedup_by_corner(regions.into_iter().collect(), |r| *r);
    ordered.sort_by_key(|r| (r.top, r.left));
    ordered
}
