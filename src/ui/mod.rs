//! Overlay window
//!
//! Draws the outline of every tracked region on top of the desktop and
//! raises cancellation when closed.

pub mod drawing;
pub mod overlay;

pub use overlay::{build_overlay, overlay_channel};
