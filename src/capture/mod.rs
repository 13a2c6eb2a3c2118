//! Capture module for window discovery and region grabbing
//!
//! This module provides abstractions over the desktop's window managers and
//! the xcap library: finding the target windows, ordering their regions and
//! grabbing their pixels.

pub mod desktop;
pub mod region;
pub mod screen;
pub mod window;
pub mod window_backends;

pub use desktop::DesktopSession;
pub use region::{FrameSize, Region};
pub use screen::{Frame, FrameSource, GrabError, ScreenGrabber};
pub use window::{TitleQuery, WindowError, WindowLocator};
