//! State shared between the overlay and the capture worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::Region;

/// One-way stop signal, set by the overlay and polled by the capture loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What the overlay currently draws. Owned by the UI thread.
#[derive(Debug, Default)]
pub struct OverlayState {
    /// Regions from the latest tick, in slot order
    pub regions: Vec<Region>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions overlapping `monitor`, in that monitor's own coordinates.
    pub fn regions_on(&self, monitor: &Region) -> Vec<Region> {
        let origin = monitor.corner();
        self.regions
            .iter()
            .filter(|region| region.intersection(monitor).is_some())
            .map(|region| region.relative_to(origin))
            .collect()
    }

    /// Replaces the displayed regions; returns whether a redraw is needed.
    pub fn update_regions(&mut self, regions: Vec<Region>) -> bool {
        if self.regions == regions {
            return false;
        }
        self.regions = regions;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let worker_side = token.clone();

        assert!(!worker_side.is_cancelled());
        token.cancel();
        assert!(worker_side.is_cancelled());

        token.cancel();
        assert!(worker_side.is_cancelled());
    }

    #[test]
    fn test_cancel_across_threads() {
        let token = CancelToken::new();
        let ui_side = token.clone();

        std::thread::spawn(move || ui_side.cancel()).join().unwrap();

        assert!(token.is_cancelled());
    }

    #[test]
    fn test_overlay_redraws_only_on_change() {
        let mut state = OverlayState::new();
        let regions = vec![Region::new(10, 10, 200, 300)];

        assert!(state.update_regions(regions.clone()));
        assert!(!state.update_regions(regions));
        assert!(state.update_regions(Vec::new()));
        assert!(state.regions.is_empty());
    }

    #[test]
    fn test_regions_on_secondary_monitor() {
        let mut state = OverlayState::new();
        let primary = Region::new(0, 0, 1920, 1080);
        let secondary = Region::new(1920, 0, 1280, 1024);
        state.update_regions(vec![
            Region::new(10, 10, 200, 300),
            Region::new(1900, 100, 200, 300),
            Region::new(2000, 400, 200, 300),
        ]);

        assert_eq!(
            state.regions_on(&primary),
            vec![Region::new(10, 10, 200, 300), Region::new(1900, 100, 200, 300)]
        );
        assert_eq!(
            state.regions_on(&secondary),
            vec![Region::new(-20, 100, 200, 300), Region::new(80, 400, 200, 300)]
        );
    }
}
