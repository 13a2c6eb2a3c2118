use log::{debug, warn};
use thiserror::Error;

use super::desktop::{DesktopSession, WindowListBackend};
use super::region::{dedup_by_corner, order_regions, FrameSize, Region};
use super::window_backends::{platform_for_session, WindowPlatform, XcapPlatform};

/// Opaque platform handle; only the backend that produced it understands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub handle: WindowHandle,

    pub title: String,

    pub region: Region,

    pub is_visible: bool,

    pub is_minimized: bool,
}

impl WindowRecord {
    pub fn is_capturable(&self) -> bool {
        self.is_visible
            && !self.is_minimized
            && !self.region.is_empty()
            && !self.region.is_background()
    }
}

/// How a window title is compared against the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleQuery {
    pub text: String,

    pub exact: bool,
}

impl TitleQuery {
    pub fn substring(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: false,
        }
    }

    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: true,
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.trim();
        if self.exact {
            title == self.text
        } else {
            !title.is_empty() && title.contains(&self.text)
        }
    }
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window backend {backend} is unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("failed to enumerate windows: {0}")]
    EnumerationFailed(String),

    #[error("failed to parse {backend} output: {source}")]
    Parse {
        backend: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to resize window {handle}: {reason}")]
    ResizeFailed { handle: WindowHandle, reason: String },

    #[error("{0} cannot resize windows")]
    ResizeUnsupported(&'static str),
}

/// Discovers target windows through a platform strategy chosen at startup.
pub struct WindowLocator {
    platform: Box<dyn WindowPlatform>,
    template: Option<FrameSize>,
}

impl WindowLocator {
    /// Fails when the backend's enumeration primitive cannot be reached.
    pub fn new(
        platform: Box<dyn WindowPlatform>,
        template: Option<FrameSize>,
    ) -> Result<Self, WindowError> {
        platform.probe()?;
        debug!("Window backend ready: {}", platform.name());
        Ok(Self { platform, template })
    }

    /// Uses the session's backend. The GNOME and KDE backends depend on
    /// optional tools, so those sessions fall back to xcap without them.
    pub fn for_session(
        session: &DesktopSession,
        template: Option<FrameSize>,
    ) -> Result<Self, WindowError> {
        let primary = platform_for_session(session);
        match session.window_list_backend() {
            WindowListBackend::GnomeWayland | WindowListBackend::KdeWayland => {
                Self::with_fallback(primary, Box::new(XcapPlatform), template)
            }
            _ => Self::new(primary, template),
        }
    }

    pub fn with_fallback(
        primary: Box<dyn WindowPlatform>,
        fallback: Box<dyn WindowPlatform>,
        template: Option<FrameSize>,
    ) -> Result<Self, WindowError> {
        Self::new(primary, template).or_else(|e| {
            warn!("{}; falling back to {}", e, fallback.name());
            Self::new(fallback, template)
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.platform.name()
    }

    /// Lists capturable windows matching `query`, one per top-left corner.
    ///
    /// Windows deviating from the template size get a resize request; the
    /// returned rectangle is still the pre-correction one.
    pub fn locate(&self, query: &TitleQuery) -> Result<Vec<WindowRecord>, WindowError> {
        let candidates = self.platform.locate(query)?;
        let capturable: Vec<WindowRecord> = candidates
            .into_iter()
            .filter(WindowRecord::is_capturable)
            .collect();
        let located = dedup_by_corner(capturable, |w: &WindowRecord| w.region);

        if let Some(template) = self.template {
            for window in located.iter().filter(|w| w.region.size() != template) {
                self.correct(window, template);
            }
        }

        Ok(located)
    }

    /// Locates and orders in one step, as the capture loop consumes it.
    pub fn locate_regions(&self, query: &TitleQuery) -> Result<Vec<Region>, WindowError> {
        let located = self.locate(query)?;
        Ok(order_regions(located.into_iter().map(|w| w.region)))
    }

    fn correct(&self, window: &WindowRecord, template: FrameSize) {
        let target = Region::new(
            window.region.left,
            window.region.top,
            template.width,
            template.height,
        );
        debug!(
            "Resizing window '{}' from {} to {}",
            window.title,
            window.region.size(),
            template
        );
        match self.platform.correct(window, &target) {
            Ok(()) => {}
            Err(WindowError::ResizeUnsupported(backend)) => {
                debug!("Skipping resize, not supported by {}", backend)
            }
            Err(e) => warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakePlatform {
        windows: Vec<WindowRecord>,
        resized: Arc<Mutex<Vec<(WindowHandle, Region)>>>,
        available: bool,
    }

    impl FakePlatform {
        fn with(windows: Vec<WindowRecord>) -> Self {
            Self {
                windows,
                resized: Arc::new(Mutex::new(Vec::new())),
                available: true,
            }
        }
    }

    impl WindowPlatform for FakePlatform {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn probe(&self) -> Result<(), WindowError> {
            if self.available {
                Ok(())
            } else {
                Err(WindowError::Unavailable {
                    backend: "fake",
                    reason: "not installed".to_string(),
                })
            }
        }

        fn locate(&self, query: &TitleQuery) -> Result<Vec<WindowRecord>, WindowError> {
            Ok(self
                .windows
                .iter()
                .filter(|w| query.matches(&w.title))
                .cloned()
                .collect())
        }

        fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
            self.resized
                .lock()
                .unwrap()
                .push((window.handle.clone(), *target));
            Ok(())
        }
    }

    fn window(id: &str, title: &str, region: Region) -> WindowRecord {
        WindowRecord {
            handle: WindowHandle(id.to_string()),
            title: title.to_string(),
            region,
            is_visible: true,
            is_minimized: false,
        }
    }

    #[test]
    fn test_title_query_matching() {
        assert!(TitleQuery::substring("Calc").matches("Calculator"));
        assert!(!TitleQuery::substring("Calc").matches("Terminal"));
        assert!(!TitleQuery::substring("").matches("   "));
        assert!(TitleQuery::exact("Calculator").matches("Calculator"));
        assert!(!TitleQuery::exact("Calc").matches("Calculator"));
    }

    #[test]
    fn test_locate_filters_background_and_hidden() {
        let mut minimized = window("3", "Calc", Region::new(300, 300, 50, 50));
        minimized.is_minimized = true;
        let mut hidden = window("4", "Calc", Region::new(400, 300, 50, 50));
        hidden.is_visible = false;

        let platform = FakePlatform::with(vec![
            window("1", "Calc", Region::new(0, 0, 100, 100)),
            window("2", "Calc", Region::new(1, 200, 100, 100)),
            minimized,
            hidden,
            window("5", "Calc", Region::new(20, 20, 0, 40)),
            window("6", "Calc", Region::new(20, 30, 40, 40)),
        ]);
        let locator = WindowLocator::new(Box::new(platform), None).unwrap();

        let located = locator.locate(&TitleQuery::substring("Calc")).unwrap();

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].handle, WindowHandle("6".to_string()));
        assert!(located.iter().all(|w| w.region.left > 1 && w.region.top > 1));
    }

    #[test]
    fn test_locate_dedups_by_corner() {
        let platform = FakePlatform::with(vec![
            window("1", "Calc", Region::new(10, 10, 200, 300)),
            window("2", "Calc", Region::new(10, 10, 500, 500)),
        ]);
        let locator = WindowLocator::new(Box::new(platform), None).unwrap();

        let located = locator.locate(&TitleQuery::substring("Calc")).unwrap();

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].handle, WindowHandle("1".to_string()));
    }

    #[test]
    fn test_locate_requests_resize_but_returns_original() {
        let platform = FakePlatform::with(vec![
            window("1", "Calc", Region::new(10, 10, 200, 300)),
            window("2", "Calc", Region::new(10, 400, 464, 838)),
        ]);
        let resized = platform.resized.clone();
        let locator =
            WindowLocator::new(Box::new(platform), Some(FrameSize::new(464, 838))).unwrap();

        let located = locator.locate(&TitleQuery::substring("Calc")).unwrap();

        assert_eq!(located[0].region, Region::new(10, 10, 200, 300));
        let resized = resized.lock().unwrap();
        assert_eq!(
            *resized,
            vec![(WindowHandle("1".to_string()), Region::new(10, 10, 464, 838))]
        );
    }

    #[test]
    fn test_unavailable_backend_fails_construction() {
        let mut platform = FakePlatform::with(Vec::new());
        platform.available = false;

        let result = WindowLocator::new(Box::new(platform), None);

        assert!(matches!(result, Err(WindowError::Unavailable { .. })));
    }

    #[test]
    fn test_unavailable_backend_falls_back() {
        let mut primary = FakePlatform::with(Vec::new());
        primary.available = false;
        let fallback = FakePlatform::with(vec![window("1", "Calc", Region::new(10, 10, 20, 20))]);

        let locator =
            WindowLocator::with_fallback(Box::new(primary), Box::new(fallback), None).unwrap();

        assert_eq!(locator.locate(&TitleQuery::substring("Calc")).unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_failure_is_reported() {
        let mut primary = FakePlatform::with(Vec::new());
        primary.available = false;
        let mut fallback = FakePlatform::with(Vec::new());
        fallback.available = false;

        let result = WindowLocator::with_fallback(Box::new(primary), Box::new(fallback), None);

        assert!(matches!(result, Err(WindowError::Unavailable { .. })));
    }

    #[test]
    fn test_locate_regions_scenario_two_stacked_windows() {
        let platform = FakePlatform::with(vec![
            window("b", "Calc", Region::new(10, 400, 200, 300)),
            window("a", "Calc", Region::new(10, 10, 200, 300)),
        ]);
        let locator = WindowLocator::new(Box::new(platform), None).unwrap();

        let regions = locator.locate_regions(&TitleQuery::substring("Calc")).unwrap();

        assert_eq!(
            regions,
            vec![
                Region::new(10, 10, 200, 300),
                Region::new(10, 400, 200, 300)
            ]
        );
    }

    #[test]
    fn test_locate_regions_origin_window_excluded() {
        let platform = FakePlatform::with(vec![window("1", "Calc", Region::new(0, 0, 100, 100))]);
        let locator = WindowLocator::new(Box::new(platform), None).unwrap();

        let regions = locator.locate_regions(&TitleQuery::substring("Calc")).unwrap();

        assert!(regions.is_empty());
    }
}
