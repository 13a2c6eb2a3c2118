use gtk4 as gtk;
use libadwaita as adw;

use adw::prelude::*;
use gtk::{cairo, gdk, glib};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use super::drawing;
use crate::app::{CancelToken, OverlayState};
use crate::capture::Region;
use crate::recording::OverlayNotifier;

const REFRESH_INTERVAL: Duration = Duration::from_millis(16);
const OVERLAY_CSS: &str = ".recorder-overlay { background: none; background-color: transparent; }";

/// Capture-thread side of the overlay: hands each tick's regions over by value.
pub struct ChannelNotifier {
    sender: Sender<Vec<Region>>,
}

impl OverlayNotifier for ChannelNotifier {
    fn update_regions(&self, regions: Vec<Region>) {
        // A closed receiver means the overlay is gone; cancellation follows.
        if self.sender.send(regions).is_err() {
            debug!("Overlay no longer receiving regions");
        }
    }
}

pub fn overlay_channel() -> (ChannelNotifier, Receiver<Vec<Region>>) {
    let (sender, receiver) = mpsc::channel();
    (ChannelNotifier { sender }, receiver)
}

/// Builds one transparent, click-through window per monitor, together
/// covering the whole virtual screen.
///
/// Closing any of them raises `cancel`.
pub fn build_overlay(
    app: &adw::Application,
    receiver: Receiver<Vec<Region>>,
    cancel: CancelToken,
) {
    let state = Rc::new(RefCell::new(OverlayState::new()));

    load_css();

    let mut monitors = monitor_layout();
    if monitors.is_empty() {
        warn!("No monitors reported, outlining from the origin of a single window");
        monitors.push((None, Region::new(0, 0, u32::MAX, u32::MAX)));
    }

    let mut windows = Vec::with_capacity(monitors.len());
    let mut drawing_areas = Vec::with_capacity(monitors.len());
    for (monitor, bounds) in monitors {
        let drawing_area = drawing::create_drawing_area(&state, bounds);
        let window = build_window(app, &drawing_area, cancel.clone());
        match monitor {
            Some(monitor) => window.fullscreen_on_monitor(&monitor),
            None => window.fullscreen(),
        }
        debug!("Overlay window covering {}", bounds);
        windows.push(window);
        drawing_areas.push(drawing_area);
    }

    glib::timeout_add_local(REFRESH_INTERVAL, {
        let windows = windows.clone();
        move || {
            let mut changed = false;
            loop {
                match receiver.try_recv() {
                    Ok(regions) => changed |= state.borrow_mut().update_regions(regions),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("Capture stopped, closing overlay");
                        windows.iter().for_each(|w| w.close());
                        return glib::ControlFlow::Break;
                    }
                }
            }
            if changed {
                drawing_areas.iter().for_each(|d| d.queue_draw());
            }
            glib::ControlFlow::Continue
        }
    });

    for window in &windows {
        window.present();
    }
}

/// Every connected monitor with its geometry in virtual-screen pixels.
fn monitor_layout() -> Vec<(Option<gdk::Monitor>, Region)> {
    let Some(display) = gdk::Display::default() else {
        return Vec::new();
    };

    let model = display.monitors();
    (0..model.n_items())
        .filter_map(|i| model.item(i))
        .filter_map(|item| item.downcast::<gdk::Monitor>().ok())
        .map(|monitor| {
            let geometry = monitor.geometry();
            let bounds = Region::new(
                geometry.x(),
                geometry.y(),
                geometry.width().max(0) as u32,
                geometry.height().max(0) as u32,
            );
            (Some(monitor), bounds)
        })
        .collect()
}

fn build_window(
    app: &adw::Application,
    drawing_area: &gtk::DrawingArea,
    cancel: CancelToken,
) -> adw::ApplicationWindow {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Window Recorder")
        .content(drawing_area)
        .decorated(false)
        .build();
    window.add_css_class("recorder-overlay");

    window.connect_realize(|window| match window.surface() {
        Some(surface) => surface.set_input_region(&cairo::Region::create()),
        None => warn!("Overlay has no surface, it will not be click-through"),
    });

    window.connect_close_request(move |_| {
        info!("Closing overlay window...");
        cancel.cancel();
        glib::Propagation::Proceed
    });

    window
}

fn load_css() {
    let Some(display) = gdk::Display::default() else {
        warn!("No display available for overlay styling");
        return;
    };

    let provider = gtk::CssProvider::new();
    provider.load_from_string(OVERLAY_CSS);
    gtk::style_context_add_provider_for_display(
        &display,
        &provider,
        gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_hands_over_regions() {
        let (notifier, receiver) = overlay_channel();
        let regions = vec![Region::new(10, 10, 200, 300), Region::new(10, 400, 200, 300)];

        notifier.update_regions(regions.clone());
        notifier.update_regions(Vec::new());

        assert_eq!(receiver.try_recv().unwrap(), regions);
        assert!(receiver.try_recv().unwrap().is_empty());
    }

    #[test]
    fn test_channel_notifier_survives_closed_overlay() {
        let (notifier, receiver) = overlay_channel();
        drop(receiver);

        notifier.update_regions(vec![Region::new(10, 10, 20, 20)]);
    }
}
