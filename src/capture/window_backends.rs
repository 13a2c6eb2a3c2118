//! Window listing backends for different desktop environments.
//!
//! This module provides the platform strategies used by the locator:
//! - Hyprland (via hyprctl)
//! - Sway (via swaymsg)
//! - GNOME Wayland (via gdbus and the window-calls Shell extension)
//! - KDE Wayland (via kdotool)
//! - Windows (xcap listing, Win32 resizing)
//! - Everything else (via xcap: X11, macOS)
//!
//! Each backend returns unified `WindowRecord`s and knows how (or whether)
//! it can resize one of its own windows.

use log::debug;
use serde::Deserialize;
use std::process::Command;

use super::desktop::{DesktopSession, WindowListBackend};
use super::region::Region;
use super::window::{TitleQuery, WindowError, WindowHandle, WindowRecord};

/// Result type for window listing operations.
pub type WindowListResult = Result<Vec<WindowRecord>, WindowError>;

/// Platform capability: find windows by title, correct their geometry.
pub trait WindowPlatform: Send {
    fn name(&self) -> &'static str;

    /// Checks that the native enumeration primitive is reachable.
    fn probe(&self) -> Result<(), WindowError>;

    fn locate(&self, query: &TitleQuery) -> WindowListResult;

    /// Requests a new geometry without waiting for the window manager.
    fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError>;
}

/// Picks the strategy for the current session.
pub fn platform_for_session(session: &DesktopSession) -> Box<dyn WindowPlatform> {
    match session.window_list_backend() {
        WindowListBackend::Hyprland => Box::new(HyprlandPlatform),
        WindowListBackend::Sway => Box::new(SwayPlatform),
        WindowListBackend::GnomeWayland => Box::new(GnomePlatform),
        WindowListBackend::KdeWayland => Box::new(KdePlatform),
        #[cfg(windows)]
        WindowListBackend::Win32 => Box::new(win32::Win32Platform),
        _ => Box::new(XcapPlatform),
    }
}

fn run_tool(backend: &'static str, program: &str, args: &[&str]) -> Result<Vec<u8>, WindowError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| WindowError::Unavailable {
            backend,
            reason: format!("failed to run {}: {}", program, e),
        })?;

    if !output.status.success() {
        return Err(WindowError::EnumerationFailed(format!(
            "{} returned {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output.stdout)
}

/// Hyprland clients as reported by `hyprctl clients -j`.
#[derive(Debug, Deserialize)]
struct HyprlandClient {
    address: String,
    #[serde(default)]
    mapped: bool,
    #[serde(default)]
    hidden: bool,
    at: [i32; 2],
    size: [i32; 2],
    #[serde(default)]
    title: String,
}

impl HyprlandClient {
    fn into_record(self) -> WindowRecord {
        WindowRecord {
            handle: WindowHandle(self.address),
            title: self.title,
            region: Region::new(
                self.at[0],
                self.at[1],
                self.size[0].max(0) as u32,
                self.size[1].max(0) as u32,
            ),
            is_visible: self.mapped,
            is_minimized: self.hidden,
        }
    }
}

fn parse_hyprland_clients(json: &[u8], query: &TitleQuery) -> WindowListResult {
    let clients: Vec<HyprlandClient> =
        serde_json::from_slice(json).map_err(|source| WindowError::Parse {
            backend: "hyprland",
            source,
        })?;

    Ok(clients
        .into_iter()
        .filter(|c| query.matches(&c.title))
        .map(HyprlandClient::into_record)
        .collect())
}

pub struct HyprlandPlatform;

impl WindowPlatform for HyprlandPlatform {
    fn name(&self) -> &'static str {
        "Hyprland (hyprctl)"
    }

    fn probe(&self) -> Result<(), WindowError> {
        run_tool("hyprland", "hyprctl", &["version"]).map(|_| ())
    }

    fn locate(&self, query: &TitleQuery) -> WindowListResult {
        let json = run_tool("hyprland", "hyprctl", &["clients", "-j"])?;
        parse_hyprland_clients(&json, query)
    }

    fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
        let arg = format!(
            "exact {} {},address:{}",
            target.width, target.height, window.handle
        );
        debug!("hyprctl dispatch resizewindowpixel {}", arg);
        run_tool("hyprland", "hyprctl", &["dispatch", "resizewindowpixel", arg.as_str()])
            .map(|_| ())
            .map_err(|e| WindowError::ResizeFailed {
                handle: window.handle.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct SwayRect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

/// A node of the tree returned by `swaymsg -t get_tree`.
#[derive(Debug, Deserialize)]
struct SwayNode {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    rect: SwayRect,
    #[serde(default)]
    pid: Option<i64>,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(default)]
    nodes: Vec<SwayNode>,
    #[serde(default)]
    floating_nodes: Vec<SwayNode>,
}

impl SwayNode {
    fn collect_windows(self, query: &TitleQuery, out: &mut Vec<WindowRecord>) {
        // Only leaf containers owned by a client process are windows.
        if self.pid.is_some() {
            let title = self.name.unwrap_or_default();
            if query.matches(&title) {
                out.push(WindowRecord {
                    handle: WindowHandle(self.id.to_string()),
                    title,
                    region: Region::new(
                        self.rect.x,
                        self.rect.y,
                        self.rect.width.max(0) as u32,
                        self.rect.height.max(0) as u32,
                    ),
                    is_visible: self.visible.unwrap_or(false),
                    // Sway has no minimized state; scratchpad windows are invisible.
                    is_minimized: false,
                });
            }
        }

        for child in self.nodes.into_iter().chain(self.floating_nodes) {
            child.collect_windows(query, out);
        }
    }
}

fn parse_sway_tree(json: &[u8], query: &TitleQuery) -> WindowListResult {
    let root: SwayNode = serde_json::from_slice(json).map_err(|source| WindowError::Parse {
        backend: "sway",
        source,
    })?;

    let mut windows = Vec::new();
    root.collect_windows(query, &mut windows);
    Ok(windows)
}

pub struct SwayPlatform;

impl WindowPlatform for SwayPlatform {
    fn name(&self) -> &'static str {
        "Sway (swaymsg)"
    }

    fn probe(&self) -> Result<(), WindowError> {
        run_tool("sway", "swaymsg", &["-t", "get_version"]).map(|_| ())
    }

    fn locate(&self, query: &TitleQuery) -> WindowListResult {
        let json = run_tool("sway", "swaymsg", &["-t", "get_tree"])?;
        parse_sway_tree(&json, query)
    }

    fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
        let command = format!(
            "[con_id={}] resize set width {} px height {} px",
            window.handle, target.width, target.height
        );
        debug!("swaymsg {}", command);
        run_tool("sway", "swaymsg", &[command.as_str()])
            .map(|_| ())
            .map_err(|e| WindowError::ResizeFailed {
                handle: window.handle.clone(),
                reason: e.to_string(),
            })
    }
}

const GNOME_DEST: &str = "org.gnome.Shell";
const GNOME_WINDOWS_PATH: &str = "/org/gnome/Shell/Extensions/Windows";
const GNOME_WINDOWS_IFACE: &str = "org.gnome.Shell.Extensions.Windows";

fn gnome_invoke(method: &str, args: &[&str]) -> Result<String, WindowError> {
    let method = format!("{}.{}", GNOME_WINDOWS_IFACE, method);
    let mut call = vec![
        "call",
        "--session",
        "--dest",
        GNOME_DEST,
        "--object-path",
        GNOME_WINDOWS_PATH,
        "--method",
        method.as_str(),
    ];
    call.extend_from_slice(args);

    let output = run_tool("gnome", "gdbus", &call)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Calls a window-calls method returning a single string.
fn gnome_call(method: &str, args: &[&str]) -> Result<String, WindowError> {
    let reply = gnome_invoke(method, args)?;
    gvariant_string(&reply).ok_or_else(|| {
        WindowError::EnumerationFailed(format!("unexpected gdbus reply: {}", reply.trim()))
    })
}

/// Unwraps the single string of a printed GVariant tuple, e.g. `('[...]',)`.
fn gvariant_string(text: &str) -> Option<String> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(",)")?;
    let quote = inner.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = inner.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}

/// One entry of the window-calls `List` reply. Older extension versions
/// omit the title and geometry, which are then fetched per window.
#[derive(Debug, Deserialize)]
struct GnomeWindow {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    in_current_workspace: Option<bool>,
    #[serde(default)]
    minimized: Option<bool>,
    #[serde(default)]
    x: Option<i32>,
    #[serde(default)]
    y: Option<i32>,
    #[serde(default)]
    width: Option<i32>,
    #[serde(default)]
    height: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GnomeFrameRect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl GnomeWindow {
    fn frame_rect(&self) -> Option<GnomeFrameRect> {
        Some(GnomeFrameRect {
            x: self.x?,
            y: self.y?,
            width: self.width?,
            height: self.height?,
        })
    }

    fn into_record(self, title: String, rect: GnomeFrameRect) -> WindowRecord {
        WindowRecord {
            handle: WindowHandle(self.id.to_string()),
            title,
            region: Region::new(
                rect.x,
                rect.y,
                rect.width.max(0) as u32,
                rect.height.max(0) as u32,
            ),
            is_visible: self.in_current_workspace.unwrap_or(true),
            is_minimized: self.minimized.unwrap_or(false),
        }
    }
}

fn parse_gnome_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, WindowError> {
    serde_json::from_str(json).map_err(|source| WindowError::Parse {
        backend: "gnome",
        source,
    })
}

/// Lists windows through the window-calls GNOME Shell extension.
pub struct GnomePlatform;

impl GnomePlatform {
    fn locate_window(
        window: GnomeWindow,
        query: &TitleQuery,
    ) -> Result<Option<WindowRecord>, WindowError> {
        let id = window.id.to_string();
        let title = match &window.title {
            Some(title) => title.clone(),
            None => gnome_call("GetTitle", &[id.as_str()])?,
        };
        if !query.matches(&title) {
            return Ok(None);
        }

        let rect = match window.frame_rect() {
            Some(rect) => rect,
            None => parse_gnome_json(&gnome_call("GetFrameRect", &[id.as_str()])?)?,
        };
        Ok(Some(window.into_record(title, rect)))
    }
}

impl WindowPlatform for GnomePlatform {
    fn name(&self) -> &'static str {
        "GNOME Shell (window-calls)"
    }

    fn probe(&self) -> Result<(), WindowError> {
        gnome_call("List", &[])
            .map(|_| ())
            .map_err(|e| WindowError::Unavailable {
                backend: "gnome",
                reason: format!("is the window-calls extension enabled? {}", e),
            })
    }

    fn locate(&self, query: &TitleQuery) -> WindowListResult {
        let windows: Vec<GnomeWindow> = parse_gnome_json(&gnome_call("List", &[])?)?;

        let mut records = Vec::new();
        for window in windows {
            if let Some(record) = Self::locate_window(window, query)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
        let (width, height) = (target.width.to_string(), target.height.to_string());
        debug!("window-calls Resize {} {} {}", window.handle, width, height);
        gnome_invoke(
            "Resize",
            &[window.handle.0.as_str(), width.as_str(), height.as_str()],
        )
            .map(|_| ())
            .map_err(|e| WindowError::ResizeFailed {
                handle: window.handle.clone(),
                reason: e.to_string(),
            })
    }
}

/// Reads `Position: x,y` and `Geometry: WxH` from `kdotool getwindowgeometry`.
fn parse_kdotool_geometry(output: &str) -> Option<Region> {
    let number = |v: &str| v.trim().parse::<f64>().ok().map(|n| n.round() as i64);

    let mut position = None;
    let mut size = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Position:") {
            let (x, y) = rest.split_once(',')?;
            position = Some((number(x)?, number(y.split_whitespace().next()?)?));
        } else if let Some(rest) = line.strip_prefix("Geometry:") {
            let (w, h) = rest.split_once('x')?;
            size = Some((number(w)?, number(h)?));
        }
    }

    let (x, y) = position?;
    let (w, h) = size?;
    Some(Region::new(x as i32, y as i32, w.max(0) as u32, h.max(0) as u32))
}

fn kdotool(args: &[&str]) -> Result<String, WindowError> {
    run_tool("kde", "kdotool", args).map(|out| String::from_utf8_lossy(&out).trim().to_string())
}

/// Lists KWin windows through kdotool.
pub struct KdePlatform;

impl WindowPlatform for KdePlatform {
    fn name(&self) -> &'static str {
        "KWin (kdotool)"
    }

    fn probe(&self) -> Result<(), WindowError> {
        kdotool(&["--version"]).map(|_| ())
    }

    fn locate(&self, query: &TitleQuery) -> WindowListResult {
        let ids = kdotool(&["search", "--name", ""])?;

        let mut records = Vec::new();
        for id in ids.lines().map(str::trim).filter(|id| !id.is_empty()) {
            let title = kdotool(&["getwindowname", id])?;
            if !query.matches(&title) {
                continue;
            }

            let geometry = kdotool(&["getwindowgeometry", id])?;
            let region = parse_kdotool_geometry(&geometry).ok_or_else(|| {
                WindowError::EnumerationFailed(format!(
                    "unreadable geometry for {}: {}",
                    id, geometry
                ))
            })?;

            records.push(WindowRecord {
                handle: WindowHandle(id.to_string()),
                title,
                region,
                // kdotool only reports windows KWin manages as normal clients.
                is_visible: true,
                is_minimized: false,
            });
        }
        Ok(records)
    }

    fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
        let (width, height) = (target.width.to_string(), target.height.to_string());
        debug!("kdotool windowsize {} {} {}", window.handle, width, height);
        kdotool(&[
            "windowsize",
            window.handle.0.as_str(),
            width.as_str(),
            height.as_str(),
        ])
            .map(|_| ())
            .map_err(|e| WindowError::ResizeFailed {
                handle: window.handle.clone(),
                reason: e.to_string(),
            })
    }
}

fn list_xcap_windows(query: &TitleQuery) -> WindowListResult {
    let windows = xcap::Window::all().map_err(|e| {
        WindowError::EnumerationFailed(format!("xcap failed to list windows: {}", e))
    })?;

    let mut records = Vec::new();

    for window in &windows {
        let title = window.title().unwrap_or_default();
        if !query.matches(&title) {
            continue;
        }

        records.push(WindowRecord {
            handle: WindowHandle(window.id().unwrap_or(0).to_string()),
            title,
            region: Region::new(
                window.x().unwrap_or(0),
                window.y().unwrap_or(0),
                window.width().unwrap_or(0),
                window.height().unwrap_or(0),
            ),
            // xcap only enumerates mapped windows.
            is_visible: true,
            is_minimized: window.is_minimized().unwrap_or(true),
        });
    }

    Ok(records)
}

fn probe_xcap(backend: &'static str) -> Result<(), WindowError> {
    xcap::Window::all()
        .map(|_| ())
        .map_err(|e| WindowError::Unavailable {
            backend,
            reason: e.to_string(),
        })
}

/// Lists windows using xcap (X11, macOS, and the fallback everywhere else).
pub struct XcapPlatform;

impl WindowPlatform for XcapPlatform {
    fn name(&self) -> &'static str {
        "xcap"
    }

    fn probe(&self) -> Result<(), WindowError> {
        probe_xcap("xcap")
    }

    fn locate(&self, query: &TitleQuery) -> WindowListResult {
        list_xcap_windows(query)
    }

    fn correct(&self, _window: &WindowRecord, _target: &Region) -> Result<(), WindowError> {
        Err(WindowError::ResizeUnsupported("xcap"))
    }
}

/// `SetWindowPos` arguments `(x, y, cx, cy)` placing a window on `target`.
#[cfg_attr(not(windows), allow(dead_code))]
fn win32_window_pos(target: &Region) -> (i32, i32, i32, i32) {
    let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
    (target.left, target.top, clamp(target.width), clamp(target.height))
}

#[cfg(windows)]
mod win32 {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{SetWindowPos, SWP_NOZORDER, SWP_SHOWWINDOW};

    use super::*;

    /// xcap listing; xcap window ids are the HWND values.
    pub struct Win32Platform;

    impl WindowPlatform for Win32Platform {
        fn name(&self) -> &'static str {
            "Win32"
        }

        fn probe(&self) -> Result<(), WindowError> {
            probe_xcap("win32")
        }

        fn locate(&self, query: &TitleQuery) -> WindowListResult {
            list_xcap_windows(query)
        }

        fn correct(&self, window: &WindowRecord, target: &Region) -> Result<(), WindowError> {
            let failed = |reason: String| WindowError::ResizeFailed {
                handle: window.handle.clone(),
                reason,
            };
            let raw: isize = window
                .handle
                .0
                .parse()
                .map_err(|e| failed(format!("bad window handle: {}", e)))?;
            let (x, y, cx, cy) = win32_window_pos(target);
            debug!("SetWindowPos {} {} {} {} {}", raw, x, y, cx, cy);

            unsafe {
                SetWindowPos(
                    HWND(raw as *mut core::ffi::c_void),
                    None,
                    x,
                    y,
                    cx,
                    cy,
                    SWP_NOZORDER | SWP_SHOWWINDOW,
                )
            }
            .map_err(|e| failed(e.to_string()))
        }
    }
}
