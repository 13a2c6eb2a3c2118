//! Desktop session detection.
//!
//! The session decides which window backend the locator uses and the
//! default pixel density of captured frames.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    Quartz,
    Win32,
    Unknown,
}

impl std::fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayServer::Wayland => write!(f, "Wayland"),
            DisplayServer::X11 => write!(f, "X11"),
            DisplayServer::Quartz => write!(f, "Quartz"),
            DisplayServer::Win32 => write!(f, "Win32"),
            DisplayServer::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Desktops that need a dedicated window backend; everything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEnvironment {
    Gnome,
    Kde,
    Hyprland,
    Sway,
    Other(Option<String>),
}

impl std::fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesktopEnvironment::Gnome => write!(f, "GNOME"),
            DesktopEnvironment::Kde => write!(f, "KDE Plasma"),
            DesktopEnvironment::Hyprland => write!(f, "Hyprland"),
            DesktopEnvironment::Sway => write!(f, "Sway"),
            DesktopEnvironment::Other(Some(name)) => write!(f, "{}", name),
            DesktopEnvironment::Other(None) => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DesktopSession {
    pub display_server: DisplayServer,
    pub desktop_environment: DesktopEnvironment,
}

impl DesktopSession {
    pub fn detect() -> Self {
        let display_server = detect_display_server();
        let desktop_environment = detect_desktop_environment();

        Self {
            display_server,
            desktop_environment,
        }
    }

    pub fn new(display_server: DisplayServer, desktop_environment: DesktopEnvironment) -> Self {
        Self {
            display_server,
            desktop_environment,
        }
    }

    pub fn is_wayland(&self) -> bool {
        self.display_server == DisplayServer::Wayland
    }

    pub fn window_list_backend(&self) -> WindowListBackend {
        match (&self.desktop_environment, &self.display_server) {
            (DesktopEnvironment::Hyprland, DisplayServer::Wayland) => WindowListBackend::Hyprland,
            (DesktopEnvironment::Sway, DisplayServer::Wayland) => WindowListBackend::Sway,
            (DesktopEnvironment::Gnome, DisplayServer::Wayland) => WindowListBackend::GnomeWayland,
            (DesktopEnvironment::Kde, DisplayServer::Wayland) => WindowListBackend::KdeWayland,
            (_, DisplayServer::Win32) => WindowListBackend::Win32,
            _ => WindowListBackend::Xcap,
        }
    }

    /// Backing-store pixels per logical pixel expected from the grabber.
    pub fn default_scale_factor(&self) -> f32 {
        if self.display_server == DisplayServer::Quartz {
            2.0
        } else {
            1.0
        }
    }
}

impl std::fmt::Display for DesktopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.desktop_environment, self.display_server)
    }
}

/// The window enumeration strategy chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowListBackend {
    Hyprland,
    Sway,
    GnomeWayland,
    KdeWayland,
    Win32,
    Xcap,
}

impl std::fmt::Display for WindowListBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowListBackend::Hyprland => write!(f, "Hyprland (hyprctl)"),
            WindowListBackend::Sway => write!(f, "Sway (swaymsg)"),
            WindowListBackend::GnomeWayland => write!(f, "GNOME Shell (window-calls)"),
            WindowListBackend::KdeWayland => write!(f, "KWin (kdotool)"),
            WindowListBackend::Win32 => write!(f, "Win32"),
            WindowListBackend::Xcap => write!(f, "xcap"),
        }
    }
}

fn detect_display_server() -> DisplayServer {
    if cfg!(target_os = "macos") {
        return DisplayServer::Quartz;
    }

    if cfg!(target_os = "windows") {
        return DisplayServer::Win32;
    }

    if let Ok(session_type) = env::var("XDG_SESSION_TYPE") {
        match session_type.to_lowercase().as_str() {
            "wayland" => return DisplayServer::Wayland,
            "x11" => return DisplayServer::X11,
            _ => {}
        }
    }

    if env::var("WAYLAND_DISPLAY").is_ok() {
        return DisplayServer::Wayland;
    }

    if env::var("DISPLAY").is_ok() {
        return DisplayServer::X11;
    }

    DisplayServer::Unknown
}

fn detect_desktop_environment() -> DesktopEnvironment {
    if env::var("HYPRLAND_INSTANCE_SIGNATURE").is_ok() {
        return DesktopEnvironment::Hyprland;
    }

    if env::var("SWAYSOCK").is_ok() {
        return DesktopEnvironment::Sway;
    }

    match env::var("XDG_CURRENT_DESKTOP") {
        Ok(current_desktop) => desktop_from_xdg(&current_desktop),
        Err(_) => DesktopEnvironment::Other(None),
    }
}

/// Maps a colon-separated `XDG_CURRENT_DESKTOP` value to a desktop.
fn desktop_from_xdg(current_desktop: &str) -> DesktopEnvironment {
    let known = current_desktop
        .split(':')
        .find_map(|component| match component.trim().to_lowercase().as_str() {
            "gnome" | "unity" | "ubuntu" | "pop" => Some(DesktopEnvironment::Gnome),
            "kde" | "plasma" | "kde-plasma" => Some(DesktopEnvironment::Kde),
            "hyprland" => Some(DesktopEnvironment::Hyprland),
            "sway" => Some(DesktopEnvironment::Sway),
            _ => None,
        });

    known.unwrap_or_else(|| {
        let name = current_desktop.trim();
        DesktopEnvironment::Other((!name.is_empty()).then(|| name.to_string()))
    })
}
