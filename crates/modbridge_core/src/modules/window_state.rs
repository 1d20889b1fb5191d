//! Host window chrome state shared with the system UI module.
//!
//! Registered as an internal service; the embedding host may hold the same
//! `Arc` to observe or seed bar colors, styles and appearance.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{2})?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$")
        .expect("valid hex color regex")
});

/// Opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parses `#rrggbb` or `#aarrggbb`, any case; alpha is discarded.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let captures = HEX_COLOR_RE.captures(value.trim())?;
        let channel = |index: usize| u8::from_str_radix(captures.get(index)?.as_str(), 16).ok();
        Some(Self::new(channel(1)?, channel(2)?, channel(3)?))
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Foreground (icon/text) style of a system bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarStyle {
    Light,
    #[default]
    Dark,
}

impl BarStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Appearance {
    Light,
    Dark,
    Auto,
    #[default]
    Unspecified,
}

impl Appearance {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "auto" => Some(Self::Auto),
            "unspecified" => Some(Self::Unspecified),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
            Self::Unspecified => "unspecified",
        }
    }
}

/// Point-in-time copy of the window chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub status_bar_color: Rgb,
    pub status_bar_style: BarStyle,
    pub navigation_bar_color: Rgb,
    pub navigation_bar_style: BarStyle,
    pub navigation_bar_divider_color: Rgb,
    pub system_bars_visible: bool,
    pub appearance: Appearance,
}

impl Default for WindowSnapshot {
    fn default() -> Self {
        Self {
            status_bar_color: Rgb::new(0, 0, 0),
            status_bar_style: BarStyle::Light,
            navigation_bar_color: Rgb::new(0, 0, 0),
            navigation_bar_style: BarStyle::Light,
            navigation_bar_divider_color: Rgb::new(0, 0, 0),
            system_bars_visible: true,
            appearance: Appearance::Unspecified,
        }
    }
}

#[derive(Debug, Default)]
pub struct WindowState {
    snapshot: Mutex<WindowSnapshot>,
    divider_supported: bool,
}

impl WindowState {
    pub fn new(divider_supported: bool) -> Self {
        Self {
            snapshot: Mutex::new(WindowSnapshot::default()),
            divider_supported,
        }
    }

    /// Whether the host window exposes a navigation bar divider.
    pub fn divider_supported(&self) -> bool {
        self.divider_supported
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        *self.snapshot.lock()
    }

    /// Applies `change` under the lock and returns the new snapshot.
    pub fn update(&self, change: impl FnOnce(&mut WindowSnapshot)) -> WindowSnapshot {
        let mut snapshot = self.snapshot.lock();
        change(&mut snapshot);
        *snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::{Appearance, BarStyle, Rgb, WindowState};

    #[test]
    fn parses_rgb_and_argb_hex() {
        assert_eq!(Rgb::parse_hex("#FF8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse_hex("#80ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse_hex(" #0a0B0c "), Some(Rgb::new(10, 11, 12)));
        assert_eq!(Rgb::parse_hex("ff8000"), None);
        assert_eq!(Rgb::parse_hex("#ff80"), None);
        assert_eq!(Rgb::parse_hex("#gg0000"), None);
        assert_eq!(Rgb::new(255, 128, 0).to_hex(), "#ff8000");
    }

    #[test]
    fn styles_and_appearance_round_trip_labels() {
        for label in ["light", "dark"] {
            assert_eq!(BarStyle::parse(label).map(BarStyle::as_str), Some(label));
        }
        for label in ["light", "dark", "auto", "unspecified"] {
            assert_eq!(Appearance::parse(label).map(Appearance::as_str), Some(label));
        }
        assert!(BarStyle::parse("Light").is_none());
        assert!(Appearance::parse("night").is_none());
    }

    #[test]
    fn update_returns_new_snapshot() {
        let state = WindowState::new(true);
        let snapshot = state.update(|window| window.system_bars_visible = false);
        assert!(!snapshot.system_bars_visible);
        assert_eq!(state.snapshot(), snapshot);
    }
}
