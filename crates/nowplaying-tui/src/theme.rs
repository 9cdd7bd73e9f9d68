//! Color palette and style constants for the now-playing TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_CONNECTING: Color = Color::Rgb(255, 184, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SELECTION_BG: Color = Color::Rgb(28, 28, 40);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(120, 100, 200);
pub const C_OVERLAY_BG: Color = Color::Rgb(18, 18, 26);
pub const C_TAG: Color = Color::Rgb(80, 140, 200);
pub const C_NETWORK: Color = Color::Rgb(180, 120, 220);
pub const C_FLASH: Color = Color::Rgb(255, 240, 200);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_focused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER_FOCUSED)
}

pub fn style_unfocused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_title(focused: bool) -> Style {
    if focused {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_MUTED)
    }
}

/// Color for a playback status badge or row icon.
pub fn status_color(status: nowplaying_proto::protocol::PlaybackStatus) -> Color {
    use nowplaying_proto::protocol::PlaybackStatus;
    match status {
        PlaybackStatus::Playing => C_PLAYING,
        PlaybackStatus::Loading | PlaybackStatus::Paused => C_CONNECTING,
        PlaybackStatus::Idle => C_MUTED,
    }
}
