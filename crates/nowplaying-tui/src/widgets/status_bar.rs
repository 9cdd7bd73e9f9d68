//! Status bar — bottom line with playback mode and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use nowplaying_proto::protocol::PlaybackStatus;

use crate::theme::{status_color, C_MUTED};

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, status: PlaybackStatus, volume: f32) {
    let spans = vec![
        Span::styled(
            format!(" {} ", status.label()),
            Style::default()
                .fg(status_color(status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("vol {:>3}% ", (volume * 100.0).round() as u32),
            Style::default().fg(C_MUTED),
        ),
        Span::styled(
            " ↑↓/jk select  Enter tune in  Esc leave  Space/p play  s pause  ←→ hold to seek  +/- vol  i info  q quit",
            Style::default().fg(C_MUTED),
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
