//! Stream buffer strip: how much of the byte budget is held, and where the
//! playhead sits inside it.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use nowplaying_proto::protocol::BufferStats;

use crate::theme::{C_ACCENT, C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

pub fn draw_buffer_view(frame: &mut Frame, area: Rect, stats: &BufferStats) {
    if area.width < 8 || area.height == 0 {
        return;
    }

    let label = format!(" {}/{}", fmt_bytes(stats.current_usage), fmt_bytes(stats.max_size));
    let bar_w = (area.width as usize).saturating_sub(label.chars().count()).max(4);
    let (bar, playhead) = render_bar(bar_w, stats.fill(), stats.playhead());

    // Split the bar around the playhead glyph so it can take its own color.
    let mut spans = Vec::with_capacity(4);
    let before: String = bar.chars().take(playhead).collect();
    let after: String = bar.chars().skip(playhead + 1).collect();
    spans.push(Span::styled(before, Style::default().fg(C_PLAYING)));
    spans.push(Span::styled("│", Style::default().fg(C_ACCENT)));
    spans.push(Span::styled(after, Style::default().fg(C_MUTED)));
    spans.push(Span::styled(label, Style::default().fg(C_SECONDARY)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Eighth-block bar of `width` cells filled to `fill`, plus the playhead cell.
fn render_bar(width: usize, fill: f64, playhead: f64) -> (String, usize) {
    let eighths = (fill.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full_blocks.min(width) {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }

    let head = ((playhead.clamp(0.0, 1.0) * width as f64) as usize).min(width - 1);
    (bar, head)
}

fn fmt_bytes(n: u64) -> String {
    const KIB: f64 = 1024.0;
    let n = n as f64;
    if n >= KIB * KIB {
        format!("{:.1}M", n / (KIB * KIB))
    } else if n >= KIB {
        format!("{:.0}K", n / KIB)
    } else {
        format!("{}B", n as u64)
    }
}
