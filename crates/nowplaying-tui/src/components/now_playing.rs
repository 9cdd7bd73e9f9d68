//! NowPlaying component — right pane: labels, artwork, transport and buffer.

use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    screen::{ScreenView, Transition},
    theme::{
        status_color, C_ACCENT, C_FLASH, C_MUTED, C_NETWORK, C_PLAYING, C_PRIMARY, C_SECONDARY,
    },
    widgets::{
        buffer_view::draw_buffer_view,
        pane_chrome::{pane_chrome, Badge},
    },
};

/// How long a transition highlight stays on screen.
const TRANSITION_HOLD: Duration = Duration::from_millis(600);
const BAR_COUNT: usize = 5;
const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub struct NowPlaying;

impl NowPlaying {
    pub fn new() -> Self {
        Self
    }
}

/// The transition still worth rendering at `now`, if any.
fn active_transition(view: &ScreenView, now: Instant) -> Option<Transition> {
    view.transition
        .filter(|(_, started)| now.saturating_duration_since(*started) < TRANSITION_HOLD)
        .map(|(t, _)| t)
}

/// Now-playing bars for a UI frame; flat when not animating.
fn bars(frame: u64, animating: bool) -> String {
    (0..BAR_COUNT)
        .map(|i| {
            if !animating {
                return BAR_GLYPHS[0];
            }
            let i = i as u64;
            let level = (frame * (i + 3) + i * 5) % (BAR_GLYPHS.len() as u64 * 2 - 2);
            // Triangle wave: up then back down.
            let level = if level >= BAR_GLYPHS.len() as u64 {
                BAR_GLYPHS.len() as u64 * 2 - 2 - level
            } else {
                level
            };
            BAR_GLYPHS[level as usize]
        })
        .flat_map(|c| [c, ' '])
        .collect()
}

fn control<'a>(label: &'a str, enabled: bool) -> Span<'a> {
    if enabled {
        Span::styled(label, Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD))
    } else {
        Span::styled(label, Style::default().fg(C_MUTED))
    }
}

impl Component for NowPlaying {
    fn id(&self) -> ComponentId {
        ComponentId::NowPlaying
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Esc => vec![Action::LeaveScreen],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let screen = &state.screen;
        let view = screen.view();
        let track = screen.track();
        let title = screen
            .station()
            .map(|s| s.name.as_str())
            .unwrap_or("Now Playing");
        let block = pane_chrome(
            title,
            focused,
            Some(Badge {
                text: view.status.label(),
                color: status_color(view.status),
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if screen.station().is_none() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "Pick a station and press Enter",
                    Style::default().fg(C_MUTED),
                ))),
                inner,
            );
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // song + artist
                Constraint::Length(1), // artwork
                Constraint::Min(1),    // description
                Constraint::Length(1), // bars
                Constraint::Length(1), // transport
                Constraint::Length(1), // volume
                Constraint::Length(1), // buffer
            ])
            .split(inner);

        let transition = active_transition(view, Instant::now());

        // ── Labels ────────────────────────────────────────────────────────────
        let mut song_style = Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD);
        match transition {
            Some(Transition::Flash) => song_style = song_style.fg(C_FLASH),
            Some(Transition::ZoomIn) => song_style = song_style.add_modifier(Modifier::UNDERLINED),
            _ => {}
        }
        let labels = vec![
            Line::from(Span::styled(screen.song_label(), song_style)),
            Line::from(Span::styled(
                screen.artist_label(),
                Style::default().fg(C_SECONDARY),
            )),
        ];
        frame.render_widget(Paragraph::new(labels), rows[0]);

        // ── Artwork descriptor ────────────────────────────────────────────────
        let art = track
            .artwork_image
            .as_ref()
            .map(|img| img.describe())
            .unwrap_or_else(|| "…".to_string());
        let wobble = if transition == Some(Transition::Wobble) && state.frame % 2 == 0 {
            " "
        } else {
            ""
        };
        let art_state = if track.artwork_loaded { "" } else { " (loading)" };
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::raw(wobble),
                Span::styled("art ", Style::default().fg(C_MUTED)),
                Span::styled(art, Style::default().fg(C_NETWORK)),
                Span::styled(art_state, Style::default().fg(C_MUTED)),
            ])),
            rows[1],
        );

        // ── Station description ───────────────────────────────────────────────
        if !view.description_hidden {
            let description = screen
                .open_station_info()
                .map(|s| s.description.as_str())
                .unwrap_or("");
            frame.render_widget(
                Paragraph::new(description)
                    .style(Style::default().fg(C_SECONDARY))
                    .wrap(Wrap { trim: true }),
                rows[2],
            );
        }

        // ── Bars ──────────────────────────────────────────────────────────────
        frame.render_widget(
            Paragraph::new(Span::styled(
                bars(state.frame, view.animating),
                Style::default().fg(C_PLAYING),
            )),
            rows[3],
        );

        // ── Transport ─────────────────────────────────────────────────────────
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                control("« rew", view.rewind_enabled),
                Span::raw("   "),
                control("▶ play", view.play_enabled),
                Span::raw("   "),
                control("⏸ pause", view.pause_enabled),
                Span::raw("   "),
                control("ff »", view.fast_forward_enabled),
            ])),
            rows[4],
        );

        // ── Volume ────────────────────────────────────────────────────────────
        frame.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(C_ACCENT))
                .ratio(f64::from(view.volume.clamp(0.0, 1.0)))
                .label(format!("vol {:.0}%", view.volume * 100.0)),
            rows[5],
        );

        // ── Buffer ────────────────────────────────────────────────────────────
        draw_buffer_view(frame, rows[6], &view.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_flat_when_idle() {
        assert_eq!(bars(7, false), "▁ ▁ ▁ ▁ ▁ ");
    }

    #[test]
    fn test_bars_move_when_animating() {
        let a = bars(1, true);
        let b = bars(2, true);
        assert_eq!(a.chars().count(), BAR_COUNT * 2);
        assert_ne!(a, b);
    }
}
