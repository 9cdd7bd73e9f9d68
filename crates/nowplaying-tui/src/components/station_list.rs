//! StationList component — left pane.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState},
    Frame,
};

use nowplaying_proto::protocol::PlaybackStatus;
use nowplaying_proto::station::RadioStation;

use crate::{
    action::{Action, ComponentId},
    app_state::{AppState, LastTrack},
    component::Component,
    theme::{status_color, C_MUTED, C_PRIMARY, C_SECONDARY, C_SELECTION_BG, C_TAG},
    widgets::pane_chrome::pane_chrome,
};

pub struct StationList {
    selected: usize,
    list_state: ListState,
}

impl StationList {
    pub fn new() -> Self {
        Self {
            selected: 0,
            list_state: ListState::default(),
        }
    }

    #[cfg(test)]
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_up(&mut self, step: usize) {
        self.selected = self.selected.saturating_sub(step);
    }

    pub fn select_down(&mut self, step: usize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + step).min(len - 1);
    }

    fn render_item<'a>(
        &self,
        station: &'a RadioStation,
        idx: usize,
        state: &AppState,
    ) -> ListItem<'a> {
        let is_current = state.active_station == Some(idx);
        let is_selected = self.selected == idx;
        let status = state.screen.view().status;

        let (icon, icon_color) = if is_current {
            let icon = match status {
                PlaybackStatus::Playing => "▶",
                PlaybackStatus::Paused => "⏸",
                PlaybackStatus::Loading => "⋯",
                PlaybackStatus::Idle => "■",
            };
            (icon, status_color(status))
        } else {
            (" ", C_MUTED)
        };

        let name_color = if is_current {
            status_color(status)
        } else if is_selected {
            C_PRIMARY
        } else {
            C_SECONDARY
        };
        let name_style = if is_current || is_selected {
            Style::default().fg(name_color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(name_color)
        };

        let mut spans = vec![
            Span::styled(icon, Style::default().fg(icon_color)),
            Span::raw("  "),
            Span::styled(station.name.as_str(), name_style),
        ];
        if let Some(subtitle) = state.last_tracks.get(&station.name).and_then(row_subtitle) {
            spans.push(Span::styled("  ", Style::default()));
            spans.push(Span::styled(subtitle, Style::default().fg(C_TAG)));
        }

        let item_bg = if is_selected {
            Style::default().bg(C_SELECTION_BG)
        } else {
            Style::default()
        };
        ListItem::new(Line::from(spans)).style(item_bg)
    }
}

/// "artist – title" for a station row, or None before anything was heard.
fn row_subtitle(last: &LastTrack) -> Option<String> {
    match (last.artist.is_empty(), last.title.is_empty()) {
        (true, true) => None,
        (true, false) => Some(last.title.clone()),
        (false, true) => Some(last.artist.clone()),
        (false, false) => Some(format!("{} – {}", last.artist, last.title)),
    }
}

impl Component for StationList {
    fn id(&self) -> ComponentId {
        ComponentId::StationList
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let len = state.stations.len();
        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.select_down(step, len),
            KeyCode::PageUp => self.select_up(10),
            KeyCode::PageDown => self.select_down(10, len),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.select_down(len, len),
            KeyCode::Enter if len > 0 => return vec![Action::EnterStation(self.selected)],
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::EnterStation(idx) = action {
            self.selected = *idx;
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let title = format!("Stations ({})", state.stations.len());
        let block = pane_chrome(&title, focused, None);

        let items: Vec<ListItem> = state
            .stations
            .iter()
            .enumerate()
            .map(|(idx, station)| self.render_item(station, idx, state))
            .collect();

        self.list_state.select(if items.is_empty() {
            None
        } else {
            Some(self.selected)
        });
        frame.render_stateful_widget(List::new(items).block(block), area, &mut self.list_state);
    }
}
