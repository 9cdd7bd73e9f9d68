//! App — component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - Terminal input and track-listener notices arrive as `AppMessage` on one channel;
//!   the now-playing screen's inbox is a second channel drained by the same loop.
//! - Components return `Vec<Action>`; App dispatches each Action.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use nowplaying_proto::protocol::SeekDirection;
use nowplaying_proto::station::RadioStation;
use nowplaying_proto::track::Track;

use crate::{
    action::{Action, ComponentId},
    app_state::{AppState, LastTrack},
    component::Component,
    components::{info_overlay::InfoOverlay, now_playing::NowPlaying, station_list::StationList},
    screen::{NowPlayingScreen, ScreenCommand, ScreenMessage, TrackListener},
    widgets::status_bar,
};

// ── Internal event bus ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AppMessage {
    Event(Event),
    /// The screen's listener saw new metadata or artwork for `station`.
    TrackUpdated { station: String, last: LastTrack },
}

/// Without key-release reporting, a held arrow is considered released once
/// neither a press nor a repeat has arrived for this long.
const SEEK_HOLD_WATCHDOG: Duration = Duration::from_millis(500);
const VOLUME_STEP: f32 = 0.05;
const MAX_DRAIN: usize = 256;

// ── Track listener ────────────────────────────────────────────────────────────

/// Forwards screen notifications to the station list, tagged with the station
/// that was on screen when the callback fired.
pub struct ChannelListener {
    tx: mpsc::Sender<AppMessage>,
    station: Arc<Mutex<Option<String>>>,
}

impl ChannelListener {
    /// `station` is the same handle later given to `App::new`.
    pub fn new(tx: mpsc::Sender<AppMessage>, station: Arc<Mutex<Option<String>>>) -> Self {
        Self { tx, station }
    }

    fn forward(&self, track: &Track) {
        let station = self
            .station
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(station) = station else {
            return;
        };
        let last = LastTrack {
            artist: track.artist.clone(),
            title: track.title.clone(),
            artwork: track.artwork_image.as_ref().map(|img| img.describe()),
        };
        if let Err(e) = self.tx.try_send(AppMessage::TrackUpdated { station, last }) {
            warn!("track listener: dropping notice: {}", e);
        }
    }
}

impl TrackListener for ChannelListener {
    fn on_track_metadata_updated(&mut self, track: &Track) {
        self.forward(track);
    }

    fn on_artwork_updated(&mut self, track: &Track) {
        self.forward(track);
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    state: AppState,
    station_list: StationList,
    now_playing: NowPlaying,
    info_overlay: InfoOverlay,
    focus: ComponentId,
    should_quit: bool,
    /// Terminal reports key release events.
    release_events: bool,
    /// Arrow currently held for seeking, and when it was last seen.
    held_seek: Option<(SeekDirection, Instant)>,
    /// Station name shared with the track listener.
    listener_station: Arc<Mutex<Option<String>>>,
    /// Feeds the input thread's events into the loop.
    tx: mpsc::Sender<AppMessage>,
}

impl App {
    /// `screen` should already carry a `ChannelListener` built from `tx` and
    /// `listener_station`.
    pub fn new(
        stations: Vec<Arc<RadioStation>>,
        screen: NowPlayingScreen,
        tx: mpsc::Sender<AppMessage>,
        listener_station: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            state: AppState::new(stations, screen),
            station_list: StationList::new(),
            now_playing: NowPlaying::new(),
            info_overlay: InfoOverlay::new(),
            focus: ComponentId::StationList,
            should_quit: false,
            release_events: false,
            held_seek: None,
            listener_station,
            tx,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<AppMessage>,
        mut screen_rx: mpsc::Receiver<ScreenMessage>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        self.release_events = matches!(supports_keyboard_enhancement(), Ok(true));
        if self.release_events {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        info!("key release events: {}", self.release_events);

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // ── Background task: keyboard events ──────────────────────────────────
        let input_tx = self.tx.clone();
        tokio::task::spawn_blocking(move || loop {
            if input_tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(250)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if input_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        // Animation, transition expiry and the seek-hold watchdog.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    self.handle_message(msg);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        match rx.try_recv() {
                            Ok(next) => self.handle_message(next),
                            Err(_) => break,
                        }
                        drained += 1;
                    }
                    needs_redraw = true;
                }

                Some(msg) = screen_rx.recv() => {
                    self.state.screen.handle(msg);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        match screen_rx.try_recv() {
                            Ok(next) => self.state.screen.handle(next),
                            Err(_) => break,
                        }
                        drained += 1;
                    }
                    needs_redraw = true;
                }

                _ = ui_tick.tick() => {
                    self.on_tick();
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.state.screen.shutdown();
        if self.release_events {
            execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
        }
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action);
                }
            }
            AppMessage::Event(_) => {}
            AppMessage::TrackUpdated { station, last } => {
                self.state.last_tracks.insert(station, last);
            }
        }
    }

    fn on_tick(&mut self) {
        self.state.frame = self.state.frame.wrapping_add(1);

        let mut actions = Vec::new();
        actions.extend(self.station_list.tick(&self.state));
        actions.extend(self.now_playing.tick(&self.state));
        if !self.release_events {
            if let Some((_, last_seen)) = self.held_seek {
                if last_seen.elapsed() >= SEEK_HOLD_WATCHDOG {
                    debug!("seek hold watchdog fired");
                    actions.push(Action::SeekRelease);
                }
            }
        }
        for action in actions {
            self.dispatch(action);
        }
    }

    // ── Keys ──────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // Info overlay captures all keys when visible
        if self.info_overlay.visible {
            return self.info_overlay.handle_key(key, &self.state);
        }

        let held = self.held_seek.map(|(dir, _)| dir);
        if let Some(seek) = seek_key(&key, held) {
            if let Some((_, last_seen)) = self.held_seek.as_mut() {
                *last_seen = Instant::now();
            }
            return seek.into_iter().collect();
        }

        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char(' ') | KeyCode::Char('p') => return vec![Action::Play],
            KeyCode::Char('s') => return vec![Action::Pause],
            KeyCode::Char('+') | KeyCode::Char('=') => return vec![Action::VolumeStep(VOLUME_STEP)],
            KeyCode::Char('-') => return vec![Action::VolumeStep(-VOLUME_STEP)],
            KeyCode::Char('i') => return vec![Action::ToggleInfo],
            KeyCode::Esc => return vec![Action::LeaveScreen],
            KeyCode::Tab | KeyCode::BackTab => {
                let next = match self.focus {
                    ComponentId::StationList => ComponentId::NowPlaying,
                    _ => ComponentId::StationList,
                };
                return vec![Action::FocusPane(next)];
            }
            _ => {}
        }

        match self.focus {
            ComponentId::NowPlaying => self.now_playing.handle_key(key, &self.state),
            _ => self.station_list.handle_key(key, &self.state),
        }
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    fn dispatch(&mut self, action: Action) {
        let mut follow_up = Vec::new();
        follow_up.extend(self.station_list.on_action(&action, &self.state));
        follow_up.extend(self.now_playing.on_action(&action, &self.state));
        follow_up.extend(self.info_overlay.on_action(&action, &self.state));

        self.apply_action(action);
        for action in follow_up {
            self.dispatch(action);
        }
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::EnterStation(idx) => {
                let Some(station) = self.state.stations.get(idx).cloned() else {
                    warn!("enter: no station at index {}", idx);
                    return;
                };
                info!("enter station {:?}", station.name);
                self.state.active_station = Some(idx);
                *self
                    .listener_station
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(station.name.clone());
                self.screen_command(ScreenCommand::Enter(station));
                self.focus = ComponentId::NowPlaying;
            }
            Action::LeaveScreen => {
                self.held_seek = None;
                self.screen_command(ScreenCommand::Leave);
                self.focus = ComponentId::StationList;
            }
            Action::Play => self.screen_command(ScreenCommand::Play),
            Action::Pause => self.screen_command(ScreenCommand::Pause),
            Action::SeekPress(direction) => {
                self.held_seek = Some((direction, Instant::now()));
                self.screen_command(ScreenCommand::SeekPress(direction));
            }
            Action::SeekRelease => {
                self.held_seek = None;
                self.screen_command(ScreenCommand::SeekRelease);
            }
            Action::VolumeStep(delta) => self.screen_command(ScreenCommand::AdjustVolume(delta)),
            Action::FocusPane(id) => self.focus = id,
            Action::ToggleInfo => {}
            Action::Quit => self.should_quit = true,
        }
    }

    fn screen_command(&mut self, cmd: ScreenCommand) {
        self.state.screen.handle(ScreenMessage::Command(cmd));
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        use crate::theme::C_BG;
        use ratatui::widgets::Block;
        let area = frame.area();

        frame.render_widget(
            Block::default().style(ratatui::style::Style::default().bg(C_BG)),
            area,
        );

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
            .split(outer[0]);

        let focus = self.focus;
        self.station_list
            .draw(frame, body[0], focus == ComponentId::StationList, &self.state);
        self.now_playing
            .draw(frame, body[1], focus == ComponentId::NowPlaying, &self.state);

        let view = self.state.screen.view();
        status_bar::draw_keys_bar(frame, outer[1], view.status, view.volume);

        // Info overlay on top of everything
        self.info_overlay.draw(frame, area, false, &self.state);
    }
}

/// Map an arrow key to a seek action given the direction currently held.
///
/// `Some(None)` means the key belongs to seeking but needs no new action
/// (terminal auto-repeat of the held arrow).
fn seek_key(key: &KeyEvent, held: Option<SeekDirection>) -> Option<Option<Action>> {
    let direction = match key.code {
        KeyCode::Left => SeekDirection::Rewind,
        KeyCode::Right => SeekDirection::FastForward,
        _ => return None,
    };
    let action = match key.kind {
        KeyEventKind::Release if held == Some(direction) => Some(Action::SeekRelease),
        KeyEventKind::Release => None,
        _ if held == Some(direction) => None,
        _ => Some(Action::SeekPress(direction)),
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_seek_key_press_repeat_release() {
        let press = key(KeyCode::Right, KeyEventKind::Press);
        assert_eq!(
            seek_key(&press, None),
            Some(Some(Action::SeekPress(SeekDirection::FastForward)))
        );
        // Auto-repeat while held is absorbed.
        assert_eq!(seek_key(&press, Some(SeekDirection::FastForward)), Some(None));
        let repeat = key(KeyCode::Right, KeyEventKind::Repeat);
        assert_eq!(seek_key(&repeat, Some(SeekDirection::FastForward)), Some(None));

        let release = key(KeyCode::Right, KeyEventKind::Release);
        assert_eq!(
            seek_key(&release, Some(SeekDirection::FastForward)),
            Some(Some(Action::SeekRelease))
        );
        assert_eq!(seek_key(&release, None), Some(None));
    }

    #[test]
    fn test_switching_arrow_starts_new_press() {
        let left = key(KeyCode::Left, KeyEventKind::Press);
        assert_eq!(
            seek_key(&left, Some(SeekDirection::FastForward)),
            Some(Some(Action::SeekPress(SeekDirection::Rewind)))
        );
        assert_eq!(seek_key(&key(KeyCode::Up, KeyEventKind::Press), None), None);
    }

    #[tokio::test]
    async fn test_listener_tags_notices_with_station() {
        let (tx, mut rx) = mpsc::channel(4);
        let station = Arc::new(Mutex::new(None));
        let mut listener = ChannelListener::new(tx, station.clone());
        let track = Track {
            artist: "Bonobo".into(),
            title: "Kerala".into(),
            ..Track::default()
        };

        // Nothing on screen yet: nothing forwarded.
        listener.on_track_metadata_updated(&track);
        assert!(rx.try_recv().is_err());

        *station.lock().unwrap() = Some("Groove Salad".into());
        listener.on_track_metadata_updated(&track);
        match rx.try_recv() {
            Ok(AppMessage::TrackUpdated { station, last }) => {
                assert_eq!(station, "Groove Salad");
                assert_eq!(last.title, "Kerala");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
