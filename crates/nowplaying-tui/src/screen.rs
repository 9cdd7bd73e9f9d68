//! The now-playing screen: owns the current `Track`, reacts to engine
//! callbacks and transport commands, and refreshes metadata and artwork.
//!
//! Everything here runs on the single UI task.  Background work (artwork
//! downloads, album-art lookups, the seek-repeat and buffer timers) only ever
//! posts a `ScreenMessage` back into the inbox; `handle` applies it.  Each
//! async completion carries a generation so results that were superseded by a
//! newer station or track are dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nowplaying_proto::config::EngineConfig;
use nowplaying_proto::metadata::split_track_metadata;
use nowplaying_proto::protocol::{BufferStats, PlaybackStatus, SeekDirection};
use nowplaying_proto::station::RadioStation;
use nowplaying_proto::track::{ArtworkImage, Track};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artwork::{ArtworkError, ArtworkFetcher};
use crate::engine::{EngineEvent, StreamingEngine};
use crate::lock_screen::NowPlayingCenter;
use crate::lookup::{LookupError, MetadataLookup};

const STATUS_LOADING: &str = "Loading Station...";
const STATUS_CONNECTING: &str = "Connecting to Station...";
const STATUS_BUFFERING: &str = "Buffering...";
const STATUS_PAUSED: &str = "Station Paused...";
const STATUS_NO_NETWORK: &str = "No Network Found...";

/// Everything the screen inbox carries.
#[derive(Debug)]
pub enum ScreenMessage {
    Engine(EngineEvent),
    Command(ScreenCommand),
    ArtworkFetched {
        generation: u64,
        result: Result<ArtworkImage, ArtworkError>,
    },
    AlbumArtResolved {
        generation: u64,
        result: Result<Option<String>, LookupError>,
    },
    SeekRepeat {
        direction: SeekDirection,
        session: u64,
    },
    BufferStats(BufferStats),
}

/// Transport and lifecycle requests from the keyboard or the HTTP API.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCommand {
    Enter(Arc<RadioStation>),
    Leave,
    Play,
    Pause,
    SeekPress(SeekDirection),
    SeekRelease,
    SetVolume(f32),
    AdjustVolume(f32),
}

/// Receives track updates.  At most one listener is attached at a time.
pub trait TrackListener: Send {
    fn on_track_metadata_updated(&mut self, track: &Track);
    fn on_artwork_updated(&mut self, track: &Track);
}

/// Short decorative highlights the front end renders for a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Station selected or playback resumed.
    Flash,
    /// New song metadata.
    ZoomIn,
    /// Remote artwork arrived.
    Wobble,
}

/// Control state the front end renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenView {
    pub status: PlaybackStatus,
    pub status_text: Option<String>,
    pub play_enabled: bool,
    pub pause_enabled: bool,
    pub rewind_enabled: bool,
    pub fast_forward_enabled: bool,
    pub description_hidden: bool,
    /// Now-playing bars animation.
    pub animating: bool,
    pub transition: Option<(Transition, Instant)>,
    pub buffer: BufferStats,
    pub volume: f32,
}

impl ScreenView {
    fn new(volume: f32) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            status_text: None,
            play_enabled: true,
            pause_enabled: false,
            rewind_enabled: false,
            fast_forward_enabled: false,
            description_hidden: false,
            animating: false,
            transition: None,
            buffer: BufferStats::default(),
            volume,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenSettings {
    pub seek_step_secs: f64,
    pub seek_repeat: Duration,
    pub buffer_refresh: Duration,
    pub default_volume: f32,
}

impl From<&EngineConfig> for ScreenSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            seek_step_secs: config.seek_step_secs,
            seek_repeat: Duration::from_millis(config.seek_repeat_ms.max(1)),
            buffer_refresh: Duration::from_millis(config.buffer_refresh_ms.max(1)),
            default_volume: config.default_volume.clamp(0.0, 1.0),
        }
    }
}

/// Collaborators the screen talks to.
#[derive(Clone)]
pub struct ScreenDeps {
    pub engine: Arc<dyn StreamingEngine>,
    pub lookup: Arc<dyn MetadataLookup>,
    pub fetcher: Arc<dyn ArtworkFetcher>,
    pub center: Arc<NowPlayingCenter>,
}

pub struct NowPlayingScreen {
    deps: ScreenDeps,
    settings: ScreenSettings,
    inbox: mpsc::Sender<ScreenMessage>,

    station: Option<Arc<RadioStation>>,
    track: Track,
    view: ScreenView,
    listener: Option<Box<dyn TrackListener>>,

    artwork_generation: u64,
    artwork_task: Option<JoinHandle<()>>,
    lookup_generation: u64,
    lookup_task: Option<JoinHandle<()>>,

    seek_session: u64,
    held_seek: Option<SeekDirection>,
    seek_timer: Option<JoinHandle<()>>,
    buffer_timer: Option<JoinHandle<()>>,
}

impl NowPlayingScreen {
    /// `inbox` is the sending half of the channel whose receiver feeds
    /// `handle`; background work posts its results there.  `listener` is
    /// subscribed for the screen's whole lifetime (see `shutdown`).
    pub fn new(
        deps: ScreenDeps,
        settings: ScreenSettings,
        inbox: mpsc::Sender<ScreenMessage>,
        listener: Option<Box<dyn TrackListener>>,
    ) -> Self {
        let mut screen = Self {
            deps,
            settings,
            inbox,
            station: None,
            track: Track::new(),
            view: ScreenView::new(settings.default_volume),
            listener: None,
            artwork_generation: 0,
            artwork_task: None,
            lookup_generation: 0,
            lookup_task: None,
            seek_session: 0,
            held_seek: None,
            seek_timer: None,
            buffer_timer: None,
        };
        if let Some(listener) = listener {
            screen.subscribe(listener);
        }
        screen
    }

    // ── accessors ─────────────────────────────────────────────────────────────

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn station(&self) -> Option<&RadioStation> {
        self.station.as_deref()
    }

    pub fn view(&self) -> &ScreenView {
        &self.view
    }

    /// Upper label: the status message while one is shown, else the song.
    pub fn song_label(&self) -> &str {
        match &self.view.status_text {
            Some(text) => text.as_str(),
            None => self.track.title.as_str(),
        }
    }

    /// Lower label: the station name while a status message is shown, else the artist.
    pub fn artist_label(&self) -> &str {
        match (&self.view.status_text, &self.station) {
            (Some(_), Some(station)) => station.name.as_str(),
            _ => self.track.artist.as_str(),
        }
    }

    /// Station descriptor for the info overlay.
    pub fn open_station_info(&self) -> Option<&RadioStation> {
        self.station.as_deref()
    }

    // ── listener ──────────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: Box<dyn TrackListener>) {
        self.listener = Some(listener);
    }

    pub fn unsubscribe(&mut self) {
        self.listener = None;
    }

    fn notify_metadata(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_track_metadata_updated(&self.track);
        }
    }

    fn notify_artwork(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_artwork_updated(&self.track);
        }
    }

    // ── inbox ─────────────────────────────────────────────────────────────────

    pub fn handle(&mut self, msg: ScreenMessage) {
        match msg {
            ScreenMessage::Engine(evt) => self.on_engine_event(evt),
            ScreenMessage::Command(cmd) => self.on_command(cmd),
            ScreenMessage::ArtworkFetched { generation, result } => {
                self.on_artwork_fetched(generation, result)
            }
            ScreenMessage::AlbumArtResolved { generation, result } => {
                self.on_album_art_resolved(generation, result)
            }
            ScreenMessage::SeekRepeat { direction, session } => {
                if session != self.seek_session || self.held_seek != Some(direction) {
                    debug!("screen: stale seek tick (session {})", session);
                    return;
                }
                self.seek(direction);
            }
            ScreenMessage::BufferStats(stats) => {
                self.view.buffer = stats;
                self.refresh_audio_buttons();
            }
        }
    }

    fn on_command(&mut self, cmd: ScreenCommand) {
        match cmd {
            ScreenCommand::Enter(station) => self.enter(station),
            ScreenCommand::Leave => self.leave(),
            ScreenCommand::Play => self.play(),
            ScreenCommand::Pause => self.pause(),
            ScreenCommand::SeekPress(direction) => self.seek_press(direction),
            ScreenCommand::SeekRelease => self.seek_release(),
            ScreenCommand::SetVolume(v) => self.set_volume(v),
            ScreenCommand::AdjustVolume(delta) => self.set_volume(self.view.volume + delta),
        }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────────

    /// Show the screen for `station`.  Re-entering the station already on
    /// screen keeps its track and playback state.
    pub fn enter(&mut self, station: Arc<RadioStation>) {
        if self.station.as_ref() != Some(&station) {
            self.track = Track::new();
            self.select_station(station);
            return;
        }

        debug!("screen: re-enter {}", station.name);
        if self.track.is_playing {
            self.view.animating = true;
        } else {
            self.apply_paused_controls();
        }
        // `leave` may have dropped a fetch or lookup that was still running.
        if !self.track.artwork_loaded {
            self.resolve_artwork();
            if !self.track.title.is_empty() {
                self.query_album_art();
            }
        }
        self.refresh_audio_buttons();
        self.start_buffer_timer();
    }

    /// Stop timers and drop in-flight work.  Track and station are kept.
    pub fn leave(&mut self) {
        debug!("screen: leave");
        self.cancel_seek_timer();
        self.stop_buffer_timer();
        self.supersede_artwork();
        self.supersede_lookup();
    }

    /// Detach from everything before the screen is dropped.
    pub fn shutdown(&mut self) {
        self.leave();
        self.unsubscribe();
    }

    pub fn select_station(&mut self, station: Arc<RadioStation>) {
        info!("screen: select station {:?}", station.name);
        let engine = &self.deps.engine;
        engine.stop();
        engine.set_stream(&station.stream_url);
        engine.start();

        self.view.status = PlaybackStatus::Loading;
        self.view.status_text = Some(STATUS_LOADING.to_string());
        self.view.play_enabled = false;
        self.view.pause_enabled = true;
        self.set_transition(Transition::Flash);

        self.supersede_lookup();
        self.track.artwork_url = station.image_url.clone();
        self.track.artwork_loaded = false;
        self.station = Some(station);
        self.resolve_artwork();

        self.track.is_playing = true;
        self.cancel_seek_timer();
        self.refresh_audio_buttons();
        self.start_buffer_timer();
    }

    // ── transport ─────────────────────────────────────────────────────────────

    pub fn play(&mut self) {
        if self.station.is_none() {
            debug!("screen: play with no station");
            return;
        }
        info!("screen: play");
        self.track.is_playing = true;
        self.view.play_enabled = false;
        self.view.pause_enabled = true;
        self.view.animating = true;
        self.set_transition(Transition::Flash);
        self.deps.engine.start();
        self.refresh_audio_buttons();
    }

    pub fn pause(&mut self) {
        if self.station.is_none() {
            debug!("screen: pause with no station");
            return;
        }
        info!("screen: pause");
        self.track.is_playing = false;
        self.deps.engine.pause();
        self.apply_paused_controls();
        self.cancel_seek_timer();
        self.refresh_audio_buttons();
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.view.volume = volume;
        self.deps.engine.set_volume(volume);
    }

    pub fn rewind(&mut self) {
        self.seek(SeekDirection::Rewind);
    }

    pub fn fast_forward(&mut self) {
        self.seek(SeekDirection::FastForward);
    }

    /// Seek once now, then repeat every `seek_repeat` until released.
    pub fn seek_press(&mut self, direction: SeekDirection) {
        // Terminal key repeat re-sends the press while held.
        if self.held_seek == Some(direction) {
            return;
        }
        self.cancel_seek_timer();
        self.refresh_audio_buttons();
        if !self.seek_enabled(direction) {
            debug!("screen: {:?} is disabled", direction);
            return;
        }

        self.held_seek = Some(direction);
        match direction {
            SeekDirection::Rewind => self.rewind(),
            SeekDirection::FastForward => self.fast_forward(),
        }

        let tx = self.inbox.clone();
        let period = self.settings.seek_repeat;
        let session = self.seek_session;
        self.seek_timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(ScreenMessage::SeekRepeat { direction, session }).await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn seek_release(&mut self) {
        if self.held_seek.is_some() {
            debug!("screen: seek released");
        }
        self.cancel_seek_timer();
    }

    fn seek(&mut self, direction: SeekDirection) {
        if !self.seek_enabled(direction) {
            self.cancel_seek_timer();
            return;
        }
        self.deps.engine.seek(self.settings.seek_step_secs, direction);
        self.refresh_audio_buttons();
    }

    fn seek_enabled(&self, direction: SeekDirection) -> bool {
        match direction {
            SeekDirection::Rewind => self.view.rewind_enabled,
            SeekDirection::FastForward => self.view.fast_forward_enabled,
        }
    }

    fn refresh_audio_buttons(&mut self) {
        let playing = self.track.is_playing;
        self.view.rewind_enabled = playing;
        self.view.fast_forward_enabled =
            playing && self.deps.engine.can_seek_forward(self.settings.seek_step_secs);
    }

    fn apply_paused_controls(&mut self) {
        self.view.play_enabled = true;
        self.view.pause_enabled = false;
        self.view.animating = false;
    }

    fn set_transition(&mut self, transition: Transition) {
        self.view.transition = Some((transition, Instant::now()));
    }

    // ── engine callbacks ──────────────────────────────────────────────────────

    fn on_engine_event(&mut self, evt: EngineEvent) {
        match evt {
            EngineEvent::MetadataChanged(raw) => self.on_track_metadata_changed(&raw),
            EngineEvent::Connecting => {
                self.view.status_text = Some(STATUS_CONNECTING.to_string());
            }
            EngineEvent::Buffering => {
                self.view.status_text = Some(STATUS_BUFFERING.to_string());
            }
            EngineEvent::PlayStarted => {
                info!("screen: playing");
                self.view.status = PlaybackStatus::Playing;
                self.view.status_text = None;
                self.view.play_enabled = false;
                self.view.pause_enabled = true;
                self.view.animating = true;
                self.track.is_playing = true;
            }
            // Switching stations stops the previous stream first.
            EngineEvent::PlayStopped if self.view.status == PlaybackStatus::Loading => {
                debug!("screen: ignoring stop of the previous stream");
                return;
            }
            EngineEvent::PlayStopped => {
                info!("screen: stopped");
                self.view.status = PlaybackStatus::Idle;
                self.track.is_playing = false;
                self.apply_paused_controls();
            }
            EngineEvent::PlayPaused => {
                info!("screen: paused");
                self.view.status = PlaybackStatus::Paused;
                self.view.status_text = Some(STATUS_PAUSED.to_string());
                self.track.is_playing = false;
                self.apply_paused_controls();
            }
            EngineEvent::NoNetwork => {
                warn!("screen: engine reports no network");
                self.view.status_text = Some(STATUS_NO_NETWORK.to_string());
                return;
            }
        }
        self.refresh_audio_buttons();
    }

    pub fn on_track_metadata_changed(&mut self, raw: &str) {
        let Some(station) = self.station.clone() else {
            debug!("screen: metadata {:?} with no station", raw);
            return;
        };

        let (mut artist, mut title) = split_track_metadata(raw);
        if artist.is_empty() && title.is_empty() {
            artist = station.description.clone();
            title = station.name.clone();
        }
        if title == self.track.title {
            debug!("screen: metadata unchanged ({:?})", title);
            return;
        }

        info!("screen: now playing {:?} by {:?}", title, artist);
        self.track.artist = artist;
        self.track.title = title;
        self.notify_metadata();
        self.set_transition(Transition::ZoomIn);

        self.track.artwork_url = station.image_url.clone();
        self.track.artwork_loaded = false;
        self.resolve_artwork();
        self.query_album_art();
        self.publish_now_playing();
    }

    // ── artwork ───────────────────────────────────────────────────────────────

    /// Apply `track.artwork_url`: empty means the default image, a bare name
    /// is a local resource, anything with `http` is downloaded.
    pub fn resolve_artwork(&mut self) {
        self.supersede_artwork();
        let url = self.track.artwork_url.clone();

        if url.is_empty() {
            self.track.artwork_image = Some(ArtworkImage::Default);
            self.track.artwork_loaded = true;
            self.view.description_hidden = false;
            return;
        }

        if !url.contains("http") {
            self.track.artwork_image = Some(ArtworkImage::Named(url));
            self.track.artwork_loaded = true;
            self.view.description_hidden = false;
            self.notify_artwork();
            return;
        }

        self.view.description_hidden = true;
        let generation = self.artwork_generation;
        let fetcher = self.deps.fetcher.clone();
        let tx = self.inbox.clone();
        debug!("screen: fetching artwork {} (gen {})", url, generation);
        self.artwork_task = Some(tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;
            let _ = tx
                .send(ScreenMessage::ArtworkFetched { generation, result })
                .await;
        }));
    }

    fn on_artwork_fetched(&mut self, generation: u64, result: Result<ArtworkImage, ArtworkError>) {
        if generation != self.artwork_generation {
            debug!(
                "screen: dropping stale artwork (gen {}, current {})",
                generation, self.artwork_generation
            );
            return;
        }
        self.artwork_task = None;

        match result {
            Ok(image) => {
                debug!("screen: artwork loaded ({} bytes)", image.byte_len());
                self.track.artwork_image = Some(image);
                self.track.artwork_loaded = true;
                self.set_transition(Transition::Wobble);
                self.publish_now_playing();
                self.notify_artwork();
            }
            Err(e) => warn!("screen: artwork download failed: {}", e),
        }
    }

    fn supersede_artwork(&mut self) {
        self.artwork_generation += 1;
        if let Some(task) = self.artwork_task.take() {
            task.abort();
        }
    }

    // ── album-art lookup ──────────────────────────────────────────────────────

    pub fn query_album_art(&mut self) {
        self.supersede_lookup();
        if !self.deps.lookup.is_enabled() {
            debug!("screen: album-art lookup disabled (no API key)");
            return;
        }

        let generation = self.lookup_generation;
        let lookup = self.deps.lookup.clone();
        let tx = self.inbox.clone();
        let artist = self.track.artist.clone();
        let title = self.track.title.clone();
        self.lookup_task = Some(tokio::spawn(async move {
            let result = lookup.lookup_album_art(&artist, &title).await;
            let _ = tx
                .send(ScreenMessage::AlbumArtResolved { generation, result })
                .await;
        }));
    }

    fn on_album_art_resolved(
        &mut self,
        generation: u64,
        result: Result<Option<String>, LookupError>,
    ) {
        if generation != self.lookup_generation {
            debug!(
                "screen: dropping stale lookup (gen {}, current {})",
                generation, self.lookup_generation
            );
            return;
        }
        self.lookup_task = None;

        match result {
            Ok(Some(url)) => {
                self.track.artwork_url = url;
                self.track.artwork_loaded = false;
                self.resolve_artwork();
            }
            Ok(None) => {
                debug!("screen: no album art for {:?}", self.track.title);
                self.track.artwork_url.clear();
                self.resolve_artwork();
            }
            Err(LookupError::Parse(msg)) => {
                debug!("screen: album-art response unusable: {}", msg);
                self.track.artwork_url.clear();
                self.resolve_artwork();
            }
            Err(e) => warn!("screen: album-art lookup failed: {}", e),
        }
    }

    fn supersede_lookup(&mut self) {
        self.lookup_generation += 1;
        if let Some(task) = self.lookup_task.take() {
            task.abort();
        }
    }

    fn publish_now_playing(&self) {
        let station = self.station.as_ref().map(|s| s.name.as_str()).unwrap_or("");
        self.deps.center.publish(station, &self.track);
    }

    // ── timers ────────────────────────────────────────────────────────────────

    fn cancel_seek_timer(&mut self) {
        self.held_seek = None;
        self.seek_session += 1;
        if let Some(timer) = self.seek_timer.take() {
            timer.abort();
        }
    }

    fn start_buffer_timer(&mut self) {
        self.stop_buffer_timer();
        let engine = self.deps.engine.clone();
        let tx = self.inbox.clone();
        let period = self.settings.buffer_refresh;
        self.buffer_timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(ScreenMessage::BufferStats(engine.buffer_stats())).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_buffer_timer(&mut self) {
        if let Some(timer) = self.buffer_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for NowPlayingScreen {
    fn drop(&mut self) {
        for task in [
            self.seek_timer.take(),
            self.buffer_timer.take(),
            self.artwork_task.take(),
            self.lookup_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SetStream(String),
        Start,
        Stop,
        Pause,
        Seek(f64, SeekDirection),
        Volume(f32),
    }

    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<Call>>,
        cannot_seek_forward: AtomicBool,
    }

    impl FakeEngine {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn seeks(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Seek(..)))
                .count()
        }
    }

    impl StreamingEngine for FakeEngine {
        fn set_stream(&self, url: &str) {
            self.calls.lock().unwrap().push(Call::SetStream(url.to_string()));
        }
        fn start(&self) {
            self.calls.lock().unwrap().push(Call::Start);
        }
        fn stop(&self) {
            self.calls.lock().unwrap().push(Call::Stop);
        }
        fn pause(&self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }
        fn seek(&self, delta_secs: f64, direction: SeekDirection) {
            self.calls.lock().unwrap().push(Call::Seek(delta_secs, direction));
        }
        fn can_seek_forward(&self, _secs: f64) -> bool {
            !self.cannot_seek_forward.load(Ordering::SeqCst)
        }
        fn set_volume(&self, volume: f32) {
            self.calls.lock().unwrap().push(Call::Volume(volume));
        }
        fn buffer_stats(&self) -> BufferStats {
            BufferStats {
                max_size: 100,
                current_usage: 40,
                playing_offset: 30,
                byte_offset: 9000,
            }
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum LookupReply {
        Found(&'static str),
        NoArtwork,
        Unparseable,
        ServerError,
    }

    struct FakeLookup {
        enabled: bool,
        reply: Mutex<LookupReply>,
        queries: Mutex<Vec<(String, String)>>,
    }

    impl FakeLookup {
        fn new(reply: LookupReply) -> Self {
            Self {
                enabled: true,
                reply: Mutex::new(reply),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetadataLookup for FakeLookup {
        async fn lookup_album_art(
            &self,
            artist: &str,
            title: &str,
        ) -> Result<Option<String>, LookupError> {
            self.queries
                .lock()
                .unwrap()
                .push((artist.to_string(), title.to_string()));
            let reply = *self.reply.lock().unwrap();
            match reply {
                LookupReply::Found(url) => Ok(Some(url.to_string())),
                LookupReply::NoArtwork => Ok(None),
                LookupReply::Unparseable => Err(LookupError::Parse("no image".into())),
                LookupReply::ServerError => Err(LookupError::Status(503)),
            }
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    /// Serves every URL except ones containing "broken".
    #[derive(Default)]
    struct FakeFetcher {
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArtworkFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<ArtworkImage, ArtworkError> {
            self.fetched.lock().unwrap().push(url.to_string());
            if url.contains("broken") {
                return Err(ArtworkError::Status(404));
            }
            Ok(ArtworkImage::Remote {
                url: url.to_string(),
                bytes: Arc::new(vec![0xff; 8]),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Notice {
        Metadata(String, String),
        Artwork(Option<ArtworkImage>, bool),
    }

    struct RecordingListener(Arc<Mutex<Vec<Notice>>>);

    impl TrackListener for RecordingListener {
        fn on_track_metadata_updated(&mut self, track: &Track) {
            self.0
                .lock()
                .unwrap()
                .push(Notice::Metadata(track.artist.clone(), track.title.clone()));
        }
        fn on_artwork_updated(&mut self, track: &Track) {
            self.0
                .lock()
                .unwrap()
                .push(Notice::Artwork(track.artwork_image.clone(), track.artwork_loaded));
        }
    }

    struct Harness {
        screen: NowPlayingScreen,
        rx: mpsc::Receiver<ScreenMessage>,
        engine: Arc<FakeEngine>,
        lookup: Arc<FakeLookup>,
        fetcher: Arc<FakeFetcher>,
        center: Arc<NowPlayingCenter>,
        notices: Arc<Mutex<Vec<Notice>>>,
    }

    impl Harness {
        fn new(lookup: FakeLookup) -> Self {
            let engine = Arc::new(FakeEngine::default());
            let lookup = Arc::new(lookup);
            let fetcher = Arc::new(FakeFetcher::default());
            let center = Arc::new(NowPlayingCenter::new(None));
            let (tx, rx) = mpsc::channel(256);
            let deps = ScreenDeps {
                engine: engine.clone(),
                lookup: lookup.clone(),
                fetcher: fetcher.clone(),
                center: center.clone(),
            };
            let notices = Arc::new(Mutex::new(Vec::new()));
            let screen = NowPlayingScreen::new(
                deps,
                ScreenSettings::from(&EngineConfig::default()),
                tx,
                Some(Box::new(RecordingListener(notices.clone()))),
            );
            Self {
                screen,
                rx,
                engine,
                lookup,
                fetcher,
                center,
                notices,
            }
        }

        /// Let spawned work run and apply everything it posted.
        async fn pump(&mut self) {
            for _ in 0..8 {
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                while let Ok(msg) = self.rx.try_recv() {
                    self.screen.handle(msg);
                }
            }
        }

        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        fn clear_notices(&self) {
            self.notices.lock().unwrap().clear();
        }

        fn metadata(&mut self, raw: &str) {
            self.screen
                .handle(ScreenMessage::Engine(EngineEvent::MetadataChanged(raw.to_string())));
        }
    }

    fn station(name: &str, image: &str) -> Arc<RadioStation> {
        Arc::new(RadioStation::new(
            name,
            format!("{} description", name),
            format!("http://stream.example/{}", name.to_lowercase()),
            image,
        ))
    }

    #[tokio::test]
    async fn test_select_station_starts_engine_and_shows_loading() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        assert_eq!(
            h.engine.calls(),
            vec![
                Call::Stop,
                Call::SetStream("http://stream.example/groove".into()),
                Call::Start,
            ]
        );
        let view = h.screen.view();
        assert_eq!(view.status, PlaybackStatus::Loading);
        assert_eq!(h.screen.song_label(), "Loading Station...");
        assert_eq!(h.screen.artist_label(), "Groove");
        assert!(h.screen.track().is_playing);
        assert!(!view.play_enabled);
        assert!(matches!(view.transition, Some((Transition::Flash, _))));
    }

    #[tokio::test]
    async fn test_empty_artwork_url_applies_default() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        let track = h.screen.track();
        assert_eq!(track.artwork_image, Some(ArtworkImage::Default));
        assert!(track.artwork_loaded);
        assert!(h.fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_named_artwork_is_applied_synchronously_and_notifies_once() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Country", "station-absolutecountry"));

        let track = h.screen.track();
        assert_eq!(
            track.artwork_image,
            Some(ArtworkImage::Named("station-absolutecountry".into()))
        );
        assert!(track.artwork_loaded);
        assert_eq!(
            h.notices(),
            vec![Notice::Artwork(
                Some(ArtworkImage::Named("station-absolutecountry".into())),
                true
            )]
        );
        h.pump().await;
        assert_eq!(h.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_artwork_loads_once_and_publishes() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        let updates = h.center.subscribe();
        h.screen.enter(station("Remote", "https://img.example/remote.png"));

        assert!(!h.screen.track().artwork_loaded);
        assert!(h.screen.view().description_hidden);
        assert!(updates.borrow().is_none());

        h.pump().await;
        let track = h.screen.track();
        assert!(track.artwork_loaded);
        assert_eq!(
            track.artwork_image.as_ref().map(|i| i.describe()),
            Some("https://img.example/remote.png".to_string())
        );
        assert!(matches!(h.screen.view().transition, Some((Transition::Wobble, _))));
        assert_eq!(h.notices().len(), 1);
        assert_eq!(
            updates.borrow().as_ref().and_then(|i| i.artwork.clone()).as_deref(),
            Some("https://img.example/remote.png")
        );
    }

    #[tokio::test]
    async fn test_failed_download_keeps_previous_artwork() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::Found(
            "https://img.example/broken.png",
        )));
        h.screen.enter(station("Country", "station-absolutecountry"));
        h.metadata("Artist - Song");
        h.pump().await;

        let track = h.screen.track();
        assert_eq!(
            track.artwork_image,
            Some(ArtworkImage::Named("station-absolutecountry".into()))
        );
        assert!(!track.artwork_loaded);
        assert_eq!(
            h.fetcher.fetched.lock().unwrap().clone(),
            vec!["https://img.example/broken.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_late_artwork_for_previous_station_is_dropped() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Alpha", "https://img.example/a.png"));
        let alpha_generation = h.screen.artwork_generation;

        h.screen.enter(station("Beta", "station-beta"));
        h.clear_notices();
        h.screen.handle(ScreenMessage::ArtworkFetched {
            generation: alpha_generation,
            result: Ok(ArtworkImage::Remote {
                url: "https://img.example/a.png".into(),
                bytes: Arc::new(vec![1, 2, 3]),
            }),
        });
        h.pump().await;

        assert_eq!(h.screen.station().map(|s| s.name.as_str()), Some("Beta"));
        assert_eq!(
            h.screen.track().artwork_image,
            Some(ArtworkImage::Named("station-beta".into()))
        );
        assert!(h.notices().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_updates_track_and_queries_album_art() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::Found(
            "https://img.example/kerala.png",
        )));
        h.screen.enter(station("Groove", "station-groove"));
        h.clear_notices();

        h.metadata("Bonobo - Kerala");
        assert_eq!(h.screen.track().artist, "Bonobo");
        assert_eq!(h.screen.track().title, "Kerala");
        assert_eq!(
            h.notices()[..2],
            [
                Notice::Metadata("Bonobo".into(), "Kerala".into()),
                Notice::Artwork(Some(ArtworkImage::Named("station-groove".into())), true),
            ]
        );
        assert!(matches!(h.screen.view().transition, Some((Transition::ZoomIn, _))));
        assert_eq!(
            h.center.current().map(|i| i.title),
            Some("Kerala".to_string())
        );

        h.pump().await;
        assert_eq!(
            h.lookup.queries.lock().unwrap().clone(),
            vec![("Bonobo".to_string(), "Kerala".to_string())]
        );
        assert_eq!(
            h.screen.track().artwork_image.as_ref().map(|i| i.describe()),
            Some("https://img.example/kerala.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_same_title_is_idempotent() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));
        h.metadata("Bonobo - Kerala");
        h.pump().await;
        h.clear_notices();
        let queries = h.lookup.queries.lock().unwrap().len();

        h.metadata("Someone Else - Kerala");
        h.pump().await;

        assert!(h.notices().is_empty());
        assert_eq!(h.screen.track().artist, "Bonobo");
        assert_eq!(h.lookup.queries.lock().unwrap().len(), queries);
    }

    #[tokio::test]
    async fn test_empty_metadata_falls_back_to_station() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));
        h.metadata(" - ");

        assert_eq!(h.screen.track().artist, "Groove description");
        assert_eq!(h.screen.track().title, "Groove");
    }

    #[tokio::test]
    async fn test_album_art_outcomes() {
        // Sentinel: default image.
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", "station-groove"));
        h.metadata("A - B");
        h.pump().await;
        assert_eq!(h.screen.track().artwork_image, Some(ArtworkImage::Default));

        // Parse failure: default image.
        *h.lookup.reply.lock().unwrap() = LookupReply::Unparseable;
        h.metadata("A - C");
        h.pump().await;
        assert_eq!(h.screen.track().artwork_image, Some(ArtworkImage::Default));

        // Server error: keep the current (station) art.
        *h.lookup.reply.lock().unwrap() = LookupReply::ServerError;
        h.metadata("A - D");
        h.pump().await;
        assert_eq!(
            h.screen.track().artwork_image,
            Some(ArtworkImage::Named("station-groove".into()))
        );
    }

    #[tokio::test]
    async fn test_lookup_skipped_without_api_key() {
        let mut lookup = FakeLookup::new(LookupReply::Found("https://img.example/x.png"));
        lookup.enabled = false;
        let mut h = Harness::new(lookup);
        h.screen.enter(station("Groove", ""));
        h.metadata("A - B");
        h.pump().await;

        assert!(h.lookup.queries.lock().unwrap().is_empty());
        assert_eq!(h.screen.track().artwork_image, Some(ArtworkImage::Default));
    }

    #[tokio::test]
    async fn test_engine_status_callbacks() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        h.screen.handle(ScreenMessage::Engine(EngineEvent::Connecting));
        assert_eq!(h.screen.song_label(), "Connecting to Station...");
        h.screen.handle(ScreenMessage::Engine(EngineEvent::Buffering));
        assert_eq!(h.screen.song_label(), "Buffering...");

        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStarted));
        let view = h.screen.view().clone();
        assert_eq!(view.status, PlaybackStatus::Playing);
        assert_eq!(view.status_text, None);
        assert!(!view.play_enabled);
        assert!(view.animating);
        assert!(view.rewind_enabled && view.fast_forward_enabled);

        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayPaused));
        assert_eq!(h.screen.song_label(), "Station Paused...");
        assert!(h.screen.view().play_enabled);
        assert!(!h.screen.view().rewind_enabled);

        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStopped));
        assert_eq!(h.screen.view().status, PlaybackStatus::Idle);
        assert!(!h.screen.track().is_playing);
    }

    #[tokio::test]
    async fn test_no_network_only_changes_status_text() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));
        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStarted));
        let before = h.screen.view().clone();

        h.screen.handle(ScreenMessage::Engine(EngineEvent::NoNetwork));
        let after = h.screen.view();
        assert_eq!(h.screen.song_label(), "No Network Found...");
        assert_eq!(after.play_enabled, before.play_enabled);
        assert_eq!(after.status, before.status);
        assert!(h.screen.track().is_playing);
    }

    #[tokio::test]
    async fn test_play_pause_and_volume() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        h.screen.handle(ScreenMessage::Command(ScreenCommand::Pause));
        assert!(!h.screen.track().is_playing);
        assert!(h.screen.view().play_enabled);
        assert!(!h.screen.view().animating);

        h.screen.handle(ScreenMessage::Command(ScreenCommand::Play));
        assert!(h.screen.track().is_playing);
        assert!(!h.screen.view().play_enabled);

        h.screen.handle(ScreenMessage::Command(ScreenCommand::SetVolume(1.7)));
        h.screen.handle(ScreenMessage::Command(ScreenCommand::AdjustVolume(-2.0)));
        let calls = h.engine.calls();
        assert_eq!(
            calls[3..].to_vec(),
            vec![Call::Pause, Call::Start, Call::Volume(1.0), Call::Volume(0.0)]
        );
    }

    #[tokio::test]
    async fn test_fast_forward_disabled_without_buffered_audio() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.engine.cannot_seek_forward.store(true, Ordering::SeqCst);
        h.screen.enter(station("Groove", ""));

        assert!(h.screen.view().rewind_enabled);
        assert!(!h.screen.view().fast_forward_enabled);
        h.screen.seek_press(SeekDirection::FastForward);
        assert_eq!(h.engine.seeks(), 0);

        h.screen.rewind();
        assert_eq!(
            h.engine.calls().last(),
            Some(&Call::Seek(10.0, SeekDirection::Rewind))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_holding_fast_forward_for_one_second_seeks_four_times() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        h.screen.handle(ScreenMessage::Command(ScreenCommand::SeekPress(
            SeekDirection::FastForward,
        )));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        h.pump().await;
        assert_eq!(h.engine.seeks(), 4);

        h.screen.handle(ScreenMessage::Command(ScreenCommand::SeekRelease));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        h.pump().await;
        assert_eq!(h.engine.seeks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_repeat_after_release_is_ignored() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        h.screen.seek_press(SeekDirection::Rewind);
        tokio::time::sleep(Duration::from_millis(700)).await;
        // Two repeat ticks are waiting in the inbox.
        h.screen.seek_release();
        h.pump().await;
        assert_eq!(h.engine.seeks(), 1);
    }

    #[tokio::test]
    async fn test_reenter_same_station_keeps_track() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        let groove = station("Groove", "");
        h.screen.enter(groove.clone());
        h.metadata("Bonobo - Kerala");
        h.screen.pause();
        h.screen.leave();
        let calls = h.engine.calls().len();

        h.screen.enter(groove);
        assert_eq!(h.screen.track().title, "Kerala");
        assert!(h.screen.view().play_enabled);
        assert_eq!(h.engine.calls().len(), calls);

        h.screen.enter(station("Other", ""));
        assert!(h.screen.track().title.is_empty());
        assert_eq!(h.engine.calls().last(), Some(&Call::Start));
    }

    impl Harness {
        /// Apply everything queued, returning how many buffer samples it held.
        fn drain_buffer_samples(&mut self) -> usize {
            let mut samples = 0;
            while let Ok(msg) = self.rx.try_recv() {
                if matches!(msg, ScreenMessage::BufferStats(_)) {
                    samples += 1;
                }
                self.screen.handle(msg);
            }
            samples
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_stats_refresh_every_200ms_until_leave() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.pump().await;
        assert_eq!(h.screen.view().buffer.current_usage, 40);
        assert_eq!(h.screen.view().buffer.max_size, 100);
        h.drain_buffer_samples();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let samples = h.drain_buffer_samples();
        assert!((4..=6).contains(&samples), "{} samples in 1s", samples);

        h.screen.leave();
        assert!(h.screen.buffer_timer.is_none());
        assert!(h.screen.seek_timer.is_none());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        tokio::task::yield_now().await;
        assert_eq!(h.drain_buffer_samples(), 0);
    }

    #[tokio::test]
    async fn test_reenter_resumes_artwork_dropped_by_leave() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        let remote = station("Remote", "https://img.example/remote.png");
        h.screen.enter(remote.clone());
        h.screen.leave();
        h.pump().await;
        assert!(!h.screen.track().artwork_loaded);
        assert_eq!(h.screen.track().artwork_image, None);

        h.screen.enter(remote);
        h.pump().await;
        let track = h.screen.track();
        assert!(track.artwork_loaded);
        assert_eq!(
            track.artwork_image.as_ref().map(|i| i.describe()),
            Some("https://img.example/remote.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_reenter_repeats_album_art_query_dropped_by_leave() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::Found(
            "https://img.example/kerala.png",
        )));
        let groove = station("Groove", "https://img.example/groove.png");
        h.screen.enter(groove.clone());
        h.pump().await;
        h.metadata("Bonobo - Kerala");
        h.screen.leave();
        h.pump().await;
        assert!(h.lookup.queries.lock().unwrap().is_empty());

        h.screen.enter(groove);
        h.pump().await;
        assert_eq!(
            h.lookup.queries.lock().unwrap().clone(),
            vec![("Bonobo".to_string(), "Kerala".to_string())]
        );
        assert_eq!(
            h.screen.track().artwork_image.as_ref().map(|i| i.describe()),
            Some("https://img.example/kerala.png".to_string())
        );
        assert!(h.screen.track().artwork_loaded);
    }

    #[tokio::test]
    async fn test_late_album_art_for_previous_title_is_dropped() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));
        h.metadata("A - B");
        let stale_generation = h.screen.lookup_generation;
        h.metadata("A - C");

        h.screen.handle(ScreenMessage::AlbumArtResolved {
            generation: stale_generation,
            result: Ok(Some("https://img.example/stale.png".into())),
        });
        h.pump().await;

        assert!(h.fetcher.fetched.lock().unwrap().is_empty());
        assert_eq!(h.screen.track().title, "C");
        assert_eq!(h.screen.track().artwork_image, Some(ArtworkImage::Default));
    }

    #[tokio::test]
    async fn test_stop_of_previous_stream_keeps_loading_state() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Alpha", ""));
        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStarted));

        h.screen.enter(station("Beta", ""));
        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStopped));
        let view = h.screen.view();
        assert_eq!(view.status, PlaybackStatus::Loading);
        assert!(!view.play_enabled);
        assert!(h.screen.track().is_playing);
        assert_eq!(h.screen.song_label(), "Loading Station...");

        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStarted));
        h.screen.handle(ScreenMessage::Engine(EngineEvent::PlayStopped));
        assert_eq!(h.screen.view().status, PlaybackStatus::Idle);
        assert!(h.screen.view().play_enabled);
    }

    #[tokio::test]
    async fn test_seek_press_issues_one_seek_per_direction() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.enter(station("Groove", ""));

        h.screen.seek_press(SeekDirection::FastForward);
        h.screen.seek_press(SeekDirection::FastForward);
        h.screen.seek_release();
        h.screen.seek_press(SeekDirection::Rewind);
        h.screen.seek_release();

        let seeks: Vec<Call> = h
            .engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Seek(..)))
            .collect();
        assert_eq!(
            seeks,
            vec![
                Call::Seek(10.0, SeekDirection::FastForward),
                Call::Seek(10.0, SeekDirection::Rewind),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_hears_nothing() {
        let mut h = Harness::new(FakeLookup::new(LookupReply::NoArtwork));
        h.screen.unsubscribe();
        h.screen.enter(station("Groove", "station-groove"));
        h.metadata("A - B");
        assert!(h.notices().is_empty());
    }
}
