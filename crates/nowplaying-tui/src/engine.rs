//! Streaming engine façade.
//!
//! The screen talks to the engine through [`StreamingEngine`]: every call is
//! fire-and-forget and failures are only logged.  Engine callbacks come back
//! as [`EngineEvent`]s on a channel, which the app forwards into the screen
//! inbox so they are applied on the UI task.
//!
//! [`MpvEngine`] is the production implementation.  Commands are queued to a
//! single worker task so `stop` → `load` ordering is preserved even though
//! callers never await.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::Context;
use nowplaying_proto::config::EngineConfig;
use nowplaying_proto::protocol::{BufferStats, SeekDirection};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::mpv::{
    MpvDriver, MpvEvent, MpvHandle, OBS_CACHE_STATE, OBS_CORE_IDLE, OBS_ICY_TITLE,
    OBS_ICY_TITLE_ALT, OBS_PAUSE, OBS_PAUSED_FOR_CACHE, OBS_STREAM_POS,
};

/// Callbacks delivered by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    MetadataChanged(String),
    Connecting,
    Buffering,
    PlayStarted,
    PlayStopped,
    PlayPaused,
    NoNetwork,
}

pub trait StreamingEngine: Send + Sync {
    fn set_stream(&self, url: &str);
    fn start(&self);
    fn stop(&self);
    fn pause(&self);
    fn seek(&self, delta_secs: f64, direction: SeekDirection);
    /// True when at least `secs` of audio are buffered ahead of the playhead.
    fn can_seek_forward(&self, secs: f64) -> bool;
    fn set_volume(&self, volume: f32);
    fn buffer_stats(&self) -> BufferStats;
}

// ── process-wide runtime ──────────────────────────────────────────────────────

/// Process-wide engine setup, done once from `main` before any screen exists.
#[derive(Debug)]
pub struct EngineRuntime {
    pub mpv_binary: PathBuf,
    pub socket_name: String,
    pub socket_arg: String,
    pub demuxer_max_bytes: u64,
    pub demuxer_max_back_bytes: u64,
    pub initial_volume: f32,
}

static ENGINE_RUNTIME: OnceLock<EngineRuntime> = OnceLock::new();

impl EngineRuntime {
    pub fn init(config: &EngineConfig) -> anyhow::Result<&'static EngineRuntime> {
        let mpv_binary = nowplaying_proto::platform::find_mpv_binary()
            .context("mpv binary not found (set MPV_PATH or install mpv)")?;
        let runtime = EngineRuntime {
            mpv_binary,
            socket_name: nowplaying_proto::platform::mpv_socket_name(),
            socket_arg: nowplaying_proto::platform::mpv_socket_arg(),
            demuxer_max_bytes: config.demuxer_max_bytes,
            demuxer_max_back_bytes: config.demuxer_max_back_bytes,
            initial_volume: config.default_volume,
        };
        ENGINE_RUNTIME
            .set(runtime)
            .map_err(|_| anyhow::anyhow!("engine runtime already initialised"))?;
        let runtime = Self::get().context("engine runtime missing after init")?;
        info!("engine runtime initialised: {:?}", runtime.mpv_binary);
        Ok(runtime)
    }

    pub fn get() -> Option<&'static EngineRuntime> {
        ENGINE_RUNTIME.get()
    }

    pub fn buffer_budget(&self) -> u64 {
        self.demuxer_max_bytes + self.demuxer_max_back_bytes
    }
}

// ── observed engine state ─────────────────────────────────────────────────────

/// Engine state mirrored from mpv property pushes.  Also the translator from
/// raw mpv events to [`EngineEvent`]s.
#[derive(Debug, Default)]
struct Observed {
    stream_url: Option<String>,
    loaded_url: Option<String>,
    /// Between mpv's start-file and end-file.
    active: bool,
    playing: bool,
    paused: bool,
    last_title: Option<String>,
    cache_total_bytes: u64,
    cache_fw_bytes: u64,
    cache_duration: f64,
    stream_pos: u64,
}

impl Observed {
    fn apply(&mut self, evt: &MpvEvent) -> Vec<EngineEvent> {
        let mut out = Vec::new();

        if let Some((obs_id, data)) = evt.as_property_change() {
            match obs_id {
                OBS_ICY_TITLE | OBS_ICY_TITLE_ALT => {
                    // Both observations fire for the same title; only forward changes
                    if let Some(title) = data.as_str().filter(|t| !t.trim().is_empty()) {
                        if self.last_title.as_deref() != Some(title) {
                            self.last_title = Some(title.to_string());
                            out.push(EngineEvent::MetadataChanged(title.to_string()));
                        }
                    }
                }
                OBS_CORE_IDLE => {
                    if data.as_bool() == Some(false)
                        && !self.paused
                        && !self.playing
                        && self.active
                    {
                        self.playing = true;
                        out.push(EngineEvent::PlayStarted);
                    }
                }
                OBS_PAUSE => {
                    let paused = data.as_bool().unwrap_or(false);
                    if paused != self.paused {
                        self.paused = paused;
                        if paused && self.active {
                            self.playing = false;
                            out.push(EngineEvent::PlayPaused);
                        }
                    }
                }
                OBS_PAUSED_FOR_CACHE => {
                    if data.as_bool() == Some(true) {
                        self.playing = false;
                        out.push(EngineEvent::Buffering);
                    }
                }
                OBS_CACHE_STATE => {
                    self.cache_total_bytes = json_u64(data.get("total-bytes"));
                    self.cache_fw_bytes = json_u64(data.get("fw-bytes"));
                    self.cache_duration = data
                        .get("cache-duration")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                }
                OBS_STREAM_POS => {
                    self.stream_pos = json_u64(Some(data));
                }
                _ => {}
            }
            return out;
        }

        match evt.event_name() {
            Some("start-file") => {
                self.active = true;
                self.playing = false;
                self.last_title = None;
                out.push(EngineEvent::Connecting);
            }
            Some("end-file") => {
                let reason = evt
                    .raw
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!("engine: end-file reason={}", reason);
                self.active = false;
                self.playing = false;
                self.cache_total_bytes = 0;
                self.cache_fw_bytes = 0;
                self.cache_duration = 0.0;
                match reason {
                    "error" => out.push(EngineEvent::NoNetwork),
                    "redirect" => {}
                    _ => out.push(EngineEvent::PlayStopped),
                }
            }
            _ => {}
        }
        out
    }

    fn buffer_stats(&self, max_size: u64) -> BufferStats {
        BufferStats {
            max_size,
            current_usage: self.cache_total_bytes,
            playing_offset: self.cache_total_bytes.saturating_sub(self.cache_fw_bytes),
            byte_offset: self.stream_pos,
        }
    }
}

fn json_u64(v: Option<&Value>) -> u64 {
    v.and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

// ── mpv implementation ────────────────────────────────────────────────────────

#[derive(Debug)]
enum EngineCommand {
    Load(String),
    Resume,
    Stop,
    Pause,
    Seek(f64),
    Volume(f32),
}

pub struct MpvEngine {
    cmd_tx: mpsc::Sender<EngineCommand>,
    observed: Arc<Mutex<Observed>>,
    driver: tokio::sync::Mutex<MpvDriver>,
    buffer_budget: u64,
}

impl MpvEngine {
    /// Spawn mpv, wire up observation and return the engine.  Engine
    /// callbacks are delivered on `event_tx`.
    pub async fn spawn(
        runtime: &'static EngineRuntime,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> anyhow::Result<Self> {
        let mut driver = MpvDriver::new(runtime);
        let (mpv_tx, mpv_rx) = mpsc::channel::<MpvEvent>(256);
        let handle = driver.spawn_and_connect(mpv_tx).await?;

        handle.observe_all_properties().await;
        match handle.version().await {
            Ok(v) => info!("engine: {}", v),
            Err(e) => warn!("engine: could not read mpv version: {}", e),
        }

        let observed = Arc::new(Mutex::new(Observed::default()));
        tokio::spawn(translate_events(mpv_rx, observed.clone(), event_tx));

        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>(64);
        tokio::spawn(command_worker(handle, cmd_rx));

        Ok(Self {
            cmd_tx,
            observed,
            driver: tokio::sync::Mutex::new(driver),
            buffer_budget: runtime.buffer_budget(),
        })
    }

    pub async fn shutdown(&self) {
        self.driver.lock().await.kill().await;
    }

    pub async fn is_alive(&self) -> bool {
        self.driver.lock().await.process_alive()
    }

    fn observed(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, cmd: EngineCommand) {
        if let Err(e) = self.cmd_tx.try_send(cmd) {
            warn!("engine: dropping command: {}", e);
        }
    }
}

impl StreamingEngine for MpvEngine {
    fn set_stream(&self, url: &str) {
        self.observed().stream_url = Some(url.to_string());
    }

    fn start(&self) {
        let cmd = {
            let mut obs = self.observed();
            match obs.stream_url.clone() {
                // Same stream still loaded: resume instead of reconnecting
                Some(url) if obs.active && obs.loaded_url.as_deref() == Some(url.as_str()) => {
                    EngineCommand::Resume
                }
                Some(url) => {
                    obs.loaded_url = Some(url.clone());
                    EngineCommand::Load(url)
                }
                None => {
                    warn!("engine: start without a stream");
                    return;
                }
            }
        };
        self.enqueue(cmd);
    }

    fn stop(&self) {
        self.observed().loaded_url = None;
        self.enqueue(EngineCommand::Stop);
    }

    fn pause(&self) {
        self.enqueue(EngineCommand::Pause);
    }

    fn seek(&self, delta_secs: f64, direction: SeekDirection) {
        self.enqueue(EngineCommand::Seek(direction.signed(delta_secs)));
    }

    fn can_seek_forward(&self, secs: f64) -> bool {
        self.observed().cache_duration > secs
    }

    fn set_volume(&self, volume: f32) {
        self.enqueue(EngineCommand::Volume(volume));
    }

    fn buffer_stats(&self) -> BufferStats {
        self.observed().buffer_stats(self.buffer_budget)
    }
}

async fn translate_events(
    mut mpv_rx: mpsc::Receiver<MpvEvent>,
    observed: Arc<Mutex<Observed>>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    while let Some(evt) = mpv_rx.recv().await {
        let events = observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(&evt);
        for e in events {
            debug!("engine: {:?}", e);
            if event_tx.send(e).await.is_err() {
                return;
            }
        }
    }
    debug!("engine: mpv event stream closed");
}

async fn command_worker(handle: MpvHandle, mut cmd_rx: mpsc::Receiver<EngineCommand>) {
    while let Some(cmd) = cmd_rx.recv().await {
        debug!("engine: command {:?}", cmd);
        let result = match &cmd {
            EngineCommand::Load(url) => handle.load_stream(url).await,
            EngineCommand::Resume => handle.set_pause(false).await,
            EngineCommand::Stop => handle.stop().await,
            EngineCommand::Pause => handle.set_pause(true).await,
            EngineCommand::Seek(secs) => handle.seek_relative(*secs).await,
            EngineCommand::Volume(v) => handle.set_volume(*v).await,
        };
        if let Err(e) = result {
            warn!("engine: {:?} failed: {}", cmd, e);
        }
    }
}
