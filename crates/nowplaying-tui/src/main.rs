mod action;
mod app;
mod app_state;
mod artwork;
mod component;
mod components;
mod engine;
mod http;
mod lock_screen;
mod lookup;
mod mpv;
mod screen;
mod theme;
mod widgets;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::artwork::HttpArtworkFetcher;
use crate::engine::{EngineEvent, EngineRuntime, MpvEngine};
use crate::lock_screen::NowPlayingCenter;
use crate::lookup::LastFmClient;
use crate::screen::{NowPlayingScreen, ScreenDeps, ScreenMessage, ScreenSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = nowplaying_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("nowplaying.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("nowplaying log: {}", log_path.display());

    tracing::info!("nowplaying starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match nowplaying_proto::config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("config: {:#}; using defaults", e);
            nowplaying_proto::config::Config::default()
        }
    };

    // ── Engine ───────────────────────────────────────────────────────────────
    let runtime = EngineRuntime::init(&config.engine)?;
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(256);
    let engine = Arc::new(MpvEngine::spawn(runtime, engine_tx).await?);
    if !engine.is_alive().await {
        anyhow::bail!("mpv exited during startup");
    }

    // ── Screen inbox (engine callbacks, HTTP, async completions) ─────────────
    let (screen_tx, screen_rx) = mpsc::channel::<ScreenMessage>(1024);
    tokio::spawn(forward_engine_events(engine_rx, screen_tx.clone()));

    let center = Arc::new(NowPlayingCenter::new(Some(data_dir.join("nowplaying.json"))));
    let deps = ScreenDeps {
        engine: engine.clone(),
        lookup: Arc::new(LastFmClient::new(&config.lookup)?),
        fetcher: Arc::new(HttpArtworkFetcher::new(Duration::from_secs(
            config.lookup.timeout_secs,
        ))?),
        center: center.clone(),
    };
    // The front end hears about track changes through a listener attached
    // for the screen's whole lifetime.
    let (app_tx, app_rx) = mpsc::channel::<app::AppMessage>(1024);
    let listener_station = Arc::new(Mutex::new(None));
    let listener = app::ChannelListener::new(app_tx.clone(), listener_station.clone());
    let screen = NowPlayingScreen::new(
        deps,
        ScreenSettings::from(&config.engine),
        screen_tx.clone(),
        Some(Box::new(listener)),
    );

    // ── HTTP remote control ──────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            center.subscribe(),
            screen_tx.clone(),
        );
    }

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let stations = nowplaying_proto::station::load_stations(&config.stations)
        .into_iter()
        .map(Arc::new)
        .collect();
    let app = app::App::new(stations, screen, app_tx, listener_station);
    let result = app.run(app_rx, screen_rx).await;

    engine.shutdown().await;
    tracing::info!("nowplaying exiting");
    result
}

async fn forward_engine_events(
    mut engine_rx: mpsc::Receiver<EngineEvent>,
    screen_tx: mpsc::Sender<ScreenMessage>,
) {
    while let Some(evt) = engine_rx.recv().await {
        if screen_tx.send(ScreenMessage::Engine(evt)).await.is_err() {
            break;
        }
    }
}
