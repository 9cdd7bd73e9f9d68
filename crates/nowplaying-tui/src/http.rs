use crate::screen::{ScreenCommand, ScreenMessage};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use nowplaying_proto::protocol::NowPlayingInfo;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    now_playing: watch::Receiver<Option<NowPlayingInfo>>,
    screen_tx: mpsc::Sender<ScreenMessage>,
}

pub fn router(
    now_playing: watch::Receiver<Option<NowPlayingInfo>>,
    screen_tx: mpsc::Sender<ScreenMessage>,
) -> Router {
    let app_state = HttpState {
        now_playing,
        screen_tx,
    };

    Router::new()
        .route("/api/nowplaying", get(get_now_playing))
        .route("/api/play", get(play).post(play))
        .route("/api/pause", get(pause).post(pause))
        .route("/api/volume/:pct", get(set_volume).post(set_volume))
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    now_playing: watch::Receiver<Option<NowPlayingInfo>>,
    screen_tx: mpsc::Sender<ScreenMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(now_playing, screen_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_now_playing(
    State(state): State<HttpState>,
) -> Result<Json<NowPlayingInfo>, StatusCode> {
    let info = state.now_playing.borrow().clone();
    info.map(Json).ok_or(StatusCode::NO_CONTENT)
}

async fn send_command(state: &HttpState, cmd: ScreenCommand) -> StatusCode {
    if state.screen_tx.send(ScreenMessage::Command(cmd)).await.is_err() {
        error!("Failed to deliver command to the screen");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn play(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Play");
    send_command(&state, ScreenCommand::Play).await
}

async fn pause(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Pause");
    send_command(&state, ScreenCommand::Pause).await
}

async fn set_volume(State(state): State<HttpState>, Path(pct): Path<u8>) -> StatusCode {
    info!("HTTP API: Volume {}%", pct);
    let volume = (pct.min(100) as f32) / 100.0;
    send_command(&state, ScreenCommand::SetVolume(volume)).await
}
