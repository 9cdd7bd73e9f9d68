//! System "now playing" surface: a watch channel for in-process readers (the
//! HTTP API) plus a JSON file other desktop widgets can poll.

use std::path::PathBuf;

use nowplaying_proto::protocol::NowPlayingInfo;
use nowplaying_proto::track::Track;
use tokio::sync::watch;
use tracing::warn;

pub struct NowPlayingCenter {
    tx: watch::Sender<Option<NowPlayingInfo>>,
    file_path: Option<PathBuf>,
}

impl NowPlayingCenter {
    pub fn new(file_path: Option<PathBuf>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, file_path }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NowPlayingInfo>> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<NowPlayingInfo> {
        self.tx.borrow().clone()
    }

    pub fn publish(&self, station: &str, track: &Track) {
        let info = NowPlayingInfo {
            station: station.to_string(),
            artist: track.artist.clone(),
            title: track.title.clone(),
            artwork: track.artwork_image.as_ref().map(|img| img.describe()),
            is_playing: track.is_playing,
            updated_at: chrono::Local::now(),
        };

        if let Some(path) = &self.file_path {
            match serde_json::to_vec_pretty(&info) {
                Ok(body) => {
                    if let Err(e) = std::fs::write(path, body) {
                        warn!("now playing: failed to write {}: {}", path.display(), e);
                    }
                }
                Err(e) => warn!("now playing: serialize failed: {}", e),
            }
        }

        self.tx.send_replace(Some(info));
    }
}
