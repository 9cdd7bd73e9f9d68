//! AppState — shared read-only data passed to all components during render/event.
//!
//! Components read this, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::collections::HashMap;
use std::sync::Arc;

use nowplaying_proto::station::RadioStation;

use crate::screen::NowPlayingScreen;

/// Last song a station reported, as seen through the track listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastTrack {
    pub artist: String,
    pub title: String,
    pub artwork: Option<String>,
}

pub struct AppState {
    pub stations: Vec<Arc<RadioStation>>,
    /// Index of the station whose screen is open, if any.
    pub active_station: Option<usize>,
    /// Keyed by station name.
    pub last_tracks: HashMap<String, LastTrack>,
    pub screen: NowPlayingScreen,
    /// Monotonic UI frame counter, drives the now-playing bars.
    pub frame: u64,
}

impl AppState {
    pub fn new(stations: Vec<Arc<RadioStation>>, screen: NowPlayingScreen) -> Self {
        Self {
            stations,
            active_station: None,
            last_tracks: HashMap::new(),
            screen,
            frame: 0,
        }
    }
}
