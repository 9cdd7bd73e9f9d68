use serde::{Deserialize, Serialize};

/// Session status of the now-playing screen.
///
/// Transitions: `Idle → Loading → Playing ⇄ Paused`.  Connecting and
/// buffering are reported as status text while `Loading`, not as states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Loading => "LOAD",
            Self::Playing => "LIVE",
            Self::Paused => "PAUSE",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeekDirection {
    Rewind,
    FastForward,
}

impl SeekDirection {
    /// Signed offset for a relative seek of `secs`.
    pub fn signed(self, secs: f64) -> f64 {
        match self {
            Self::Rewind => -secs.abs(),
            Self::FastForward => secs.abs(),
        }
    }
}

/// Snapshot of the engine's stream buffer, in bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Total buffer budget.
    pub max_size: u64,
    /// Bytes currently held.
    pub current_usage: u64,
    /// Position of the playhead inside the held bytes.
    pub playing_offset: u64,
    /// Absolute byte offset into the source stream.
    pub byte_offset: u64,
}

impl BufferStats {
    /// Fill ratio, 0.0..=1.0.
    pub fn fill(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        (self.current_usage as f64 / self.max_size as f64).clamp(0.0, 1.0)
    }

    /// Playhead ratio, 0.0..=1.0.
    pub fn playhead(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        (self.playing_offset as f64 / self.max_size as f64).clamp(0.0, 1.0)
    }
}

/// What the lock-screen equivalent shows: published on every confirmed
/// metadata or artwork change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NowPlayingInfo {
    pub station: String,
    pub artist: String,
    pub title: String,
    /// Artwork descriptor: remote URL, resource name, or `default`.
    pub artwork: Option<String>,
    pub is_playing: bool,
    pub updated_at: chrono::DateTime<chrono::Local>,
}
