//! Now-playing record and its artwork handle.

use std::sync::Arc;

/// Opaque artwork handle.  The terminal front end never decodes the bytes; it
/// only needs to know which kind of image is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkImage {
    /// Built-in album-art placeholder.
    Default,
    /// Local named resource (e.g. `station-absolutecountry`).
    Named(String),
    /// Downloaded image body.
    Remote { url: String, bytes: Arc<Vec<u8>> },
}

impl ArtworkImage {
    /// Short descriptor for labels, logs and the published now-playing info.
    pub fn describe(&self) -> String {
        match self {
            Self::Default => "default".to_string(),
            Self::Named(name) => name.clone(),
            Self::Remote { url, .. } => url.clone(),
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Self::Remote { bytes, .. } => bytes.len(),
            _ => 0,
        }
    }
}

/// Mutable metadata for the song currently on air.
///
/// `is_playing` mirrors the last command sent to the engine, not what the
/// speakers are doing.  `artwork_loaded` only flips to true once an image has
/// actually been applied (remote download, named resource, or the default).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub is_playing: bool,
    pub artwork_url: String,
    pub artwork_image: Option<ArtworkImage>,
    pub artwork_loaded: bool,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }
}
