//! Album-art lookup through the Last.fm `track.getInfo` API.

use std::time::Duration;

use async_trait::async_trait;
use nowplaying_proto::config::LookupConfig;
use serde_json::Value;
use tracing::debug;

/// Path fragment Last.fm uses for its "no artwork" placeholder image.
pub const NO_ARTWORK_SENTINEL: &str = "/noimage/";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup returned HTTP {0}")]
    Status(u16),

    #[error("unexpected lookup response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Resolve the largest album-art URL for a track.  `Ok(None)` means the
    /// service answered but has no artwork for it.
    async fn lookup_album_art(&self, artist: &str, title: &str)
        -> Result<Option<String>, LookupError>;

    /// False when lookups are disabled (e.g. no API key configured).
    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct LastFmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(config: &LookupConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nowplaying/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl MetadataLookup for LastFmClient {
    async fn lookup_album_art(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<String>, LookupError> {
        debug!("lookup: track.getInfo artist={:?} track={:?}", artist, title);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("method", "track.getInfo"),
                ("api_key", self.api_key.as_str()),
                ("artist", artist),
                ("track", title),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        let body: Value = resp.json().await?;
        parse_album_art(&body)
    }

    fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Pick the last (largest) entry of `track.album.image[]`.
pub fn parse_album_art(body: &Value) -> Result<Option<String>, LookupError> {
    if let Some(msg) = body.get("message").and_then(Value::as_str) {
        if body.get("error").is_some() {
            return Err(LookupError::Parse(format!("api error: {}", msg)));
        }
    }

    let images = body["track"]["album"]["image"]
        .as_array()
        .ok_or_else(|| LookupError::Parse("no track.album.image array".to_string()))?;
    let largest = images
        .last()
        .ok_or_else(|| LookupError::Parse("empty image array".to_string()))?;
    let url = largest["#text"]
        .as_str()
        .ok_or_else(|| LookupError::Parse("image entry without #text".to_string()))?;

    if url.contains(NO_ARTWORK_SENTINEL) {
        Ok(None)
    } else {
        Ok(Some(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body_with_images(urls: &[&str]) -> Value {
        let images: Vec<Value> = urls
            .iter()
            .zip(["small", "medium", "large", "extralarge"])
            .map(|(u, size)| json!({"#text": u, "size": size}))
            .collect();
        json!({"track": {"name": "Kerala", "album": {"title": "Migration", "image": images}}})
    }

    #[test]
    fn test_picks_largest_image() {
        let body = body_with_images(&[
            "https://lastfm.freetls.fastly.net/i/u/34s/a.png",
            "https://lastfm.freetls.fastly.net/i/u/64s/a.png",
            "https://lastfm.freetls.fastly.net/i/u/300x300/a.png",
        ]);
        assert_eq!(
            parse_album_art(&body).unwrap().as_deref(),
            Some("https://lastfm.freetls.fastly.net/i/u/300x300/a.png")
        );
    }

    #[test]
    fn test_sentinel_means_no_artwork() {
        let body = body_with_images(&["http://cdn.last.fm/flatness/catalogue/noimage/2/default_album_medium.png"]);
        assert_eq!(parse_album_art(&body).unwrap(), None);
    }

    #[test]
    fn test_missing_album_is_parse_error() {
        let body = json!({"track": {"name": "Kerala"}});
        assert!(matches!(parse_album_art(&body), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_empty_image_list_is_parse_error() {
        let body = body_with_images(&[]);
        assert!(matches!(parse_album_art(&body), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_api_error_is_parse_error() {
        let body = json!({"error": 6, "message": "Track not found", "links": []});
        assert!(matches!(parse_album_art(&body), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_disabled_without_key() {
        let client = LastFmClient::new(&LookupConfig::default()).unwrap();
        assert!(!client.is_enabled());
        let client = LastFmClient::new(&LookupConfig {
            api_key: "k".into(),
            ..LookupConfig::default()
        })
        .unwrap();
        assert!(client.is_enabled());
    }
}
