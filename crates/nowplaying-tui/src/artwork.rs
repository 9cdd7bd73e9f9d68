//! Remote artwork download.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nowplaying_proto::track::ArtworkImage;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ArtworkError {
    #[error("artwork request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("artwork server returned HTTP {0}")]
    Status(u16),
}

#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ArtworkImage, ArtworkError>;
}

pub struct HttpArtworkFetcher {
    client: reqwest::Client,
}

impl HttpArtworkFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nowplaying/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, url: &str) -> Result<ArtworkImage, ArtworkError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ArtworkError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await?;
        debug!("artwork: {} bytes from {}", bytes.len(), url);
        Ok(ArtworkImage::Remote {
            url: url.to_string(),
            bytes: Arc::new(bytes.to_vec()),
        })
    }
}
