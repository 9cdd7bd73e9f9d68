use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub stations: StationsConfig,
}

/// Streaming engine (mpv) tuning and transport timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Forward demuxer cache budget handed to mpv.
    #[serde(default = "default_demuxer_max_bytes")]
    pub demuxer_max_bytes: u64,
    /// Backward demuxer cache budget; this is what makes rewind possible on a live stream.
    #[serde(default = "default_demuxer_max_back_bytes")]
    pub demuxer_max_back_bytes: u64,
    #[serde(default = "default_seek_step_secs")]
    pub seek_step_secs: f64,
    #[serde(default = "default_seek_repeat_ms")]
    pub seek_repeat_ms: u64,
    #[serde(default = "default_buffer_refresh_ms")]
    pub buffer_refresh_ms: u64,
}

/// Album-art lookup against the Last.fm web API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Empty disables lookups. `LASTFM_API_KEY` overrides this at load time.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Station list source — a local TOML file, falling back to an m3u playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// Defaults to `$XDG_CONFIG_HOME/nowplaying/stations.toml`.
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
    /// Local path to an m3u playlist. Empty disables the fallback.
    #[serde(default)]
    pub m3u_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            demuxer_max_bytes: default_demuxer_max_bytes(),
            demuxer_max_back_bytes: default_demuxer_max_back_bytes(),
            seek_step_secs: default_seek_step_secs(),
            seek_repeat_ms: default_seek_repeat_ms(),
            buffer_refresh_ms: default_buffer_refresh_ms(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_lookup_endpoint(),
            timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            stations_toml: default_stations_toml(),
            m3u_path: String::new(),
        }
    }
}

fn default_volume() -> f32 {
    0.5
}

fn default_demuxer_max_bytes() -> u64 {
    32 * 1024 * 1024
}

fn default_demuxer_max_back_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_seek_step_secs() -> f64 {
    10.0
}

fn default_seek_repeat_ms() -> u64 {
    300
}

fn default_buffer_refresh_ms() -> u64 {
    200
}

fn default_lookup_endpoint() -> String {
    "http://ws.audioscrobbler.com/2.0/".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)?
        } else {
            let config = Self::default();
            config.save()?;
            config
        };

        if let Ok(key) = std::env::var("LASTFM_API_KEY") {
            if !key.trim().is_empty() {
                config.lookup.api_key = key.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
