use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::StationsConfig;

/// A selectable radio stream. Immutable once loaded; the screen only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RadioStation {
    pub name: String,
    pub description: String,
    pub stream_url: String,
    /// Remote URL or local resource name used as fallback artwork.
    pub image_url: String,
}

impl RadioStation {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        stream_url: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            stream_url: stream_url.into(),
            image_url: image_url.into(),
        }
    }
}

// ── m3u ───────────────────────────────────────────────────────────────────────

pub fn parse_m3u_from_str(content: &str) -> Vec<RadioStation> {
    let mut stations = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let url = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| url.clone());

        stations.push(RadioStation {
            name,
            stream_url: url,
            ..RadioStation::default()
        });
    }

    stations
}

pub fn load_stations_from_m3u(path: &Path) -> anyhow::Result<Vec<RadioStation>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_m3u_from_str(&content))
}

// ── TOML ──────────────────────────────────────────────────────────────────────

/// Matches the `[[station]]` table; kept apart from `RadioStation` so the file
/// schema can use short keys.
#[derive(Debug, Deserialize)]
struct TomlStationFile {
    station: Vec<TomlStation>,
}

#[derive(Debug, Deserialize)]
struct TomlStation {
    name: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    image: String,
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<RadioStation>> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file
        .station
        .into_iter()
        .map(|s| RadioStation {
            name: s.name,
            description: s.description,
            stream_url: s.url,
            image_url: s.image,
        })
        .collect())
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<RadioStation>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

/// Built-in list used when no station file is configured.
pub fn demo_stations() -> Vec<RadioStation> {
    vec![
        RadioStation::new(
            "Groove Salad",
            "A nicely chilled plate of ambient beats and grooves",
            "https://ice1.somafm.com/groovesalad-128-mp3",
            "https://somafm.com/img3/groovesalad-400.jpg",
        ),
        RadioStation::new(
            "Drone Zone",
            "Served best chilled, safe with most medications",
            "https://ice1.somafm.com/dronezone-128-mp3",
            "https://somafm.com/img3/dronezone-400.jpg",
        ),
        RadioStation::new(
            "Secret Agent",
            "The soundtrack for your stylish, mysterious, dangerous life",
            "https://ice1.somafm.com/secretagent-128-mp3",
            "station-secretagent",
        ),
        RadioStation::new(
            "Indie Pop Rocks!",
            "New and classic favorite indie pop tracks",
            "https://ice1.somafm.com/indiepop-128-mp3",
            "",
        ),
    ]
}

/// TOML first, then the m3u fallback, then the built-in list.
pub fn load_stations(config: &StationsConfig) -> Vec<RadioStation> {
    if config.stations_toml.exists() {
        match load_stations_from_toml(&config.stations_toml) {
            Ok(stations) if !stations.is_empty() => {
                tracing::info!(
                    "loaded {} stations from {:?}",
                    stations.len(),
                    config.stations_toml
                );
                return stations;
            }
            Ok(_) => tracing::warn!("{:?} has no stations", config.stations_toml),
            Err(e) => tracing::warn!("failed to parse {:?}: {}", config.stations_toml, e),
        }
    }

    if !config.m3u_path.is_empty() {
        match load_stations_from_m3u(Path::new(&config.m3u_path)) {
            Ok(stations) if !stations.is_empty() => {
                tracing::info!("loaded {} stations from {}", stations.len(), config.m3u_path);
                return stations;
            }
            Ok(_) => tracing::warn!("{} has no stations", config.m3u_path),
            Err(e) => tracing::warn!("failed to read {}: {}", config.m3u_path, e),
        }
    }

    tracing::info!("using built-in station list");
    demo_stations()
}
