//! Shared types for the nowplaying radio player: stations, the now-playing
//! track, configuration and platform paths.

pub mod config;
pub mod metadata;
pub mod platform;
pub mod protocol;
pub mod station;
pub mod track;
