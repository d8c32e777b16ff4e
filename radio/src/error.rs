//! Error types for the radio station.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RadioError>;

#[derive(Error, Debug)]
pub enum RadioError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Status endpoint unreachable or returned an unusable document
    #[error("Status probe failed: {0}")]
    Probe(String),

    /// Playlist table could not be read
    #[error("Playlist fetch failed: {0}")]
    Playlist(String),

    /// Audio output refused to start
    #[error("Playback error: {0}")]
    Playback(String),

    /// The station task has stopped
    #[error("Station is not running")]
    StationClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
