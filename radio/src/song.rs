//! Songs and the playback state shared with listeners.

use serde::{Deserialize, Deserializer, Serialize};

pub const OFFLINE_SONG_ID: &str = "offline";
pub const LIVE_SONG_ID: &str = "live";

/// A playable track or the live stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artist: String,
    pub url: String,
    /// Length in seconds, unknown for streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Song {
    /// Placeholder shown when nothing is live and no playlist is loaded.
    pub fn offline() -> Self {
        Self {
            id: OFFLINE_SONG_ID.to_string(),
            title: "Radio offline".to_string(),
            artist: "Vixis Radio".to_string(),
            url: String::new(),
            duration: None,
        }
    }
}

/// Playlist ids are numeric in some tables and UUIDs in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What every listener widget renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioPlaybackState {
    pub is_playing: bool,
    pub is_live: bool,
    pub current_song: Option<Song>,
}
