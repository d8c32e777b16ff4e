//! Looping playlist stored in the Supabase `playlist` table.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::RadioConfig;
use crate::error::{RadioError, Result};
use crate::song::Song;

#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Tracks in play order.
    async fn fetch(&self) -> Result<Vec<Song>>;
}

/// PostgREST reader for the `playlist` table.
pub struct SupabasePlaylist {
    http: reqwest::Client,
    endpoint: String,
    anon_key: String,
}

impl SupabasePlaylist {
    pub fn new(config: &RadioConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/rest/v1/playlist?select=id,title,artist,url,duration&order=order.asc",
                config.supabase_url
            ),
            anon_key: config.supabase_anon_key.clone(),
        })
    }
}

#[async_trait]
impl PlaylistSource for SupabasePlaylist {
    async fn fetch(&self) -> Result<Vec<Song>> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await
            .map_err(|e| RadioError::Playlist(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RadioError::Playlist(format!("{}: {}", status, body)));
        }

        let mut songs: Vec<Song> = response
            .json()
            .await
            .map_err(|e| RadioError::Playlist(format!("invalid playlist rows: {}", e)))?;

        songs.retain(|song| !song.url.trim().is_empty());
        debug!("Fetched {} playlist tracks", songs.len());
        Ok(songs)
    }
}
