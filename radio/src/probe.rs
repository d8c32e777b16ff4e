//! Icecast liveness probe.
//!
//! `status-json.xsl` reports `icestats.source` as a single object when one
//! mount is up and as an array when several are. Both shapes are normalised
//! before searching for the configured mount.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::RadioConfig;
use crate::error::{RadioError, Result};
use crate::song::{Song, LIVE_SONG_ID};

/// One entry of `icestats.source`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IcecastSource {
    pub listenurl: Option<String>,
    pub server_name: Option<String>,
    pub server_description: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl IcecastSource {
    fn mount_path(&self) -> Option<String> {
        let listen = self.listenurl.as_deref()?;
        let path = url::Url::parse(listen)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| listen.to_string());
        Some(path.trim_matches('/').to_string())
    }
}

/// Every source in a status document, whatever its shape.
pub fn normalize_sources(document: &Value) -> Vec<IcecastSource> {
    let parse = |v: &Value| serde_json::from_value::<IcecastSource>(v.clone()).ok();

    match document.pointer("/icestats/source") {
        Some(Value::Array(items)) => items.iter().filter_map(parse).collect(),
        Some(item @ Value::Object(_)) => parse(item).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Exact mount match, then partial, then the first source.
pub fn find_mount<'a>(sources: &'a [IcecastSource], mount: &str) -> Option<&'a IcecastSource> {
    let mount = mount.trim_matches('/');

    sources
        .iter()
        .find(|s| s.mount_path().as_deref() == Some(mount))
        .or_else(|| {
            sources.iter().find(|s| {
                s.listenurl.as_deref().is_some_and(|l| l.contains(mount))
                    || s.server_name.as_deref().is_some_and(|n| n.contains(mount))
            })
        })
        .or_else(|| sources.first())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Song describing the live stream from its Icecast metadata.
pub fn live_song(source: &IcecastSource, stream_url: &str) -> Song {
    Song {
        id: LIVE_SONG_ID.to_string(),
        title: non_blank(&source.title)
            .or_else(|| non_blank(&source.server_name))
            .unwrap_or_else(|| "Live".to_string()),
        artist: non_blank(&source.artist)
            .or_else(|| non_blank(&source.server_description))
            .unwrap_or_else(|| "Live".to_string()),
        url: stream_url.to_string(),
        duration: None,
    }
}

/// Live song for a status document, `None` when the mount is down.
pub fn live_status(document: &Value, mount: &str, stream_url: &str) -> Option<Song> {
    let sources = normalize_sources(document);
    find_mount(&sources, mount).map(|source| live_song(source, stream_url))
}

#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// The live song if the stream is up.
    async fn probe(&self) -> Result<Option<Song>>;
}

pub struct IcecastProbe {
    http: reqwest::Client,
    status_url: String,
    stream_url: String,
    mount: String,
}

impl IcecastProbe {
    pub fn new(config: &RadioConfig) -> Result<Self> {
        Self::with_timeout(config, config.probe_timeout)
    }

    pub fn with_timeout(config: &RadioConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            status_url: config.status_url.clone(),
            stream_url: config.stream_url.clone(),
            mount: config.mount.clone(),
        })
    }
}

#[async_trait]
impl LivenessProbe for IcecastProbe {
    async fn probe(&self) -> Result<Option<Song>> {
        let response = self
            .http
            .get(&self.status_url)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| RadioError::Probe(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RadioError::Probe(format!("status endpoint returned {}", response.status())));
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| RadioError::Probe(format!("invalid status document: {}", e)))?;

        let status = live_status(&document, &self.mount, &self.stream_url);
        debug!("Mount {} live: {}", self.mount, status.is_some());
        Ok(status)
    }
}
