//! Audio output seam.
//!
//! The machine drives a sink with `load`/`play`/`pause`/`clear`. The sink
//! reports what actually happened as [`AudioEvent`]s, which the station feeds
//! back into the machine.

use tracing::info;

use crate::error::Result;
use crate::station::StationHandle;

/// Something the audio output observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// Playback actually started
    Playing,
    /// The current track finished on its own
    Ended,
    /// Playback failed
    Error(String),
}

pub trait AudioSink: Send {
    /// Point the output at `url` without starting it.
    fn load(&mut self, url: &str);

    /// Ask the output to start. `Err` means the request was refused outright.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Drop the current source entirely.
    fn clear(&mut self);
}

/// Headless sink that logs every call and reports playback as started.
pub struct TracingSink {
    station: StationHandle,
    source: Option<String>,
}

impl TracingSink {
    pub fn new(station: StationHandle) -> Self {
        Self {
            station,
            source: None,
        }
    }
}

impl AudioSink for TracingSink {
    fn load(&mut self, url: &str) {
        info!("Loading {}", url);
        self.source = Some(url.to_string());
    }

    fn play(&mut self) -> Result<()> {
        match &self.source {
            Some(url) => {
                info!("Playing {}", url);
                self.station.audio_event(AudioEvent::Playing)
            }
            None => self
                .station
                .audio_event(AudioEvent::Error("no source loaded".to_string())),
        }
    }

    fn pause(&mut self) {
        info!("Paused");
    }

    fn clear(&mut self) {
        info!("Source cleared");
        self.source = None;
    }
}
