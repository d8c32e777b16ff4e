//! Stream state machine.
//!
//! Chooses between the live stream and the looping playlist, reacting to
//! liveness probes, user intents and audio events. An explicit pause is sticky
//! across probe-driven switches until the user presses play again.
//!
//! Automatic recovery from playback errors is capped: the
//! [`MAX_CONSECUTIVE_ERRORS`]th error in a row clears the source and parks the
//! machine until the next user action.

use tracing::{debug, info, warn};

use crate::audio::{AudioEvent, AudioSink};
use crate::song::{RadioPlaybackState, Song};

pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    LivePlaying,
    LiveIdle,
    PlaylistPlaying,
    PlaylistIdle,
    OfflineIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// No probe has answered yet
    Unknown,
    Live,
    Playlist,
    Offline,
}

pub struct StreamStateMachine {
    sink: Box<dyn AudioSink>,
    stream_url: String,
    playlist: Vec<Song>,
    index: usize,
    live_song: Option<Song>,
    mode: Mode,
    is_playing: bool,
    user_paused: bool,
    consecutive_errors: u32,
    suspended: bool,
    /// Source a play attempt is in flight for
    pending: Option<String>,
    /// Source currently loaded in the sink
    loaded: Option<String>,
}

impl StreamStateMachine {
    pub fn new(sink: Box<dyn AudioSink>, stream_url: impl Into<String>) -> Self {
        Self {
            sink,
            stream_url: stream_url.into(),
            playlist: Vec::new(),
            index: 0,
            live_song: None,
            mode: Mode::Unknown,
            is_playing: false,
            user_paused: false,
            consecutive_errors: 0,
            suspended: false,
            pending: None,
            loaded: None,
        }
    }

    pub fn state(&self) -> StreamState {
        match (self.mode, self.is_playing) {
            (Mode::Live, true) => StreamState::LivePlaying,
            (Mode::Live, false) => StreamState::LiveIdle,
            (Mode::Playlist, true) => StreamState::PlaylistPlaying,
            (Mode::Playlist, false) => StreamState::PlaylistIdle,
            (Mode::Offline | Mode::Unknown, _) => StreamState::OfflineIdle,
        }
    }

    pub fn current_song(&self) -> Option<Song> {
        match self.mode {
            Mode::Live => self.live_song.clone(),
            Mode::Playlist => self.playlist.get(self.index).cloned(),
            Mode::Offline => Some(Song::offline()),
            Mode::Unknown => None,
        }
    }

    pub fn snapshot(&self) -> RadioPlaybackState {
        RadioPlaybackState {
            is_playing: self.is_playing,
            is_live: self.mode == Mode::Live,
            current_song: self.current_song(),
        }
    }

    pub fn playlist_index(&self) -> usize {
        self.index
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// True once automatic recovery has given up.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn source_url(&self) -> Option<String> {
        match self.mode {
            Mode::Live => Some(self.stream_url.clone()),
            Mode::Playlist => self.playlist.get(self.index).map(|s| s.url.clone()),
            Mode::Offline | Mode::Unknown => None,
        }
    }

    fn resume_after_switch(&self) -> bool {
        self.is_playing && !self.user_paused && !self.suspended
    }

    /// Stop output and forget the loaded source.
    fn halt(&mut self) {
        self.sink.pause();
        self.is_playing = false;
        self.pending = None;
        self.loaded = None;
    }

    /// Load the current source if needed and ask the sink to play it.
    fn start(&mut self) {
        loop {
            let Some(url) = self.source_url() else {
                debug!("Nothing to play");
                self.is_playing = false;
                return;
            };

            if self.pending.as_deref() == Some(url.as_str()) {
                debug!("Play already pending for {}", url);
                return;
            }

            if self.loaded.as_deref() != Some(url.as_str()) {
                self.sink.load(&url);
                self.loaded = Some(url.clone());
            }

            self.pending = Some(url);
            match self.sink.play() {
                Ok(()) => {
                    self.is_playing = true;
                    return;
                }
                Err(e) => {
                    self.pending = None;
                    if !self.record_error(&e.to_string()) {
                        return;
                    }
                }
            }
        }
    }

    /// Count a playback error. Returns whether another attempt is allowed.
    fn record_error(&mut self, reason: &str) -> bool {
        self.consecutive_errors += 1;
        warn!(
            "Playback error {}/{}: {}",
            self.consecutive_errors, MAX_CONSECUTIVE_ERRORS, reason
        );

        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            warn!("Too many playback errors, waiting for the listener");
            self.sink.clear();
            self.loaded = None;
            self.pending = None;
            self.is_playing = false;
            self.suspended = true;
            return false;
        }

        self.loaded = None;
        true
    }

    /// Explicit play from the listener. Always honoured.
    pub fn play(&mut self) {
        self.user_paused = false;
        self.suspended = false;
        self.consecutive_errors = 0;
        self.pending = None;
        self.start();
    }

    /// Explicit pause from the listener. Sticky until the next [`play`](Self::play).
    pub fn pause(&mut self) {
        self.user_paused = true;
        self.halt();
    }

    /// Apply a liveness probe result. `None` means the mount was not found.
    pub fn on_probe(&mut self, live: Option<Song>) {
        match (live, self.mode) {
            (Some(song), Mode::Live) => {
                if self.live_song.as_ref() != Some(&song) {
                    debug!("Live metadata now {} - {}", song.title, song.artist);
                    self.live_song = Some(song);
                }
            }
            (Some(song), _) => {
                info!("Live stream is up");
                let resume = self.resume_after_switch();
                self.halt();
                self.live_song = Some(song);
                self.mode = Mode::Live;
                if resume {
                    self.start();
                }
            }
            (None, Mode::Live) => {
                info!("Live stream is down");
                let resume = self.resume_after_switch();
                self.halt();
                self.live_song = None;
                self.enter_fallback();
                if resume {
                    self.start();
                }
            }
            (None, Mode::Unknown) => self.enter_fallback(),
            (None, Mode::Playlist | Mode::Offline) => {}
        }
    }

    /// Playlist from index 0 when there is one, otherwise offline.
    fn enter_fallback(&mut self) {
        if self.playlist.is_empty() {
            self.mode = Mode::Offline;
            self.sink.clear();
            self.loaded = None;
        } else {
            self.mode = Mode::Playlist;
            self.index = 0;
        }
    }

    /// Replace the playlist, keeping the current position when possible.
    pub fn set_playlist(&mut self, songs: Vec<Song>) {
        self.playlist = songs;

        match self.mode {
            Mode::Playlist if self.playlist.is_empty() => {
                info!("Playlist emptied, going offline");
                self.halt();
                self.mode = Mode::Offline;
                self.sink.clear();
            }
            Mode::Playlist => {
                self.index = self.index.min(self.playlist.len() - 1);
                let url = self.source_url();
                if self.loaded.is_some() && self.loaded != url {
                    let resume = self.is_playing;
                    self.halt();
                    if resume {
                        self.start();
                    }
                }
            }
            Mode::Offline | Mode::Unknown if !self.playlist.is_empty() => {
                self.mode = Mode::Playlist;
                self.index = 0;
            }
            _ => {}
        }
    }

    pub fn on_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::Playing => {
                self.pending = None;
                self.consecutive_errors = 0;
                self.is_playing = true;
            }
            AudioEvent::Ended => {
                self.pending = None;
                self.consecutive_errors = 0;
                if self.mode == Mode::Playlist && !self.playlist.is_empty() {
                    self.index = (self.index + 1) % self.playlist.len();
                    self.start();
                } else {
                    self.is_playing = false;
                }
            }
            AudioEvent::Error(reason) => {
                let in_flight = self.is_playing || self.pending.is_some();
                self.pending = None;
                if !in_flight || self.suspended || self.user_paused {
                    debug!("Ignoring playback error while idle: {}", reason);
                    return;
                }
                if self.record_error(&reason) {
                    self.start();
                }
            }
        }
    }
}
