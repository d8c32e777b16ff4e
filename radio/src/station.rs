//! Async driver that owns the state machine.
//!
//! One task ticks the liveness probe and playlist refresh timers, applies
//! listener intents and audio events arriving over a channel, and publishes
//! the resulting state after every step. It stops on the shutdown signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::audio::AudioEvent;
use crate::broadcast::StatePublisher;
use crate::error::{RadioError, Result};
use crate::machine::StreamStateMachine;
use crate::playlist::PlaylistSource;
use crate::probe::LivenessProbe;

#[derive(Debug, Clone, PartialEq)]
pub enum StationCommand {
    Play,
    Pause,
    Audio(AudioEvent),
}

/// Cloneable sender side of a station.
#[derive(Debug, Clone)]
pub struct StationHandle {
    tx: mpsc::UnboundedSender<StationCommand>,
}

impl StationHandle {
    fn send(&self, command: StationCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| RadioError::StationClosed)
    }

    pub fn play(&self) -> Result<()> {
        self.send(StationCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(StationCommand::Pause)
    }

    pub fn audio_event(&self, event: AudioEvent) -> Result<()> {
        self.send(StationCommand::Audio(event))
    }
}

/// Command channel for a station.
pub fn channel() -> (StationHandle, mpsc::UnboundedReceiver<StationCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StationHandle { tx }, rx)
}

pub struct Station {
    machine: StreamStateMachine,
    probe: Arc<dyn LivenessProbe>,
    playlist: Arc<dyn PlaylistSource>,
    publisher: StatePublisher,
    commands: mpsc::UnboundedReceiver<StationCommand>,
    poll_interval: Duration,
    playlist_refresh: Duration,
}

impl Station {
    pub fn new(
        machine: StreamStateMachine,
        probe: Arc<dyn LivenessProbe>,
        playlist: Arc<dyn PlaylistSource>,
        publisher: StatePublisher,
        commands: mpsc::UnboundedReceiver<StationCommand>,
        poll_interval: Duration,
        playlist_refresh: Duration,
    ) -> Self {
        Self {
            machine,
            probe,
            playlist,
            publisher,
            commands,
            poll_interval,
            playlist_refresh,
        }
    }

    pub fn machine(&self) -> &StreamStateMachine {
        &self.machine
    }

    /// Probe the live mount. A failed probe counts as "not found".
    pub async fn poll_live(&mut self) {
        let live = match self.probe.probe().await {
            Ok(live) => live,
            Err(e) => {
                warn!("Liveness probe failed: {}", e);
                None
            }
        };
        self.machine.on_probe(live);
    }

    /// Reload the playlist. A failed fetch keeps the current one.
    pub async fn refresh_playlist(&mut self) {
        match self.playlist.fetch().await {
            Ok(songs) => self.machine.set_playlist(songs),
            Err(e) => warn!("Keeping current playlist: {}", e),
        }
    }

    pub fn apply(&mut self, command: StationCommand) {
        match command {
            StationCommand::Play => self.machine.play(),
            StationCommand::Pause => self.machine.pause(),
            StationCommand::Audio(event) => self.machine.on_audio_event(event),
        }
    }

    pub fn publish(&mut self) -> bool {
        self.publisher.publish(self.machine.snapshot())
    }

    /// Drive the machine until `shutdown` fires or every handle is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut playlist_timer = interval(self.playlist_refresh);
        let mut probe_timer = interval(self.poll_interval);
        playlist_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        probe_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Station started, probing every {:?}, refreshing playlist every {:?}",
            self.poll_interval, self.playlist_refresh
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Station received shutdown signal.");
                    break;
                }
                _ = playlist_timer.tick() => self.refresh_playlist().await,
                _ = probe_timer.tick() => self.poll_live().await,
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        info!("All station handles dropped.");
                        break;
                    }
                },
            }

            self.publish();
        }
    }
}
