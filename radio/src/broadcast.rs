//! Fan-out of playback state to listener widgets.

use tokio::sync::broadcast;
use tracing::debug;

use crate::song::RadioPlaybackState;

/// Publishes [`RadioPlaybackState`] changes, suppressing repeats.
pub struct StatePublisher {
    tx: broadcast::Sender<RadioPlaybackState>,
    last: Option<RadioPlaybackState>,
}

impl StatePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, last: None }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RadioPlaybackState> {
        self.tx.subscribe()
    }

    pub fn last(&self) -> Option<&RadioPlaybackState> {
        self.last.as_ref()
    }

    /// Send `state` unless it equals the previous one. Returns whether it was new.
    pub fn publish(&mut self, state: RadioPlaybackState) -> bool {
        if self.last.as_ref() == Some(&state) {
            return false;
        }

        // No subscribers is fine; the state is still remembered.
        if self.tx.send(state.clone()).is_err() {
            debug!("No listeners for state update");
        }
        self.last = Some(state);
        true
    }
}
