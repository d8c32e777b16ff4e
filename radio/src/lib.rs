//! Vixis radio station.
//!
//! Keeps a listener on the live Icecast stream while it is up and on the
//! looping playlist while it is not, and broadcasts the playback state to
//! every widget that shows it.

pub mod audio;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod machine;
pub mod playlist;
pub mod probe;
pub mod song;
pub mod station;

pub use audio::{AudioEvent, AudioSink, TracingSink};
pub use broadcast::StatePublisher;
pub use config::RadioConfig;
pub use error::{RadioError, Result};
pub use machine::{StreamState, StreamStateMachine, MAX_CONSECUTIVE_ERRORS};
pub use playlist::{PlaylistSource, SupabasePlaylist};
pub use probe::{IcecastProbe, LivenessProbe};
pub use song::{RadioPlaybackState, Song};
pub use station::{Station, StationCommand, StationHandle};
