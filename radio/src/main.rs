//! Radio Monitor - Runs the station headless and prints every state change.
//!
//! Each broadcast `RadioPlaybackState` is written to stdout as one JSON line.
//! Logs go to stderr. Stops on Ctrl-C.

use radio::{
    station, IcecastProbe, RadioConfig, StatePublisher, Station, StreamStateMachine,
    SupabasePlaylist, TracingSink,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = RadioConfig::from_env()?;

    let (handle, commands) = station::channel();
    let machine = StreamStateMachine::new(
        Box::new(TracingSink::new(handle.clone())),
        config.stream_url.clone(),
    );
    let publisher = StatePublisher::new(32);
    let mut states = publisher.subscribe();

    let station = Station::new(
        machine,
        Arc::new(IcecastProbe::new(&config)?),
        Arc::new(SupabasePlaylist::new(&config)?),
        publisher,
        commands,
        config.poll_interval,
        config.playlist_refresh,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let driver = tokio::spawn(station.run(shutdown_rx));

    let printer = tokio::spawn(async move {
        loop {
            match states.recv().await {
                Ok(state) => match serde_json::to_string(&state) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Could not serialize state: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} state updates", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    handle.play()?;
    info!("Monitoring {} (mount {})", config.status_url, config.mount);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    // The driver may already have stopped; nothing to signal then.
    let _ = shutdown_tx.send(());

    driver.await?;
    printer.await?;
    Ok(())
}
