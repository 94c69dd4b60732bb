//! Connect to the first rover that answers, stream from it and print what it reports.
//!
//! Usage: `cargo run --example monitor [config.yaml]`
//!
//! Set `RUST_LOG=camrover_link=debug` for session details.

use anyhow::{Context, Result};
use camrover_link::{Rover, RoverConfig, SessionEvent, UpdateRate};
use futures::StreamExt;
use std::pin::pin;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            RoverConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => RoverConfig::default(),
    };

    let connection = Rover::connect(config).await.context("starting rover connection")?;
    let mut events = pin!(connection.events());
    let mut speeds = pin!(connection.speed_updates());
    let mut fps = pin!(connection.fps_updates());
    let mut frames = connection.frames(UpdateRate::Max(1));

    connection.start_streaming();
    info!("Waiting for a rover; press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = events.next() => match event {
                SessionEvent::Discovered(peer) => info!(peer = %peer, "Rover found"),
                SessionEvent::StreamingStarted(peer) => info!(peer = %peer, "Streaming"),
                SessionEvent::Faulted { reason } => {
                    info!("Session faulted: {reason}");
                    // Rediscovery waits for a fresh start trigger.
                    connection.start_streaming();
                }
                SessionEvent::DiscoveryStarted => info!("Discovering"),
            },
            Some(reading) = speeds.next() => {
                info!(left = reading.left, right = reading.right, "Wheel speeds");
            }
            Some(rate) = fps.next() => info!("{rate:.1} fps"),
            Some(frame) = frames.next() => {
                info!(sequence = frame.sequence, bytes = frame.len(), "Frame");
            }
        }
    }

    connection.shutdown();
    info!(
        frames = connection.stats().frames_received(),
        resets = connection.stats().socket_resets(),
        last_id = connection.last_message_id(),
        "Stopped"
    );
    Ok(())
}
