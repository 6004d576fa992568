//! hey-santa-daemon: wake-word and session arbiter for a voice assistant
//!
//! The daemon runs in the background and provides:
//! - Ambient "Santa" wake-word detection through an external recognizer
//! - A session arbiter that hands the microphone between the wake-word
//!   listener and a remote conversational agent
//! - IPC server for UI clients and the recognizer bridge
//!
//! The daemon captures no audio itself. Transcripts arrive over IPC and
//! sessions run through a pluggable transport.

mod config;
mod error;
mod events;
mod ipc;
mod lifecycle;
mod permission;
mod platform;
mod recognition;
mod session;
mod state;
mod wake;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::StateEvent;
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::permission::ConfiguredPermission;
use crate::platform::Capabilities;
use crate::recognition::BridgeEngine;
use crate::session::{SimulatedTransport, TransportSink};
use crate::state::{Arbiter, ArbiterSettings, Collaborators, Input};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "hey-santa-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, agent_id = %config.agent_id, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Every collaborator reports back through the arbiter's input channel
    let (inputs_tx, inputs_rx) = mpsc::unbounded_channel::<Input>();
    let (event_tx, _event_rx) = broadcast::channel::<StateEvent>(64);

    let bridge = BridgeEngine::new(true);
    let transport = SimulatedTransport::new(
        config.simulated_connect_latency,
        TransportSink::new(inputs_tx.clone()),
    );
    let capabilities = Capabilities::detect().with_ambient_override(config.ambient_listening);

    let arbiter = Arbiter::new(
        ArbiterSettings {
            agent_id: config.agent_id.clone(),
            language: config.language.clone(),
            wake_phrases: config.wake_phrases.clone(),
            capabilities,
            timings: config.timings,
        },
        Collaborators {
            recognition: Arc::new(bridge.clone()),
            transport: Arc::new(transport),
            permission: Arc::new(ConfiguredPermission::new(config.microphone_access)),
        },
        inputs_tx.clone(),
        event_tx.clone(),
    );
    let snapshot = arbiter.subscribe();
    let agent_id = arbiter.agent_id().to_string();

    let server = Server::new(
        &config.socket_path,
        ServerContext {
            inputs: inputs_tx.clone(),
            snapshot,
            events: event_tx.clone(),
            bridge,
            agent_id,
            started_at: Instant::now(),
        },
    )?;

    // Subscribe before the arbiter publishes its first events
    let mut log_rx = event_tx.subscribe();
    let arbiter_task = tokio::spawn(arbiter.run(inputs_rx));

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log state events
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "state event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("state event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if inputs_tx.send(Input::Shutdown).is_err() {
        warn!("arbiter already stopped");
    }
    if let Err(e) = arbiter_task.await {
        error!(?e, "arbiter task failed");
    }
    server.shutdown().await;

    info!("hey-santa-daemon stopped");

    Ok(())
}
