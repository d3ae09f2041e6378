//! heos - HEOS device monitor
//!
//! Connects to a device (configured or discovered), registers for change
//! events, logs every event and keeps the connection alive with heartbeats.

mod config;

use config::Config;
use heos_client::{discover, system, Connection, Endpoint, HeosEvent};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("HEOS_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    let endpoint = match config.device.host {
        Some(host) => Endpoint::new(host),
        None => {
            tracing::info!(
                "Discovering devices ({} ms)...",
                config.discovery.timeout_ms
            );
            match discover(&config.discovery_options()).await?.into_iter().next() {
                Some(endpoint) => endpoint,
                None => {
                    tracing::error!("No device found");
                    return Err("no device found; set device.host or HEOS_HOST".into());
                }
            }
        }
    };

    let connection = Connection::new(config.connection_config(endpoint));

    tracing::info!("Starting heos monitor");
    tracing::info!("  Device: {}", connection.endpoint());
    match config.monitor.heartbeat_interval() {
        Some(interval) => tracing::info!("  Heartbeat: every {:?}", interval),
        None => tracing::info!("  Heartbeat: disabled"),
    }

    // Subscribe before connecting so no event is missed
    let mut events = connection.subscribe_events();
    connection.connect().await?;
    tracing::info!("Connected to {}", connection.endpoint());

    if config.monitor.register_events {
        system::register_for_change_events(&connection, true).await?;
        tracing::info!("Registered for change events");
    }

    let heartbeat = config
        .monitor
        .heartbeat_interval()
        .map(|interval| tokio::spawn(heartbeat_loop(connection.clone(), interval)));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => log_event(&event, config.monitor.pretty),
                Err(RecvError::Lagged(n)) => tracing::warn!("Lagged {} events", n),
                Err(RecvError::Closed) => break,
            },
            _ = wait_disconnected(&connection) => {
                tracing::error!("Connection lost ({})", connection.status());
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, stopping monitor...");
                break;
            }
        }
    }

    if let Some(handle) = heartbeat {
        handle.abort();
    }
    connection.close().await?;

    tracing::info!("Monitor stopped");
    Ok(())
}

fn log_event(event: &HeosEvent, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(event)
    } else {
        serde_json::to_string(event)
    };
    match json {
        Ok(json) => tracing::info!("{}", json),
        Err(e) => tracing::warn!("Failed to serialize {:?}: {}", event, e),
    }
}

async fn heartbeat_loop(connection: Connection, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match system::heart_beat(&connection).await {
            Ok(()) => tracing::debug!("Heartbeat ok"),
            Err(e) if e.is_retryable() => tracing::warn!("Heartbeat failed: {}", e),
            Err(e) => {
                tracing::error!("Heartbeat failed: {}", e);
                break;
            }
        }
    }
}

/// Resolves once the connection has left the connected state.
async fn wait_disconnected(connection: &Connection) {
    let mut poll = tokio::time::interval(Duration::from_millis(500));
    while connection.is_connected() {
        poll.tick().await;
    }
}
