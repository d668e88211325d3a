//! Meteo Mapper daemon - headless timeline playback
//!
//! This binary coordinates:
//! - Restoring polygons and the timeline from the snapshot directory
//! - Advancing the timeline on a playback clock
//! - Refreshing every polygon and persisting the result

mod config;
mod scheduler;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meteo_refresh::{RefreshCoordinator, SignificanceThresholds};
use meteo_sinks::{FsSnapshotSink, SnapshotSink};
use meteo_sources::{SourceRegistry, DEFAULT_BASE_URL};
use meteo_store::PolygonStore;

use crate::config::DaemonConfig;
use crate::scheduler::Scheduler;

const SOURCE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meteo Mapper daemon");

    // Load configuration
    let config = DaemonConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    // Weather source
    let registry = SourceRegistry::with_builtin(DEFAULT_BASE_URL, SOURCE_TIMEOUT).await;
    let source = registry
        .create(&config.source)
        .await
        .with_context(|| format!("Failed to create source {:?}", config.source))?;
    info!("Weather source ready: {}", source.name());

    // Restore persisted state
    let mut snapshots = FsSnapshotSink::new(&config.state_dir).with_context(|| {
        format!("Failed to open state dir {}", config.state_dir.display())
    })?;
    let (store, selection) = match snapshots.load().await {
        Ok(Some(state)) => {
            let selection = state.timeline.unwrap_or(config.selection);
            (PolygonStore::restore(state), selection)
        }
        Ok(None) => (PolygonStore::new(), config.selection),
        Err(e) => {
            warn!("Ignoring unreadable snapshot: {:#}", e);
            (PolygonStore::new(), config.selection)
        }
    };
    info!("Restored {} polygons", store.len());

    let coordinator = Arc::new(
        RefreshCoordinator::new(Arc::new(RwLock::new(store)), source)
            .with_thresholds(SignificanceThresholds::new(config.threshold)),
    );

    // Create and run scheduler
    let mut scheduler = Scheduler::new(
        coordinator,
        Box::new(snapshots) as Box<dyn SnapshotSink>,
        selection,
        config.playback_interval,
        config.playing,
    );

    info!("Daemon running - press Ctrl+C to stop");

    // Run until shutdown signal
    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                error!("Scheduler error: {}", e);
                return Err(e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            scheduler.stop().await?;
        }
    }

    info!("Meteo Mapper daemon stopped");
    Ok(())
}
