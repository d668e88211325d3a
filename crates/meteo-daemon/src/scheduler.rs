//! Timeline playback, refresh and persistence loop

use anyhow::{Context, Result};
use meteo_core::{format_range_label, Direction, TimeSelection};
use meteo_refresh::RefreshCoordinator;
use meteo_sinks::SnapshotSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Drives the coordinator on a fixed playback clock
pub struct Scheduler {
    coordinator: Arc<RefreshCoordinator>,
    snapshots: Box<dyn SnapshotSink>,
    selection: TimeSelection,
    interval: Duration,
    playing: bool,
    running: bool,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        snapshots: Box<dyn SnapshotSink>,
        selection: TimeSelection,
        interval: Duration,
        playing: bool,
    ) -> Self {
        Self {
            coordinator,
            snapshots,
            selection,
            interval,
            playing,
            running: false,
        }
    }

    /// Refresh for the current selection, then keep ticking
    pub async fn run(&mut self) -> Result<()> {
        self.running = true;

        info!("Scheduler started");
        info!("Playback interval: {:?}", self.interval);
        info!("Playing: {}", self.playing);

        if let Err(e) = self.cycle().await {
            error!("Error in initial refresh: {:#}", e);
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.running {
            ticker.tick().await;
            match self.tick().await {
                Ok(()) => {}
                Err(e) => {
                    error!("Error in playback tick: {:#}", e);
                    // Continue running despite errors
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Advance the timeline (when playing) and run one cycle
    pub async fn tick(&mut self) -> Result<()> {
        if self.playing {
            self.selection = self.selection.step(Direction::Forward);
        }
        self.cycle().await
    }

    async fn cycle(&mut self) -> Result<()> {
        let now = self.coordinator.now();
        let outcomes = self.coordinator.refresh_all(&self.selection).await;

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for (_, outcome) in &outcomes {
            *counts.entry(outcome.kind()).or_default() += 1;
        }
        info!(
            "Timeline {}: refreshed {} polygons {:?}",
            format_range_label(&self.selection, now),
            outcomes.len(),
            counts
        );

        self.persist().await
    }

    async fn persist(&mut self) -> Result<()> {
        let mut state = self.coordinator.snapshot().await;
        state.timeline = Some(self.selection);
        self.snapshots
            .save(&state)
            .await
            .context("Failed to save snapshot")
    }

    pub fn selection(&self) -> TimeSelection {
        self.selection
    }

    /// Stop the loop and flush the final snapshot
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping scheduler...");
        self.running = false;

        if let Err(e) = self.persist().await {
            warn!("Error flushing snapshot: {:#}", e);
        }

        info!("Scheduler stopped successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meteo_core::{Coordinate, DataSource, FixedClock};
    use meteo_sinks::FsSnapshotSink;
    use meteo_sources::SimulatedSource;
    use meteo_store::PolygonStore;
    use tokio::sync::RwLock;

    fn coordinator() -> Arc<RefreshCoordinator> {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 14, 30, 0).unwrap();
        Arc::new(
            RefreshCoordinator::new(
                Arc::new(RwLock::new(PolygonStore::new())),
                Arc::new(SimulatedSource::new()),
            )
            .with_clock(Arc::new(FixedClock(now))),
        )
    }

    #[tokio::test]
    async fn test_tick_advances_refreshes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator();
        let polygon = coordinator
            .create_polygon(
                None,
                vec![
                    Coordinate::new(7.0, 45.0),
                    Coordinate::new(7.2, 45.0),
                    Coordinate::new(7.1, 45.2),
                ],
                DataSource::default(),
            )
            .await
            .unwrap();

        let mut scheduler = Scheduler::new(
            Arc::clone(&coordinator),
            Box::new(FsSnapshotSink::new(dir.path()).unwrap()),
            TimeSelection::default(),
            Duration::from_secs(1),
            true,
        );
        scheduler.tick().await.unwrap();

        assert_eq!(scheduler.selection().step_range(), [1, 25]);
        assert!(coordinator.get(&polygon.id).await.unwrap().has_data());

        let saved = FsSnapshotSink::new(dir.path())
            .unwrap()
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.timeline, Some(scheduler.selection()));
        assert!(saved.polygons[&polygon.id].current_average.is_some());
    }

    #[tokio::test]
    async fn test_paused_tick_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut scheduler = Scheduler::new(
            coordinator(),
            Box::new(FsSnapshotSink::new(dir.path()).unwrap()),
            TimeSelection::default(),
            Duration::from_secs(1),
            false,
        );
        scheduler.tick().await.unwrap();
        scheduler.stop().await.unwrap();

        assert_eq!(scheduler.selection(), TimeSelection::default());
        assert!(dir.path().join(meteo_sinks::STATE_FILE).exists());
    }
}
