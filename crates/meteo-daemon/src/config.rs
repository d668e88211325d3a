//! Daemon configuration from environment variables

use anyhow::{Context, Result};
use meteo_core::{ThresholdPolicy, TimeSelection, TimeUnit, TimelineMode};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Snapshot directory (default: ./meteo-state)
    pub state_dir: PathBuf,

    /// Weather source name (default: simulator)
    pub source: String,

    /// Seconds between playback ticks (default: 1)
    pub playback_interval: Duration,

    /// Whether each tick advances the timeline (default: true)
    pub playing: bool,

    /// Selection used when the snapshot carries none
    pub selection: TimeSelection,

    pub threshold: ThresholdPolicy,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let state_dir = PathBuf::from(var("METEO_STATE_DIR").unwrap_or_else(|| "./meteo-state".into()));

        let source = var("METEO_SOURCE").unwrap_or_else(|| "simulator".to_string());

        let playback_secs: f64 = var("PLAYBACK_INTERVAL")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .context("Invalid PLAYBACK_INTERVAL")?;
        if !playback_secs.is_finite() || playback_secs <= 0.0 {
            anyhow::bail!("PLAYBACK_INTERVAL must be positive, got {playback_secs}");
        }

        let playing = var("PLAYBACK")
            .map(|v| !matches!(v.as_str(), "0" | "false" | "off"))
            .unwrap_or(true);

        let unit: TimeUnit = var("TIME_UNIT")
            .unwrap_or_else(|| "hour".to_string())
            .parse()
            .context("Invalid TIME_UNIT")?;

        let mode: TimelineMode = var("TIMELINE_MODE")
            .unwrap_or_else(|| "range".to_string())
            .parse()
            .context("Invalid TIMELINE_MODE")?;

        let threshold = var("SIGNIFICANCE_THRESHOLD")
            .unwrap_or_else(|| "1.0".to_string())
            .parse::<f64>()
            .context("Invalid SIGNIFICANCE_THRESHOLD")?;

        Ok(Self {
            state_dir,
            source,
            playback_interval: Duration::from_secs_f64(playback_secs),
            playing,
            selection: TimeSelection::default().with_unit(unit).with_mode(mode),
            threshold: ThresholdPolicy::new(threshold).context("Invalid SIGNIFICANCE_THRESHOLD")?,
        })
    }
}
