use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_SOURCE: &str = "open-meteo";
pub const DEFAULT_BASE_URL: &str = "https://archive-api.open-meteo.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_THRESHOLD: f64 = 1.0;
pub const DEFAULT_DECISION_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `open-meteo` or `simulator`
    pub kind: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub threshold: Option<f64>,
    pub decision_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: Option<ServerConfig>,
    pub source: Option<SourceConfig>,
    pub refresh: Option<RefreshConfig>,
    pub decision: Option<DecisionConfig>,
    pub storage: Option<StorageConfig>,
    /// Significance threshold per data source, overriding `[refresh] threshold`
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid threshold for {name}: {value} (must be a positive number)")]
    InvalidThreshold { name: String, value: f64 },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Load configuration from the METEO_CONFIG path (TOML) if present, with defaults
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var("METEO_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(path)
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            Self::parse(&fs::read_to_string(path)?)?
        } else {
            AppConfig::default()
        };
        Ok(cfg)
    }

    pub fn parse(s: &str) -> ConfigResult<Self> {
        let cfg = toml::from_str::<AppConfig>(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> ConfigResult<()> {
        let base = self.refresh.as_ref().and_then(|r| r.threshold);
        let named = self.thresholds.iter().map(|(k, v)| (k.as_str(), Some(*v)));
        for (name, value) in std::iter::once(("refresh.threshold", base)).chain(named) {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::InvalidThreshold {
                        name: name.to_string(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    /// HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn source_kind(&self) -> String {
        self.source
            .as_ref()
            .and_then(|s| s.kind.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string())
    }

    pub fn source_base_url(&self) -> String {
        self.source
            .as_ref()
            .and_then(|s| s.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(
            self.source
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn threshold(&self) -> f64 {
        self.refresh
            .as_ref()
            .and_then(|r| r.threshold)
            .unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(
            self.refresh
                .as_ref()
                .and_then(|r| r.decision_timeout_ms)
                .unwrap_or(DEFAULT_DECISION_TIMEOUT_MS),
        )
    }

    pub fn decision_endpoint(&self) -> Option<&str> {
        self.decision.as_ref().and_then(|d| d.endpoint.as_deref())
    }

    pub fn storage_dir(&self) -> Option<&str> {
        self.storage.as_ref().and_then(|s| s.dir.as_deref())
    }
}
