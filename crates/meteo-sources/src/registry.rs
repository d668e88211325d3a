//! Weather source registry

use crate::{OpenMeteoArchive, SimulatedSource, SourceError, SourceResult};
use meteo_core::WeatherSource;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Registry of named weather source factories
pub struct SourceRegistry {
    factories: Arc<RwLock<HashMap<String, Box<dyn SourceFactory>>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry holding the built-in `open-meteo` and `simulator` sources
    pub async fn with_builtin(base_url: impl Into<String>, timeout: Duration) -> Self {
        let registry = Self::new();
        registry
            .register(
                "open-meteo".to_string(),
                OpenMeteoFactory {
                    base_url: base_url.into(),
                    timeout,
                },
            )
            .await;
        registry
            .register("simulator".to_string(), SimulatorFactory { gap_every: None })
            .await;
        registry
    }

    /// Register a new source factory
    pub async fn register<F>(&self, name: String, factory: F)
    where
        F: SourceFactory + 'static,
    {
        let mut factories = self.factories.write().await;
        factories.insert(name, Box::new(factory));
    }

    /// Create a source instance by name
    pub async fn create(&self, name: &str) -> SourceResult<Arc<dyn WeatherSource>> {
        let factories = self.factories.read().await;
        let factory = factories
            .get(name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))?;
        factory.create()
    }

    /// List all available source names
    pub async fn list_sources(&self) -> Vec<String> {
        let factories = self.factories.read().await;
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory trait for creating source instances
pub trait SourceFactory: Send + Sync {
    fn create(&self) -> SourceResult<Arc<dyn WeatherSource>>;
}

pub struct OpenMeteoFactory {
    pub base_url: String,
    pub timeout: Duration,
}

impl SourceFactory for OpenMeteoFactory {
    fn create(&self) -> SourceResult<Arc<dyn WeatherSource>> {
        Ok(Arc::new(OpenMeteoArchive::new(&self.base_url, self.timeout)?))
    }
}

pub struct SimulatorFactory {
    pub gap_every: Option<usize>,
}

impl SourceFactory for SimulatorFactory {
    fn create(&self) -> SourceResult<Arc<dyn WeatherSource>> {
        Ok(Arc::new(match self.gap_every {
            Some(n) => SimulatedSource::with_gaps(n),
            None => SimulatedSource::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_BASE_URL;

    #[tokio::test]
    async fn test_builtin_sources() {
        let registry = SourceRegistry::with_builtin(DEFAULT_BASE_URL, Duration::from_secs(1)).await;
        assert_eq!(registry.list_sources().await, vec!["open-meteo", "simulator"]);

        let source = registry.create("simulator").await.unwrap();
        assert_eq!(source.name(), "simulator");

        let source = registry.create("open-meteo").await.unwrap();
        assert_eq!(source.name(), "open-meteo");
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let registry = SourceRegistry::new();
        registry
            .register("sim".to_string(), SimulatorFactory { gap_every: Some(3) })
            .await;

        assert!(registry.create("sim").await.is_ok());
        assert!(matches!(
            registry.create("netatmo").await,
            Err(SourceError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_base_url() {
        let registry = SourceRegistry::with_builtin("not a url", Duration::from_secs(1)).await;
        assert!(matches!(
            registry.create("open-meteo").await,
            Err(SourceError::InvalidUrl(_))
        ));
    }
}
