//! Simulated weather source for offline runs and testing

use chrono::{Datelike, Duration, Timelike};
use meteo_core::{FetchError, FetchRequest, Series, Variable, WeatherSource};
use std::f64::consts::PI;

/// Deterministic diurnal weather
///
/// Values depend only on the location, variable and hour, so repeated
/// fetches of the same window agree.
pub struct SimulatedSource {
    gap_every: Option<usize>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self { gap_every: None }
    }

    /// Emit a missing marker for every `n`th hour
    pub fn with_gaps(n: usize) -> Self {
        Self {
            gap_every: (n > 0).then_some(n),
        }
    }

    fn sample(variable: Variable, latitude: f64, hour: u32, day: u32) -> f64 {
        // Peaks mid-afternoon, bottoms out before dawn
        let diurnal = (2.0 * PI * (f64::from(hour) - 9.0) / 24.0).sin();
        let drift = (f64::from(day % 7) - 3.0) * 0.5;

        match variable {
            Variable::Temperature2m => 25.0 - 0.4 * latitude.abs() + 5.0 * diurnal + drift,
            Variable::RelativeHumidity2m => (70.0 - 15.0 * diurnal + drift).clamp(0.0, 100.0),
            Variable::Precipitation => (drift * 0.4).max(0.0),
            Variable::CloudCover => (50.0 - 30.0 * diurnal + 4.0 * drift).clamp(0.0, 100.0),
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WeatherSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Series, FetchError> {
        let variable = request
            .variable
            .variable()
            .ok_or_else(|| FetchError::UnsupportedVariable(request.variable.to_string()))?;

        let mut series = Series::new();
        let mut instant = request.window.start;
        let mut index = 0usize;
        while instant <= request.window.end {
            let missing = self.gap_every.is_some_and(|n| index % n == n - 1);
            series.push(if missing {
                None
            } else {
                Some(Self::sample(
                    variable,
                    request.latitude,
                    instant.hour(),
                    instant.ordinal(),
                ))
            });
            instant += Duration::hours(1);
            index += 1;
        }

        tracing::debug!(samples = series.len(), "simulated series generated");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meteo_core::{reduce, DataSource, TimeWindow};

    fn request(variable: &str, hours: i64) -> FetchRequest {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        FetchRequest {
            latitude: 45.0,
            longitude: 7.0,
            window: TimeWindow {
                start,
                end: start + Duration::hours(hours),
            },
            variable: DataSource::new(variable),
        }
    }

    #[tokio::test]
    async fn test_hourly_samples_cover_window() {
        let source = SimulatedSource::new();
        let series = source.fetch(&request("temperature_2m", 23)).await.unwrap();
        assert_eq!(series.len(), 24);
        assert!(series.iter().all(Option::is_some));

        let point = source.fetch(&request("temperature_2m", 0)).await.unwrap();
        assert_eq!(point.len(), 1);
    }

    #[tokio::test]
    async fn test_repeatable() {
        let source = SimulatedSource::new();
        let a = source.fetch(&request("cloud_cover", 47)).await.unwrap();
        let b = source.fetch(&request("cloud_cover", 47)).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_gaps() {
        let source = SimulatedSource::with_gaps(4);
        let series = source.fetch(&request("relative_humidity_2m", 7)).await.unwrap();
        assert_eq!(series.len(), 8);
        assert_eq!(series.iter().filter(|s| s.is_none()).count(), 2);
        assert!(reduce(&series).is_valid());
    }

    #[tokio::test]
    async fn test_unknown_variable() {
        let source = SimulatedSource::new();
        assert_eq!(
            source.fetch(&request("snow_depth", 3)).await,
            Err(FetchError::UnsupportedVariable("snow_depth".into()))
        );
    }
}
