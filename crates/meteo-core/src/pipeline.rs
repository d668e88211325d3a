//! Capabilities the pipeline consumes from the outside world

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::timeline::TimeWindow;
use crate::types::{Color, DataSource, PolygonId, PolygonRecord, Ring, Series};

/// Query for one location, variable and window
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub window: TimeWindow,
    pub variable: DataSource,
}

impl FetchRequest {
    /// Query at the polygon's centroid for its data source
    pub fn for_record(record: &PolygonRecord, window: TimeWindow) -> Self {
        let center = record.geometry.centroid();
        Self {
            latitude: center.lat,
            longitude: center.lon,
            window,
            variable: record.data_source.clone(),
        }
    }
}

/// Retrievable-but-unusable fetch outcome
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Source returned status {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unsupported variable: {0}")]
    UnsupportedVariable(String),
}

/// Historical hourly weather data provider
#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    fn name(&self) -> &str;

    /// Hourly samples covering the request window, oldest first
    async fn fetch(&self, request: &FetchRequest) -> Result<Series, FetchError>;
}

/// Input to a pluggable significance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub polygon_id: PolygonId,
    pub current_data: Vec<f64>,
    pub new_data: Vec<f64>,
    pub threshold: f64,
}

/// Answer of a pluggable significance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub updated_data: Vec<f64>,
    pub significant_changes: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionError {
    #[error("Decision maker unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid decision response: {0}")]
    InvalidResponse(String),

    #[error("Decision maker timed out")]
    Timeout,
}

/// Optional decision maker layered in front of the threshold rule
#[async_trait::async_trait]
pub trait DecisionMaker: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, request: &DecisionRequest) -> Result<DecisionOutcome, DecisionError>;
}

/// What the map draws for one polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFeature {
    pub id: PolygonId,
    pub ring: Ring,
    pub color: Color,
    pub label: String,
    pub active: bool,
}

impl RenderFeature {
    pub fn from_record(record: &PolygonRecord, active: Option<&PolygonId>) -> Self {
        Self {
            id: record.id.clone(),
            ring: record.geometry.clone(),
            color: record.color.clone(),
            label: record.id.short().to_string(),
            active: active == Some(&record.id),
        }
    }
}

/// Consumer of the current set of polygons to draw
///
/// Each call carries the complete set; anything previously drawn for an
/// id that is no longer present must be removed.
#[async_trait::async_trait]
pub trait RenderSink: Send + Sync {
    async fn render(&mut self, features: &[RenderFeature]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;

    fn record() -> PolygonRecord {
        PolygonRecord::create(
            PolygonId::new("0123456789"),
            vec![
                Coordinate::new(10.0, 40.0),
                Coordinate::new(12.0, 40.0),
                Coordinate::new(12.0, 42.0),
                Coordinate::new(10.0, 42.0),
            ],
            DataSource::new("cloud_cover"),
        )
        .unwrap()
    }

    #[test]
    fn test_fetch_request_uses_centroid() {
        let now = chrono::Utc::now();
        let window = TimeWindow { start: now, end: now };
        let request = FetchRequest::for_record(&record(), window);
        assert_eq!(request.latitude, 41.0);
        assert_eq!(request.longitude, 11.0);
        assert_eq!(request.variable.as_str(), "cloud_cover");
    }

    #[test]
    fn test_decision_wire_format() {
        let request = DecisionRequest {
            polygon_id: PolygonId::new("p1"),
            current_data: vec![1.0],
            new_data: vec![2.0],
            threshold: 1.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "polygonId": "p1",
                "currentData": [1.0],
                "newData": [2.0],
                "threshold": 1.0
            })
        );

        let outcome: DecisionOutcome =
            serde_json::from_str(r#"{"updatedData":[3.5],"significantChanges":true}"#).unwrap();
        assert!(outcome.significant_changes);
    }

    #[test]
    fn test_render_feature() {
        let record = record();
        let active = PolygonId::new("0123456789");
        let feature = RenderFeature::from_record(&record, Some(&active));
        assert_eq!(feature.label, "012345");
        assert!(feature.active);
        assert!(!RenderFeature::from_record(&record, None).active);
    }
}
