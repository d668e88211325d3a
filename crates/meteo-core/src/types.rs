//! Core data types for drawn polygons and their weather state

use crate::classify::classify;
use crate::rules::ColorRule;
use crate::variables::{get_variable, Variable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Neutral color for polygons without data or without a matching rule
pub const DEFAULT_COLOR: &str = "#808080";

/// Data source assigned to new polygons when none is chosen
pub const DEFAULT_DATA_SOURCE: &str = "temperature_2m";

/// Bounds on the number of distinct vertices in a polygon ring
pub const MIN_VERTICES: usize = 3;
pub const MAX_VERTICES: usize = 12;

/// A single hourly sample; `None` marks a missing observation
pub type Sample = Option<f64>;

/// Time-ordered hourly samples as returned by a weather source
pub type Series = Vec<Sample>;

/// Opaque polygon identifier, immutable once assigned
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolygonId(String);

impl PolygonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used for map labels (first 6 characters)
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(6) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for PolygonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PolygonId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PolygonId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Display color (any CSS color string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(color: impl Into<String>) -> Self {
        Self(color.into())
    }

    pub fn neutral() -> Self {
        Self(DEFAULT_COLOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_neutral(&self) -> bool {
        self.0 == DEFAULT_COLOR
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::neutral()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Geometry validation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Polygons must have between 3 and 12 points, got {0}")]
    VertexCount(usize),

    #[error("Non-finite coordinate at vertex {0}")]
    NonFinite(usize),
}

/// Closed polygon ring of 3 to 12 distinct vertices
///
/// The closing vertex (a repeat of the first) is not stored; it is
/// stripped on construction and added back by [`Ring::closed`]. A
/// position visited twice elsewhere in the ring is kept in place but
/// counts once towards the vertex bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Ring {
    vertices: Vec<Coordinate>,
}

impl Ring {
    pub fn new(mut vertices: Vec<Coordinate>) -> Result<Self, GeometryError> {
        if let Some(idx) = vertices
            .iter()
            .position(|c| !c.lon.is_finite() || !c.lat.is_finite())
        {
            return Err(GeometryError::NonFinite(idx));
        }

        // Repeated clicks on the same point do not add a vertex
        vertices.dedup();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        let distinct = distinct_count(&vertices);
        if !(MIN_VERTICES..=MAX_VERTICES).contains(&distinct) {
            return Err(GeometryError::VertexCount(distinct));
        }

        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    /// Vertices with the first one repeated at the end (GeoJSON layout)
    pub fn closed(&self) -> Vec<Coordinate> {
        let mut ring = self.vertices.clone();
        ring.push(self.vertices[0]);
        ring
    }

    /// Arithmetic mean of the distinct vertices
    pub fn centroid(&self) -> Coordinate {
        let n = self.vertices.len() as f64;
        let (lon, lat) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(lon, lat), c| (lon + c.lon, lat + c.lat));
        Coordinate::new(lon / n, lat / n)
    }
}

/// Number of distinct positions, wherever the repeats sit in the ring
fn distinct_count(vertices: &[Coordinate]) -> usize {
    // Adding 0.0 folds -0.0 onto 0.0 so equal positions share bits
    vertices
        .iter()
        .map(|c| ((c.lon + 0.0).to_bits(), (c.lat + 0.0).to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

impl TryFrom<Vec<Coordinate>> for Ring {
    type Error = GeometryError;

    fn try_from(value: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Ring::new(value)
    }
}

impl From<Ring> for Vec<Coordinate> {
    fn from(ring: Ring) -> Self {
        ring.vertices
    }
}

/// Identifier of the weather variable queried for a polygon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSource(String);

impl DataSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Known variable, if the identifier is in the catalogue
    pub fn variable(&self) -> Option<Variable> {
        get_variable(&self.0)
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_SOURCE)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataSource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Authoritative per-polygon state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonRecord {
    pub id: PolygonId,

    pub geometry: Ring,

    #[serde(default)]
    pub data_source: DataSource,

    /// Insertion order is for display only
    #[serde(default)]
    pub rules: Vec<ColorRule>,

    /// Last accepted (already filtered) samples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_series: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_average: Option<f64>,

    #[serde(default)]
    pub color: Color,
}

impl PolygonRecord {
    /// New record with no rules and no data
    pub fn new(id: PolygonId, geometry: Ring, data_source: DataSource) -> Self {
        Self {
            id,
            geometry,
            data_source,
            rules: Vec::new(),
            raw_series: None,
            current_average: None,
            color: Color::neutral(),
        }
    }

    /// Validate the drawn vertices and build a record
    pub fn create(
        id: PolygonId,
        vertices: Vec<Coordinate>,
        data_source: DataSource,
    ) -> Result<Self, GeometryError> {
        Ok(Self::new(id, Ring::new(vertices)?, data_source))
    }

    /// Color the current rules assign to the stored average
    pub fn classify(&self) -> Color {
        classify(self.current_average, &self.rules)
    }

    pub fn has_data(&self) -> bool {
        self.current_average.is_some()
    }
}
