//! Retained set of drawn polygon layers

use anyhow::Result;
use meteo_core::{PolygonId, RenderFeature, RenderSink};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const ACTIVE_OUTLINE: &str = "#ffd400";
pub const OUTLINE: &str = "#000000";

/// What the last sync changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Layers keyed by polygon id
///
/// Every sync receives the full feature set; layers whose polygon is
/// gone are dropped so nothing stale stays drawn.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: BTreeMap<PolygonId, RenderFeature>,
    last_sync: SyncStats,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PolygonId) -> Option<&RenderFeature> {
        self.layers.get(id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn last_sync(&self) -> SyncStats {
        self.last_sync
    }

    /// Current layers as a GeoJSON feature collection
    pub fn feature_collection(&self) -> Value {
        let features: Vec<Value> = self
            .layers
            .values()
            .map(|feature| {
                let ring: Vec<[f64; 2]> = feature
                    .ring
                    .closed()
                    .iter()
                    .map(|c| [c.lon, c.lat])
                    .collect();
                let outline = if feature.active { ACTIVE_OUTLINE } else { OUTLINE };
                json!({
                    "type": "Feature",
                    "id": feature.id,
                    "geometry": { "type": "Polygon", "coordinates": [ring] },
                    "properties": {
                        "fill": feature.color,
                        "outline": outline,
                        "label": feature.label,
                        "active": feature.active,
                    },
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

#[async_trait::async_trait]
impl RenderSink for LayerRegistry {
    async fn render(&mut self, features: &[RenderFeature]) -> Result<()> {
        let mut stats = SyncStats::default();
        let mut next = BTreeMap::new();
        for feature in features {
            match self.layers.remove(&feature.id) {
                None => stats.added += 1,
                Some(previous) if previous != *feature => stats.updated += 1,
                Some(_) => {}
            }
            next.insert(feature.id.clone(), feature.clone());
        }
        stats.removed = self.layers.len();
        for id in self.layers.keys() {
            debug!(polygon = %id, "removing orphaned layer");
        }
        self.layers = next;
        self.last_sync = stats;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::{Color, Coordinate, DataSource, PolygonRecord};

    fn record(id: &str) -> PolygonRecord {
        PolygonRecord::create(
            PolygonId::new(id),
            vec![
                Coordinate::new(10.0, 50.0),
                Coordinate::new(11.0, 50.0),
                Coordinate::new(11.0, 51.0),
            ],
            DataSource::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn drops_layers_of_removed_polygons() {
        let mut registry = LayerRegistry::new();
        let a = record("aaaaaaaa");
        let b = record("bbbbbbbb");

        registry
            .render(&[
                RenderFeature::from_record(&a, None),
                RenderFeature::from_record(&b, None),
            ])
            .await
            .unwrap();
        assert_eq!(
            registry.last_sync(),
            SyncStats {
                added: 2,
                updated: 0,
                removed: 0
            }
        );

        let mut recolored = a.clone();
        recolored.color = Color::new("#ff0000");
        registry
            .render(&[RenderFeature::from_record(&recolored, Some(&a.id))])
            .await
            .unwrap();

        assert_eq!(
            registry.last_sync(),
            SyncStats {
                added: 0,
                updated: 1,
                removed: 1
            }
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&b.id).is_none());
        assert_eq!(registry.get(&a.id).unwrap().color, Color::new("#ff0000"));
    }

    #[tokio::test]
    async fn geojson_layout() {
        let mut registry = LayerRegistry::new();
        let a = record("abcdef123");
        registry
            .render(&[RenderFeature::from_record(&a, Some(&a.id))])
            .await
            .unwrap();

        assert_eq!(
            registry.feature_collection(),
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "id": "abcdef123",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[10.0, 50.0], [11.0, 50.0], [11.0, 51.0], [10.0, 50.0]]],
                    },
                    "properties": {
                        "fill": "#808080",
                        "outline": ACTIVE_OUTLINE,
                        "label": "abcdef",
                        "active": true,
                    },
                }],
            })
        );
    }
}
