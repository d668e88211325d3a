//! Flat keyed layout for persisting and restoring store state

use crate::{PolygonStore, StoreResult};
use meteo_core::{PolygonId, PolygonRecord, TimeSelection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Layout version written into every snapshot
pub const STATE_VERSION: &str = "meteo-mapper-polygon-storage-v2";

fn default_version() -> String {
    STATE_VERSION.to_string()
}

/// Persisted store state, keyed by polygon id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub polygons: BTreeMap<PolygonId, PolygonRecord>,

    /// Creation order of `polygons`; the map itself is keyed by id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<PolygonId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_polygon_id: Option<PolygonId>,

    /// Last timeline selection, restored alongside the polygons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimeSelection>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: default_version(),
            polygons: BTreeMap::new(),
            order: Vec::new(),
            active_polygon_id: None,
            timeline: None,
        }
    }
}

impl PersistedState {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl PolygonStore {
    /// Capture the current state for persistence
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            version: default_version(),
            polygons: self
                .list()
                .into_iter()
                .map(|r| (r.id.clone(), (*r).clone()))
                .collect(),
            order: self.ids(),
            active_polygon_id: self.active().cloned(),
            timeline: None,
        }
    }

    /// Rebuild a store from persisted state
    ///
    /// Records come back in their saved creation order; entries missing
    /// from that order follow in id order. Entries whose key disagrees
    /// with the record id are skipped, and a dangling active selection is
    /// dropped.
    pub fn restore(mut state: PersistedState) -> Self {
        let mut store = PolygonStore::new();
        let ordered: Vec<(PolygonId, PolygonRecord)> = state
            .order
            .iter()
            .filter_map(|id| state.polygons.remove_entry(id))
            .collect();
        for (key, record) in ordered.into_iter().chain(state.polygons) {
            if key != record.id {
                warn!(key = %key, polygon = %record.id, "skipping mismatched snapshot entry");
                continue;
            }
            if let Err(e) = store.create(record) {
                warn!(error = %e, "skipping snapshot entry");
            }
        }
        if let Some(active) = state.active_polygon_id {
            if store.set_active(Some(active.clone())).is_err() {
                warn!(polygon = %active, "dropping dangling active selection");
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataUpdate;
    use meteo_core::{Color, Coordinate, DataSource, TimeUnit};

    fn record(id: &str) -> PolygonRecord {
        PolygonRecord::create(
            PolygonId::new(id),
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(2.0, 0.0),
                Coordinate::new(2.0, 2.0),
            ],
            DataSource::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_restore() {
        let mut store = PolygonStore::new();
        store.create(record("a")).unwrap();
        store.create(record("b")).unwrap();
        store.update_data(
            &PolygonId::new("a"),
            DataUpdate::replaced(vec![4.0], 4.0, Color::new("#123456")),
        );
        store.set_active(Some(PolygonId::new("b"))).unwrap();

        let json = store.snapshot().to_json().unwrap();
        let restored = PolygonStore::restore(PersistedState::from_json(&json).unwrap());

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.active(), Some(&PolygonId::new("b")));
        let a = restored.get(&PolygonId::new("a")).unwrap();
        assert_eq!(a.current_average, Some(4.0));
        assert_eq!(a.color.as_str(), "#123456");
    }

    #[test]
    fn test_restore_tolerates_missing_fields() {
        let json = r##"{
            "polygons": {
                "p1": {
                    "id": "p1",
                    "geometry": [{"lon":0,"lat":0},{"lon":1,"lat":0},{"lon":1,"lat":1}]
                }
            },
            "activePolygonId": "p9",
            "timeline": {"timeUnit":"day","mode":"point","stepRange":[3,3]}
        }"##;
        let state = PersistedState::from_json(json).unwrap();
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(
            state.timeline,
            Some(TimeSelection::point(TimeUnit::Day, 3).unwrap())
        );

        let store = PolygonStore::restore(state);
        let p1 = store.get(&PolygonId::new("p1")).unwrap();
        assert_eq!(p1.raw_series, None);
        assert_eq!(p1.current_average, None);
        assert!(p1.color.is_neutral());
        assert!(p1.rules.is_empty());
        assert_eq!(store.active(), None);
    }

    #[test]
    fn test_restore_keeps_creation_order() {
        let mut store = PolygonStore::new();
        for id in ["zeta", "alpha", "mid"] {
            store.create(record(id)).unwrap();
        }

        let json = store.snapshot().to_json().unwrap();
        let restored = PolygonStore::restore(PersistedState::from_json(&json).unwrap());
        assert_eq!(
            restored.ids(),
            vec![
                PolygonId::new("zeta"),
                PolygonId::new("alpha"),
                PolygonId::new("mid")
            ]
        );

        // Older snapshots carry no order and fall back to id order
        let mut legacy = store.snapshot();
        legacy.order.clear();
        assert_eq!(
            PolygonStore::restore(legacy).ids(),
            vec![
                PolygonId::new("alpha"),
                PolygonId::new("mid"),
                PolygonId::new("zeta")
            ]
        );
    }

    #[test]
    fn test_restore_skips_mismatched_keys() {
        let mut state = PersistedState::default();
        state.polygons.insert(PolygonId::new("other"), record("a"));
        state.polygons.insert(PolygonId::new("b"), record("b"));

        let store = PolygonStore::restore(state);
        assert_eq!(store.ids(), vec![PolygonId::new("b")]);
    }

    #[test]
    fn test_empty_snapshot_layout() {
        let json = PolygonStore::new().snapshot().to_json().unwrap();
        insta::assert_snapshot!(json, @r###"
        {
          "version": "meteo-mapper-polygon-storage-v2",
          "polygons": {}
        }
        "###);
    }
}
