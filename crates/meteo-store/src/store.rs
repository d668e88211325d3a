//! In-memory polygon store with whole-field mutations

use crate::{StoreError, StoreResult};
use meteo_core::{Color, ColorRule, DataSource, PolygonId, PolygonRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Replacement for the refresh-owned fields of a record
#[derive(Debug, Clone, PartialEq)]
pub struct DataUpdate {
    pub raw_series: Option<Vec<f64>>,
    pub current_average: Option<f64>,
    pub color: Color,
}

impl DataUpdate {
    /// No data and the neutral color
    pub fn cleared() -> Self {
        Self {
            raw_series: None,
            current_average: None,
            color: Color::neutral(),
        }
    }

    pub fn replaced(series: Vec<f64>, average: f64, color: Color) -> Self {
        Self {
            raw_series: Some(series),
            current_average: Some(average),
            color,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    record: Arc<PolygonRecord>,
}

/// Authoritative polygon state plus the active selection
///
/// Mutating an id that is not in the store is a silent no-op returning
/// `None`; a refresh racing a deletion lands here.
#[derive(Debug, Clone, Default)]
pub struct PolygonStore {
    entries: HashMap<PolygonId, Entry>,
    active: Option<PolygonId>,
    next_seq: u64,
}

impl PolygonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record
    pub fn create(&mut self, record: PolygonRecord) -> StoreResult<Arc<PolygonRecord>> {
        if self.entries.contains_key(&record.id) {
            return Err(StoreError::DuplicatePolygon(record.id));
        }
        let record = Arc::new(record);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            record.id.clone(),
            Entry {
                seq,
                record: Arc::clone(&record),
            },
        );
        debug!(polygon = %record.id, "polygon created");
        Ok(record)
    }

    /// Remove a record, clearing the active selection if it pointed here
    pub fn delete(&mut self, id: &PolygonId) -> Option<Arc<PolygonRecord>> {
        let removed = self.entries.remove(id)?;
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        debug!(polygon = %id, "polygon deleted");
        Some(removed.record)
    }

    pub fn get(&self, id: &PolygonId) -> Option<Arc<PolygonRecord>> {
        self.entries.get(id).map(|e| Arc::clone(&e.record))
    }

    pub fn contains(&self, id: &PolygonId) -> bool {
        self.entries.contains_key(id)
    }

    /// All records in creation order
    pub fn list(&self) -> Vec<Arc<PolygonRecord>> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| Arc::clone(&e.record)).collect()
    }

    pub fn ids(&self) -> Vec<PolygonId> {
        self.list().iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn update_data(&mut self, id: &PolygonId, data: DataUpdate) -> Option<Arc<PolygonRecord>> {
        self.modify(id, |record| {
            record.raw_series = data.raw_series;
            record.current_average = data.current_average;
            record.color = data.color;
        })
    }

    pub fn update_rules(
        &mut self,
        id: &PolygonId,
        rules: Vec<ColorRule>,
    ) -> Option<Arc<PolygonRecord>> {
        self.modify(id, |record| record.rules = rules)
    }

    pub fn update_color(&mut self, id: &PolygonId, color: Color) -> Option<Arc<PolygonRecord>> {
        self.modify(id, |record| record.color = color)
    }

    pub fn update_data_source(
        &mut self,
        id: &PolygonId,
        data_source: DataSource,
    ) -> Option<Arc<PolygonRecord>> {
        self.modify(id, |record| record.data_source = data_source)
    }

    /// Select a polygon (or clear the selection with `None`)
    pub fn set_active(&mut self, id: Option<PolygonId>) -> StoreResult<()> {
        if let Some(id) = &id {
            if !self.entries.contains_key(id) {
                return Err(StoreError::UnknownPolygon(id.clone()));
            }
        }
        self.active = id;
        Ok(())
    }

    pub fn active(&self) -> Option<&PolygonId> {
        self.active.as_ref()
    }

    pub fn active_record(&self) -> Option<Arc<PolygonRecord>> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    fn modify<F>(&mut self, id: &PolygonId, f: F) -> Option<Arc<PolygonRecord>>
    where
        F: FnOnce(&mut PolygonRecord),
    {
        let Some(entry) = self.entries.get_mut(id) else {
            debug!(polygon = %id, "ignoring update for missing polygon");
            return None;
        };
        f(Arc::make_mut(&mut entry.record));
        Some(Arc::clone(&entry.record))
    }
}
