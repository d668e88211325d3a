//! Per-polygon refresh generations

use meteo_core::PolygonId;
use std::collections::HashMap;

/// Claim on the right to write one refresh result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: PolygonId,
    pub generation: u64,
}

/// Tracks the newest refresh started for each polygon
///
/// Starting a refresh supersedes any earlier one for the same polygon;
/// only the holder of the current ticket may write its result.
/// Generations are global and never reused, so a polygon deleted and
/// re-created under the same id cannot accept a stale ticket.
#[derive(Debug, Default)]
pub struct InFlight {
    generations: HashMap<PolygonId, u64>,
    next_generation: u64,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh, superseding any in flight for `id`
    pub fn begin(&mut self, id: &PolygonId) -> Ticket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.generations.insert(id.clone(), generation);
        Ticket {
            id: id.clone(),
            generation,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generations.get(&ticket.id) == Some(&ticket.generation)
    }

    /// Release a ticket; returns whether it was still current
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        if self.is_current(ticket) {
            self.generations.remove(&ticket.id);
            true
        } else {
            false
        }
    }

    /// Invalidate whatever refresh is in flight for `id`
    pub fn cancel(&mut self, id: &PolygonId) -> bool {
        self.generations.remove(id).is_some()
    }

    pub fn is_in_flight(&self, id: &PolygonId) -> bool {
        self.generations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}
