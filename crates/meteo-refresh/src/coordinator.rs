//! Polygon lifecycle and refresh orchestration

use crate::{
    InFlight, LayeredDecision, PriorState, RefreshError, RefreshResult, SignificanceThresholds,
    Ticket,
};
use chrono::{DateTime, Utc};
use meteo_core::{
    classify, decide_after_fetch_failure, reduce, resolve, validate_rules, with_rule_added,
    with_rule_removed, with_rule_updated, Clock, ColorRule, Coordinate, DataSource,
    FetchRequest, PolygonId, PolygonRecord, RefreshDecision, RenderFeature, Resolution,
    RuleError, RuleUpdate, SystemClock, TimeSelection, WeatherSource,
};
use meteo_store::{DataUpdate, PersistedState, PolygonStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, instrument, warn};

/// Polygon store shared between the coordinator and its readers
pub type SharedStore = Arc<RwLock<PolygonStore>>;

/// Result of one refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Replaced(Arc<PolygonRecord>),
    /// Stored data kept; the color may still have been recomputed
    Unchanged(Arc<PolygonRecord>),
    Cleared(Arc<PolygonRecord>),
    /// Superseded by a newer refresh, or the polygon was deleted
    Discarded,
}

impl RefreshOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshOutcome::Replaced(_) => "replaced",
            RefreshOutcome::Unchanged(_) => "unchanged",
            RefreshOutcome::Cleared(_) => "cleared",
            RefreshOutcome::Discarded => "discarded",
        }
    }

    pub fn record(&self) -> Option<&Arc<PolygonRecord>> {
        match self {
            RefreshOutcome::Replaced(r) | RefreshOutcome::Unchanged(r) | RefreshOutcome::Cleared(r) => {
                Some(r)
            }
            RefreshOutcome::Discarded => None,
        }
    }
}

/// Owns every write to the polygon store
///
/// User edits (geometry, rules, data source, selection) and refresh
/// results all go through here. A refresh snapshots the record, runs
/// fetch and decide without holding the store, then writes its outcome
/// under a single store write lock, and only if it is still the newest
/// refresh for a polygon that still exists.
pub struct RefreshCoordinator {
    store: SharedStore,
    source: Arc<dyn WeatherSource>,
    decision: LayeredDecision,
    thresholds: SignificanceThresholds,
    clock: Arc<dyn Clock>,
    inflight: Mutex<InFlight>,
    tasks: Mutex<HashMap<PolygonId, (u64, AbortHandle)>>,
}

impl RefreshCoordinator {
    pub fn new(store: SharedStore, source: Arc<dyn WeatherSource>) -> Self {
        Self {
            store,
            source,
            decision: LayeredDecision::deterministic(),
            thresholds: SignificanceThresholds::default(),
            clock: Arc::new(SystemClock),
            inflight: Mutex::new(InFlight::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_decision(mut self, decision: LayeredDecision) -> Self {
        self.decision = decision;
        self
    }

    pub fn with_thresholds(mut self, thresholds: SignificanceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate and insert a new polygon; does not fetch
    #[instrument(skip(self, vertices))]
    pub async fn create_polygon(
        &self,
        id: Option<PolygonId>,
        vertices: Vec<Coordinate>,
        data_source: DataSource,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        let id = id.unwrap_or_else(PolygonId::generate);
        let record = PolygonRecord::create(id, vertices, data_source)?;
        let record = self.store.write().await.create(record)?;
        info!(
            polygon = %record.id,
            vertices = record.geometry.vertices().len(),
            data_source = %record.data_source,
            "Polygon created"
        );
        Ok(record)
    }

    /// Remove a polygon and cancel any refresh in flight for it
    #[instrument(skip(self))]
    pub async fn delete_polygon(&self, id: &PolygonId) -> Option<Arc<PolygonRecord>> {
        let removed = {
            let mut store = self.store.write().await;
            let removed = store.delete(id);
            self.inflight.lock().await.cancel(id);
            removed
        };
        if let Some((_, task)) = self.tasks.lock().await.remove(id) {
            task.abort();
        }
        if removed.is_some() {
            info!(polygon = %id, "Polygon deleted");
        }
        removed
    }

    pub async fn set_rules(
        &self,
        id: &PolygonId,
        rules: Vec<ColorRule>,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        self.edit_rules(id, move |_| {
            validate_rules(&rules)?;
            Ok(rules)
        })
        .await
    }

    pub async fn add_rule(
        &self,
        id: &PolygonId,
        rule: ColorRule,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        self.edit_rules(id, |rules| with_rule_added(rules, rule)).await
    }

    pub async fn update_rule(
        &self,
        id: &PolygonId,
        rule_id: &str,
        update: RuleUpdate,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        self.edit_rules(id, |rules| with_rule_updated(rules, rule_id, update))
            .await
    }

    pub async fn remove_rule(
        &self,
        id: &PolygonId,
        rule_id: &str,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        self.edit_rules(id, |rules| with_rule_removed(rules, rule_id)).await
    }

    /// Switch the variable a polygon tracks
    ///
    /// Recomputes the color from the stored average; fresh data for the
    /// new variable arrives with the next refresh.
    #[instrument(skip(self))]
    pub async fn set_data_source(
        &self,
        id: &PolygonId,
        data_source: DataSource,
    ) -> RefreshResult<Arc<PolygonRecord>> {
        let mut store = self.store.write().await;
        let record = store
            .update_data_source(id, data_source)
            .ok_or_else(|| RefreshError::UnknownPolygon(id.clone()))?;
        let color = record.classify();
        let record = store
            .update_color(id, color)
            .ok_or_else(|| RefreshError::UnknownPolygon(id.clone()))?;
        info!(polygon = %id, data_source = %record.data_source, "Data source changed");
        Ok(record)
    }

    pub async fn set_active(&self, id: Option<PolygonId>) -> RefreshResult<()> {
        self.store
            .write()
            .await
            .set_active(id)
            .map_err(|e| match e {
                StoreError::UnknownPolygon(id) => RefreshError::UnknownPolygon(id),
                other => RefreshError::Store(other),
            })
    }

    pub async fn get(&self, id: &PolygonId) -> Option<Arc<PolygonRecord>> {
        self.store.read().await.get(id)
    }

    pub async fn list(&self) -> Vec<Arc<PolygonRecord>> {
        self.store.read().await.list()
    }

    /// Everything a renderer needs, in creation order
    pub async fn render_features(&self) -> Vec<RenderFeature> {
        let store = self.store.read().await;
        let active = store.active();
        store
            .list()
            .iter()
            .map(|record| RenderFeature::from_record(record, active))
            .collect()
    }

    /// Store contents ready for persistence (timeline left unset)
    pub async fn snapshot(&self) -> PersistedState {
        self.store.read().await.snapshot()
    }

    /// Number of polygons with a refresh in flight
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Refresh one polygon for `selection` and wait for the outcome
    pub async fn refresh(&self, id: &PolygonId, selection: &TimeSelection) -> RefreshOutcome {
        let ticket = self.inflight.lock().await.begin(id);
        self.run(ticket, selection).await
    }

    /// Start a background refresh, aborting the previous one for `id`
    pub async fn trigger(
        self: &Arc<Self>,
        id: &PolygonId,
        selection: TimeSelection,
    ) -> JoinHandle<RefreshOutcome> {
        // Held from ticket to insertion so generations reach the task map
        // in order, and across spawn so the task's cleanup runs after it
        let mut tasks = self.tasks.lock().await;
        let ticket = self.inflight.lock().await.begin(id);
        let generation = ticket.generation;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let id = ticket.id.clone();
            let outcome = this.run(ticket, &selection).await;
            let mut tasks = this.tasks.lock().await;
            if tasks.get(&id).is_some_and(|(g, _)| *g == generation) {
                tasks.remove(&id);
            }
            outcome
        });
        if let Some((_, previous)) = tasks.insert(id.clone(), (generation, handle.abort_handle()))
        {
            debug!(polygon = %id, "aborting superseded refresh");
            previous.abort();
        }
        handle
    }

    /// Start a background refresh for every polygon
    pub async fn trigger_all(
        self: &Arc<Self>,
        selection: &TimeSelection,
    ) -> Vec<(PolygonId, JoinHandle<RefreshOutcome>)> {
        let ids = self.store.read().await.ids();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let handle = self.trigger(&id, *selection).await;
            handles.push((id, handle));
        }
        handles
    }

    /// Refresh every polygon concurrently and collect the outcomes
    #[instrument(skip(self, selection))]
    pub async fn refresh_all(
        self: &Arc<Self>,
        selection: &TimeSelection,
    ) -> Vec<(PolygonId, RefreshOutcome)> {
        let handles = self.trigger_all(selection).await;
        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = handle.await.unwrap_or(RefreshOutcome::Discarded);
            outcomes.push((id, outcome));
        }
        info!(polygons = outcomes.len(), "Refresh cycle complete");
        outcomes
    }

    #[instrument(skip(self, selection), fields(polygon = %ticket.id, generation = ticket.generation))]
    async fn run(&self, ticket: Ticket, selection: &TimeSelection) -> RefreshOutcome {
        let record = self.store.read().await.get(&ticket.id);
        let Some(record) = record else {
            self.inflight.lock().await.finish(&ticket);
            debug!("polygon gone before refresh started");
            return RefreshOutcome::Discarded;
        };
        let decision = self.decide(&record, selection).await;
        self.apply(&ticket, decision).await
    }

    async fn decide(&self, record: &PolygonRecord, selection: &TimeSelection) -> RefreshDecision {
        let window = match resolve(selection, self.clock.now()) {
            Resolution::Window(window) => window,
            Resolution::Future => {
                debug!("selection lies in the future");
                return RefreshDecision::ClearToNoData;
            }
        };

        let request = FetchRequest::for_record(record, window);
        match self.source.fetch(&request).await {
            Ok(series) => {
                let reduction = reduce(&series);
                debug!(
                    samples = series.len(),
                    valid = reduction.filtered.len(),
                    average = ?reduction.average,
                    "series reduced"
                );
                let prior = PriorState {
                    polygon_id: &record.id,
                    series: record.raw_series.as_deref(),
                    average: record.current_average,
                };
                let policy = self.thresholds.for_source(&record.data_source);
                self.decision.decide(policy, prior, &reduction).await
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "fetch failed");
                decide_after_fetch_failure(record.current_average)
            }
        }
    }

    async fn apply(&self, ticket: &Ticket, decision: RefreshDecision) -> RefreshOutcome {
        let mut store = self.store.write().await;
        if !self.inflight.lock().await.finish(ticket) {
            debug!("superseded or deleted, discarding result");
            return RefreshOutcome::Discarded;
        }
        let Some(current) = store.get(&ticket.id) else {
            return RefreshOutcome::Discarded;
        };

        let kind = decision.kind();
        let outcome = match decision {
            RefreshDecision::Replace { series, average } => {
                let color = classify(Some(average), &current.rules);
                store
                    .update_data(&ticket.id, DataUpdate::replaced(series, average, color))
                    .map(RefreshOutcome::Replaced)
            }
            RefreshDecision::NoChange => {
                let color = current.classify();
                if color == current.color {
                    Some(RefreshOutcome::Unchanged(current))
                } else {
                    store
                        .update_color(&ticket.id, color)
                        .map(RefreshOutcome::Unchanged)
                }
            }
            RefreshDecision::ClearToNoData => store
                .update_data(&ticket.id, DataUpdate::cleared())
                .map(RefreshOutcome::Cleared),
        };

        match outcome {
            Some(outcome) => {
                if let Some(record) = outcome.record() {
                    info!(
                        decision = kind,
                        average = ?record.current_average,
                        color = %record.color,
                        "Refresh applied"
                    );
                }
                outcome
            }
            None => RefreshOutcome::Discarded,
        }
    }

    async fn edit_rules<F>(&self, id: &PolygonId, edit: F) -> RefreshResult<Arc<PolygonRecord>>
    where
        F: FnOnce(&[ColorRule]) -> Result<Vec<ColorRule>, RuleError>,
    {
        let mut store = self.store.write().await;
        let current = store
            .get(id)
            .ok_or_else(|| RefreshError::UnknownPolygon(id.clone()))?;
        let rules = edit(&current.rules)?;
        let color = classify(current.current_average, &rules);
        store.update_rules(id, rules);
        let record = store
            .update_color(id, color)
            .ok_or_else(|| RefreshError::UnknownPolygon(id.clone()))?;
        debug!(polygon = %id, rules = record.rules.len(), color = %record.color, "rules updated");
        Ok(record)
    }
}
