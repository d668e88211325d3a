use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::{get, patch, post, put},
    Router,
};
use meteo_core::{RenderSink, TimeSelection};
use meteo_refresh::{RefreshCoordinator, RefreshOutcome};
use meteo_sinks::{LayerRegistry, SnapshotSink};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    refreshes_total: Counter<u64>,
    coordinator: Arc<RefreshCoordinator>,
    timeline: RwLock<TimeSelection>,
    layers: Mutex<LayerRegistry>,
    snapshots: Mutex<Option<Box<dyn SnapshotSink>>>,
}

impl AppState {
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub async fn timeline(&self) -> TimeSelection {
        *self.timeline.read().await
    }

    pub(crate) async fn set_timeline(&self, selection: TimeSelection) {
        *self.timeline.write().await = selection;
    }

    pub(crate) fn count_request(&self) {
        self.requests_total.add(1, &[]);
    }

    pub(crate) fn record_outcome(&self, outcome: &RefreshOutcome) {
        self.refreshes_total
            .add(1, &[KeyValue::new("outcome", outcome.kind())]);
    }

    /// Count and persist background refreshes once they land
    pub(crate) fn settle(self: &Arc<Self>, handles: Vec<JoinHandle<RefreshOutcome>>) {
        if handles.is_empty() {
            return;
        }
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut applied = 0usize;
            for handle in handles {
                // Aborted by a newer trigger for the same polygon
                let outcome = handle.await.unwrap_or(RefreshOutcome::Discarded);
                state.record_outcome(&outcome);
                if outcome.record().is_some() {
                    applied += 1;
                }
            }
            if applied > 0 {
                state.persist().await;
            }
        });
    }

    /// Sync the layer registry and return it as GeoJSON
    pub async fn render(&self) -> Result<Value> {
        let features = self.coordinator.render_features().await;
        let mut layers = self.layers.lock().await;
        layers.render(&features).await?;
        Ok(layers.feature_collection())
    }

    /// Save store and timeline, if a snapshot sink is attached
    pub async fn persist(&self) {
        let mut sink = self.snapshots.lock().await;
        let Some(sink) = sink.as_mut() else {
            return;
        };
        let mut state = self.coordinator.snapshot().await;
        state.timeline = Some(self.timeline().await);
        if let Err(e) = sink.save(&state).await {
            tracing::warn!(error = ?e, "failed to persist snapshot");
        }
    }
}

pub fn build_app(
    coordinator: Arc<RefreshCoordinator>,
    timeline: TimeSelection,
    snapshots: Option<Box<dyn SnapshotSink>>,
) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("building prometheus exporter")?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("meteo-cli");

    let requests_total = meter
        .u64_counter("meteo_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let refreshes_total = meter
        .u64_counter("meteo_refreshes_total")
        .with_description("Polygon refreshes by outcome")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        refreshes_total,
        coordinator,
        timeline: RwLock::new(timeline),
        layers: Mutex::new(LayerRegistry::new()),
        snapshots: Mutex::new(snapshots),
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route(
            "/api/v1/polygons",
            get(api::list_polygons).post(api::create_polygon),
        )
        .route(
            "/api/v1/polygons/:id",
            get(api::get_polygon).delete(api::delete_polygon),
        )
        .route(
            "/api/v1/polygons/:id/rules",
            put(api::replace_rules).post(api::add_rule),
        )
        .route(
            "/api/v1/polygons/:id/rules/:rule_id",
            patch(api::update_rule).delete(api::remove_rule),
        )
        .route("/api/v1/polygons/:id/data-source", put(api::set_data_source))
        .route("/api/v1/active", get(api::get_active).put(api::set_active))
        .route(
            "/api/v1/timeline",
            get(api::get_timeline).put(api::set_timeline),
        )
        .route("/api/v1/timeline/step", post(api::step_timeline))
        .route("/api/v1/refresh", post(api::refresh))
        .route("/api/v1/render", get(api::render))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.count_request();
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}
