use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use meteo_config::AppConfig;
use meteo_core::{DecisionMaker, ThresholdPolicy, TimeSelection};
use meteo_refresh::{LayeredDecision, RefreshCoordinator, SignificanceThresholds};
use meteo_sinks::{FsSnapshotSink, SnapshotSink};
use meteo_sources::{HttpDecisionMaker, SourceRegistry};
use meteo_store::PolygonStore;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> Result<()> {
    // Observability
    meteo_obs::init("meteo-mapper");

    // Config
    let cfg = AppConfig::load().context("loading configuration")?;

    // Weather source and decision layering
    let registry = SourceRegistry::with_builtin(cfg.source_base_url(), cfg.source_timeout()).await;
    let source = registry
        .create(&cfg.source_kind())
        .await
        .with_context(|| format!("creating weather source {:?}", cfg.source_kind()))?;

    let mut thresholds = SignificanceThresholds::new(ThresholdPolicy::new(cfg.threshold())?);
    for (name, value) in &cfg.thresholds {
        thresholds = thresholds.with_override(name.clone(), ThresholdPolicy::new(*value)?);
    }

    let decision = match cfg.decision_endpoint() {
        Some(endpoint) => {
            let maker: Arc<dyn DecisionMaker> =
                Arc::new(HttpDecisionMaker::new(endpoint, cfg.decision_timeout())?);
            tracing::info!(%endpoint, "remote decision maker enabled");
            LayeredDecision::with_maker(maker, cfg.decision_timeout())
        }
        None => LayeredDecision::deterministic(),
    };

    // Restore persisted state
    let mut snapshots: Option<Box<dyn SnapshotSink>> = match cfg.storage_dir() {
        Some(dir) => Some(Box::new(
            FsSnapshotSink::new(dir).with_context(|| format!("opening storage dir {dir}"))?,
        )),
        None => None,
    };
    let (store, timeline) = match snapshots.as_mut() {
        Some(sink) => match sink.load().await {
            Ok(Some(state)) => {
                let timeline = state.timeline.unwrap_or_default();
                (PolygonStore::restore(state), timeline)
            }
            Ok(None) => (PolygonStore::new(), TimeSelection::default()),
            Err(e) => {
                tracing::warn!(error = ?e, "ignoring unreadable snapshot");
                (PolygonStore::new(), TimeSelection::default())
            }
        },
        None => (PolygonStore::new(), TimeSelection::default()),
    };
    tracing::info!(polygons = store.len(), source = source.name(), "state ready");

    let coordinator = Arc::new(
        RefreshCoordinator::new(Arc::new(RwLock::new(store)), source)
            .with_decision(decision)
            .with_thresholds(thresholds),
    );

    // Build app and state
    let (app, state) = meteo_cli::build_app(Arc::clone(&coordinator), timeline, snapshots)?;

    // Restored polygons get fresh data for the restored timeline
    coordinator.trigger_all(&timeline).await;

    // Start HTTP server
    let addr: SocketAddr = cfg
        .http_bind()
        .parse()
        .with_context(|| format!("invalid HTTP bind address {}", cfg.http_bind()))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Mark ready just before serving
    meteo_cli::set_ready(&state, true);

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    state.persist().await;
    tracing::info!("shutdown complete");
    Ok(())
}
