use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,meteo=debug";

/// Initialize JSON logging for a service
///
/// `RUST_LOG` wins over [`DEFAULT_FILTER`]. Safe to call more than once;
/// later calls leave the first subscriber in place.
pub fn init(service_name: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Logging initialized");
    }
}
