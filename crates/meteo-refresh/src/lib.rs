//! Refresh coordinator
//!
//! Runs the time-window, fetch, reduce, decide and classify pipeline for
//! each polygon and applies the outcome to the polygon store, keeping at
//! most one live refresh per polygon.

pub mod coordinator;
pub mod inflight;
pub mod layered;

pub use coordinator::*;
pub use inflight::*;
pub use layered::*;

use meteo_core::{GeometryError, PolygonId, RuleError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Invalid polygon: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Store error: {0}")]
    Store(#[from] meteo_store::StoreError),

    #[error("Polygon not found: {0}")]
    UnknownPolygon(PolygonId),
}

pub type RefreshResult<T> = Result<T, RefreshError>;
