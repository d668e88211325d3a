//! Polygon record store
//!
//! Single-writer, in-memory store of polygon records. Records are held
//! behind `Arc` and replaced copy-on-write, so every read hands out an
//! immutable snapshot that later mutations never touch.

pub mod snapshot;
pub mod store;

pub use snapshot::*;
pub use store::*;

use meteo_core::PolygonId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Polygon already exists: {0}")]
    DuplicatePolygon(PolygonId),

    #[error("Polygon not found: {0}")]
    UnknownPolygon(PolygonId),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
