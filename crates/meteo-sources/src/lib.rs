//! Weather source and decision maker adapters
//!
//! Implementations of the capabilities the refresh pipeline consumes:
//! the Open-Meteo historical archive, an offline simulator, and an HTTP
//! decision maker.

pub mod decision;
pub mod open_meteo;
pub mod registry;
pub mod simulator;

pub use decision::*;
pub use open_meteo::*;
pub use registry::*;
pub use simulator::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;
