//! Core data types and the time-window, averaging and classification
//! pipeline for polygon weather maps
//!
//! Everything here is synchronous and side-effect free except for the
//! capability traits in [`pipeline`], which the outer crates implement.

pub mod classify;
pub mod pipeline;
pub mod refresh;
pub mod rules;
pub mod series;
pub mod timeline;
pub mod types;
pub mod variables;

pub use classify::*;
pub use pipeline::*;
pub use refresh::*;
pub use rules::*;
pub use series::*;
pub use timeline::*;
pub use types::*;
pub use variables::*;
