//! FILENAME: aggregation-engine/src/lib.rs
//! Matrix aggregation subsystem.
//!
//! This crate turns the raw sparse matrix of a model instance into
//! per-view results: rows and columns united by symbol dimensions,
//! reduced with a statistic, and filtered by value, identifier and label.
//! It depends on `engine` only for shared types (CellValue, SparseMatrix,
//! ModelSource).
//!
//! Layers:
//! - `definition`: Serializable configuration (what a view IS)
//! - `grouping`: Which sections are united into which target
//! - `aggregator`: The statistics and the row/column passes
//! - `filter`: Value, identifier and label filters
//! - `cache`: Per-view results and logical <-> physical mapping
//! - `engine`: The pipeline and the engine owning raw data and caches

pub mod definition;
pub mod error;
pub mod grouping;
pub mod aggregator;
pub mod filter;
pub mod cache;
pub mod engine;

pub use definition::*;
pub use error::ConfigError;
pub use grouping::*;
pub use aggregator::{Aggregator, TargetRecord};
pub use filter::*;
pub use cache::*;
pub use self::engine::{aggregate_view, AggregationEngine, ViewCalculator};
