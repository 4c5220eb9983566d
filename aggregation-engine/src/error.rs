//! FILENAME: aggregation-engine/src/error.rs

use engine::{Orientation, SectionIndex};
use thiserror::Error;

/// Inconsistencies reported by `ViewConfig::validate`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown {orientation:?} symbol anchor: {anchor}")]
    UnknownSymbol {
        orientation: Orientation,
        anchor: SectionIndex,
    },

    #[error("Section {section} is outside the {orientation:?} symbol anchored at {anchor}")]
    SectionOutsideSymbol {
        orientation: Orientation,
        anchor: SectionIndex,
        section: SectionIndex,
    },

    #[error("Empty aggregation group in {orientation:?} symbol anchored at {anchor}")]
    EmptyGroup {
        orientation: Orientation,
        anchor: SectionIndex,
    },

    #[error("Dimension {dimension} out of range for symbol {symbol} (dimension {symbol_dimension})")]
    DimensionOutOfRange {
        symbol: String,
        dimension: usize,
        symbol_dimension: usize,
    },

    #[error("Value filter minimum {min} exceeds maximum {max}")]
    InvalidRange { min: f64, max: f64 },
}
