//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the model-instance matrix types.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod logging;
pub mod model;
pub mod sparse;
pub mod value;

// Re-export commonly used types at the crate root
pub use model::{
    load_raw_matrix, HeaderLayout, ModelInstance, ModelSource, Orientation, SectionIndex,
    SectionLabels, Symbol,
};
pub use sparse::{SparseMatrix, SparseRow};
pub use value::{CellValue, SpecialValue, ValueParseError};
