//! FILENAME: engine/src/model.rs
//! PURPOSE: Model-instance metadata and the loader interface.
//! CONTEXT: The optimization-model loader is an external collaborator. This
//! module defines what the aggregation engine needs from it (`ModelSource`),
//! an in-memory implementation (`ModelInstance`), and `load_raw_matrix`,
//! which lays the instance out in physical section coordinates:
//!
//! ```text
//!              cols 0..H          cols H..H+variables
//! rows 0..H    (unused)           variable attributes
//! rows H..     equation attrs     coefficients
//! ```
//!
//! where H is the number of predefined header attributes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::sparse::{SparseMatrix, SparseRow};
use crate::value::CellValue;

/// Physical section index (row or column in the raw model matrix).
pub type SectionIndex = usize;

/// Labels attached to one section, one per symbol dimension.
pub type SectionLabels = SmallVec<[String; 3]>;

// ============================================================================
// ORIENTATION
// ============================================================================

/// Matrix axis. Vertical = rows (equations), Horizontal = columns (variables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl Orientation {
    pub const BOTH: [Orientation; 2] = [Orientation::Vertical, Orientation::Horizontal];

    /// Array slot for per-orientation storage.
    pub fn slot(self) -> usize {
        match self {
            Orientation::Vertical => 0,
            Orientation::Horizontal => 1,
        }
    }
}

// ============================================================================
// HEADER LAYOUT
// ============================================================================

/// The predefined attribute headers occupying the first physical sections
/// of both axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLayout {
    pub attributes: Vec<String>,
}

impl Default for HeaderLayout {
    fn default() -> Self {
        HeaderLayout::new(["Level", "Lower", "Marginal", "Scale", "Upper"])
    }
}

impl HeaderLayout {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HeaderLayout {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of reserved header sections (H).
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn is_header(&self, section: SectionIndex) -> bool {
        section < self.attributes.len()
    }

    pub fn name(&self, section: SectionIndex) -> Option<&str> {
        self.attributes.get(section).map(String::as_str)
    }
}

// ============================================================================
// SYMBOLS
// ============================================================================

/// A named equation or variable block covering contiguous physical sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub orientation: Orientation,
    /// First physical section (the symbol's anchor).
    pub first_section: SectionIndex,
    /// Last physical section, inclusive.
    pub last_section: SectionIndex,
    pub dimension: usize,
}

impl Symbol {
    /// Number of sections (entries) the symbol spans.
    pub fn entries(&self) -> usize {
        self.last_section + 1 - self.first_section
    }

    pub fn contains(&self, section: SectionIndex) -> bool {
        section >= self.first_section && section <= self.last_section
    }

    pub fn sections(&self) -> std::ops::RangeInclusive<SectionIndex> {
        self.first_section..=self.last_section
    }
}

// ============================================================================
// MODEL SOURCE
// ============================================================================

/// What the aggregation engine consumes from a loaded model instance.
///
/// Equation and variable indices passed to the accessors are 0-based model
/// indices; everything else uses physical sections.
pub trait ModelSource {
    fn header_layout(&self) -> &HeaderLayout;

    fn equation_count(&self) -> usize;

    fn variable_count(&self) -> usize;

    /// Coefficients of one equation: variable index -> value.
    fn row_sparse(&self, equation: usize) -> SparseRow;

    fn row_attribute(&self, name: &str, equation: usize) -> Option<CellValue>;

    fn column_attribute(&self, name: &str, variable: usize) -> Option<CellValue>;

    /// Symbols of one orientation, ordered by `first_section`.
    fn symbols(&self, orientation: Orientation) -> &[Symbol];

    /// Labels of a physical section. Empty for header and scalar sections.
    fn section_labels(&self, orientation: Orientation, section: SectionIndex) -> &[String];

    /// Total physical extent of an axis, header sections included.
    fn section_count(&self, orientation: Orientation) -> usize {
        let entries = match orientation {
            Orientation::Vertical => self.equation_count(),
            Orientation::Horizontal => self.variable_count(),
        };
        self.header_layout().len() + entries
    }

    /// The symbol owning a physical section, if any.
    fn symbol_at(&self, orientation: Orientation, section: SectionIndex) -> Option<&Symbol> {
        let symbols = self.symbols(orientation);
        let idx = symbols.partition_point(|s| s.last_section < section);
        symbols.get(idx).filter(|s| s.contains(section))
    }

    /// The symbol whose first section is `anchor`.
    fn symbol_by_anchor(&self, orientation: Orientation, anchor: SectionIndex) -> Option<&Symbol> {
        self.symbol_at(orientation, anchor)
            .filter(|s| s.first_section == anchor)
    }
}

// ============================================================================
// IN-MEMORY MODEL INSTANCE
// ============================================================================

/// A fully materialized model instance. Built through the `add_*`/`set_*`
/// methods or deserialized from a loader snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInstance {
    #[serde(default)]
    pub header: HeaderLayout,
    equation_symbols: Vec<Symbol>,
    variable_symbols: Vec<Symbol>,
    equation_labels: Vec<SectionLabels>,
    variable_labels: Vec<SectionLabels>,
    /// Equation index -> (variable index -> coefficient).
    coefficients: FxHashMap<usize, SparseRow>,
    row_attributes: BTreeMap<String, FxHashMap<usize, CellValue>>,
    column_attributes: BTreeMap<String, FxHashMap<usize, CellValue>>,
}

impl ModelInstance {
    pub fn new(header: HeaderLayout) -> Self {
        ModelInstance {
            header,
            ..Default::default()
        }
    }

    /// Appends an equation symbol with one entry per label tuple and returns
    /// its anchor section. A scalar symbol is one entry with no labels.
    pub fn add_equation_symbol(&mut self, name: &str, entries: Vec<Vec<String>>) -> SectionIndex {
        let header = self.header.len();
        Self::push_symbol(
            &mut self.equation_symbols,
            &mut self.equation_labels,
            header,
            name,
            Orientation::Vertical,
            entries,
        )
    }

    /// Appends a variable symbol; see `add_equation_symbol`.
    pub fn add_variable_symbol(&mut self, name: &str, entries: Vec<Vec<String>>) -> SectionIndex {
        let header = self.header.len();
        Self::push_symbol(
            &mut self.variable_symbols,
            &mut self.variable_labels,
            header,
            name,
            Orientation::Horizontal,
            entries,
        )
    }

    fn push_symbol(
        symbols: &mut Vec<Symbol>,
        labels: &mut Vec<SectionLabels>,
        header: usize,
        name: &str,
        orientation: Orientation,
        entries: Vec<Vec<String>>,
    ) -> SectionIndex {
        let first_section = header + labels.len();
        let count = entries.len().max(1);
        let dimension = entries.first().map_or(0, Vec::len);

        if entries.is_empty() {
            labels.push(SectionLabels::new());
        } else {
            labels.extend(entries.into_iter().map(SectionLabels::from_vec));
        }

        symbols.push(Symbol {
            name: name.to_string(),
            orientation,
            first_section,
            last_section: first_section + count - 1,
            dimension,
        });
        first_section
    }

    /// Sets a coefficient by 0-based equation and variable index.
    pub fn set_coefficient(&mut self, equation: usize, variable: usize, value: CellValue) {
        self.coefficients.entry(equation).or_default().set(variable, value);
    }

    pub fn set_row_attribute(&mut self, name: &str, equation: usize, value: CellValue) {
        self.row_attributes
            .entry(name.to_string())
            .or_default()
            .insert(equation, value);
    }

    pub fn set_column_attribute(&mut self, name: &str, variable: usize, value: CellValue) {
        self.column_attributes
            .entry(name.to_string())
            .or_default()
            .insert(variable, value);
    }
}

impl ModelSource for ModelInstance {
    fn header_layout(&self) -> &HeaderLayout {
        &self.header
    }

    fn equation_count(&self) -> usize {
        self.equation_labels.len()
    }

    fn variable_count(&self) -> usize {
        self.variable_labels.len()
    }

    fn row_sparse(&self, equation: usize) -> SparseRow {
        self.coefficients.get(&equation).cloned().unwrap_or_default()
    }

    fn row_attribute(&self, name: &str, equation: usize) -> Option<CellValue> {
        self.row_attributes.get(name)?.get(&equation).copied()
    }

    fn column_attribute(&self, name: &str, variable: usize) -> Option<CellValue> {
        self.column_attributes.get(name)?.get(&variable).copied()
    }

    fn symbols(&self, orientation: Orientation) -> &[Symbol] {
        match orientation {
            Orientation::Vertical => &self.equation_symbols,
            Orientation::Horizontal => &self.variable_symbols,
        }
    }

    fn section_labels(&self, orientation: Orientation, section: SectionIndex) -> &[String] {
        let labels = match orientation {
            Orientation::Vertical => &self.equation_labels,
            Orientation::Horizontal => &self.variable_labels,
        };
        section
            .checked_sub(self.header.len())
            .and_then(|idx| labels.get(idx))
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// RAW MATRIX LOADING
// ============================================================================

/// Builds the raw attribute+coefficient matrix in physical coordinates.
pub fn load_raw_matrix(source: &dyn ModelSource) -> SparseMatrix {
    let header = source.header_layout();
    let offset = header.len();
    let mut matrix = SparseMatrix::new();

    for equation in 0..source.equation_count() {
        let coefficients = source.row_sparse(equation);
        let mut row = SparseRow::with_capacity(coefficients.len() + offset);
        for (variable, value) in coefficients.iter() {
            row.set(offset + variable, value);
        }
        for (attr_idx, name) in header.attributes.iter().enumerate() {
            if let Some(value) = source.row_attribute(name, equation) {
                row.set(attr_idx, value);
            }
        }
        if !row.is_empty() {
            matrix.insert_row(offset + equation, row);
        }
    }

    for (attr_idx, name) in header.attributes.iter().enumerate() {
        for variable in 0..source.variable_count() {
            if let Some(value) = source.column_attribute(name, variable) {
                matrix.set(attr_idx, offset + variable, value);
            }
        }
    }

    matrix
}
