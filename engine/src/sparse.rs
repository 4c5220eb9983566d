//! FILENAME: engine/src/sparse.rs
//! PURPOSE: Sparse row/column storage for model-instance matrices.
//! CONTEXT: A `SparseMatrix` maps a row index to a `SparseRow`, which maps a
//! column index to a `CellValue`. Both the raw attribute+coefficient matrix
//! and every aggregated derivative use this type. Nothing is densified: a
//! cell that was never written is absent, which is different from an
//! explicit `Number(0.0)` written on purpose.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::value::CellValue;

// ============================================================================
// SPARSE ROW
// ============================================================================

/// One row of a sparse matrix: column index -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseRow {
    entries: FxHashMap<usize, CellValue>,
}

impl SparseRow {
    pub fn new() -> Self {
        SparseRow {
            entries: FxHashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SparseRow {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    pub fn get(&self, col: usize) -> Option<CellValue> {
        self.entries.get(&col).copied()
    }

    /// Inserts or overwrites a value. Returns the previous value.
    pub fn set(&mut self, col: usize, value: CellValue) -> Option<CellValue> {
        self.entries.insert(col, value)
    }

    pub fn remove(&mut self, col: usize) -> Option<CellValue> {
        self.entries.remove(&col)
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates populated cells in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, CellValue)> + '_ {
        self.entries.iter().map(|(&col, &value)| (col, value))
    }

    /// Keeps only the cells for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, &CellValue) -> bool,
    {
        self.entries.retain(|&col, value| keep(col, value));
    }
}

impl FromIterator<(usize, CellValue)> for SparseRow {
    fn from_iter<I: IntoIterator<Item = (usize, CellValue)>>(iter: I) -> Self {
        SparseRow {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// SPARSE MATRIX
// ============================================================================

/// Row index -> `SparseRow`. Rows iterate in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    rows: BTreeMap<usize, SparseRow>,
}

impl SparseMatrix {
    /// Creates a new, empty matrix.
    pub fn new() -> Self {
        SparseMatrix {
            rows: BTreeMap::new(),
        }
    }

    /// Retrieves a cell. Returns None if the cell is not stored.
    pub fn get(&self, row: usize, col: usize) -> Option<CellValue> {
        self.rows.get(&row).and_then(|r| r.get(col))
    }

    /// Sets a cell, creating the row if needed.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        self.rows.entry(row).or_default().set(col, value);
    }

    /// Removes a cell. An emptied row stays in place; use `remove_row` to drop it.
    pub fn remove(&mut self, row: usize, col: usize) -> Option<CellValue> {
        self.rows.get_mut(&row).and_then(|r| r.remove(col))
    }

    /// Number of stored rows (populated or explicitly inserted).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total number of populated cells.
    pub fn nnz(&self) -> usize {
        self.rows.values().map(SparseRow::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(SparseRow::is_empty)
    }

    pub fn row(&self, row: usize) -> Option<&SparseRow> {
        self.rows.get(&row)
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut SparseRow> {
        self.rows.get_mut(&row)
    }

    /// Inserts a whole row, replacing any existing one.
    pub fn insert_row(&mut self, row: usize, data: SparseRow) -> Option<SparseRow> {
        self.rows.insert(row, data)
    }

    /// Moves a row out of the matrix.
    pub fn take_row(&mut self, row: usize) -> Option<SparseRow> {
        self.rows.remove(&row)
    }

    pub fn remove_row(&mut self, row: usize) {
        self.rows.remove(&row);
    }

    /// Iterates stored rows in ascending order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &SparseRow)> + '_ {
        self.rows.iter().map(|(&idx, row)| (idx, row))
    }

    /// Iterates all populated cells as (row, col, value).
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, CellValue)> + '_ {
        self.rows
            .iter()
            .flat_map(|(&row, data)| data.iter().map(move |(col, value)| (row, col, value)))
    }

    /// Keeps only the cells for which `keep` returns true.
    pub fn retain_cells<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize, usize, &CellValue) -> bool,
    {
        for (&row, data) in self.rows.iter_mut() {
            data.retain(|col, value| keep(row, col, value));
        }
    }
}
