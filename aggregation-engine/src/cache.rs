//! FILENAME: aggregation-engine/src/cache.rs
//! View Cache - Per-view aggregation results.
//!
//! Each aggregated view keeps:
//! - the aggregated matrix, addressed by logical (contiguous) indices
//! - the logical -> physical section mapping for both orientations, plus
//!   its reverse for search and selection sync
//! - the target record of the run, so headers can list united members
//!
//! Entries are rebuilt wholesale by every aggregation run and dropped when
//! the view's aggregation settings change.

use engine::{CellValue, Orientation, SectionIndex, SparseMatrix};
use rustc_hash::FxHashMap;

use crate::aggregator::TargetRecord;
use crate::definition::ViewId;

// ============================================================================
// SECTION MAPPING
// ============================================================================

/// Logical index (position) -> physical section, per orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMapping {
    rows: Vec<SectionIndex>,
    columns: Vec<SectionIndex>,
    row_lookup: FxHashMap<SectionIndex, usize>,
    column_lookup: FxHashMap<SectionIndex, usize>,
}

impl SectionMapping {
    pub fn new(rows: Vec<SectionIndex>, columns: Vec<SectionIndex>) -> Self {
        let row_lookup = rows.iter().enumerate().map(|(logical, &p)| (p, logical)).collect();
        let column_lookup = columns.iter().enumerate().map(|(logical, &p)| (p, logical)).collect();
        SectionMapping {
            rows,
            columns,
            row_lookup,
            column_lookup,
        }
    }

    /// Physical sections of one orientation, in logical order.
    pub fn sections(&self, orientation: Orientation) -> &[SectionIndex] {
        match orientation {
            Orientation::Vertical => &self.rows,
            Orientation::Horizontal => &self.columns,
        }
    }

    pub fn physical(&self, orientation: Orientation, logical: usize) -> Option<SectionIndex> {
        self.sections(orientation).get(logical).copied()
    }

    pub fn logical(&self, orientation: Orientation, physical: SectionIndex) -> Option<usize> {
        let lookup = match orientation {
            Orientation::Vertical => &self.row_lookup,
            Orientation::Horizontal => &self.column_lookup,
        };
        lookup.get(&physical).copied()
    }

    pub fn len(&self, orientation: Orientation) -> usize {
        self.sections(orientation).len()
    }
}

// ============================================================================
// CACHE ENTRY
// ============================================================================

/// Statistics about one aggregation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Populated cells of the view region before filtering.
    pub source_cells: usize,
    /// Populated cells after the value filter.
    pub filtered_cells: usize,
    /// Populated cells of the final matrix.
    pub result_cells: usize,
    pub build_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub view_id: ViewId,
    /// Config version the entry was built from.
    pub version: u64,
    /// Aggregated matrix in logical coordinates.
    pub matrix: SparseMatrix,
    pub mapping: SectionMapping,
    pub targets: TargetRecord,
    pub stats: CacheStats,
}

impl CacheEntry {
    /// Cell at logical (row, column).
    pub fn data(&self, row: usize, column: usize) -> Option<CellValue> {
        self.matrix.get(row, column)
    }

    pub fn header_data(&self, logical: usize, orientation: Orientation) -> Option<SectionIndex> {
        self.mapping.physical(orientation, logical)
    }

    pub fn row_count(&self) -> usize {
        self.mapping.len(Orientation::Vertical)
    }

    pub fn column_count(&self) -> usize {
        self.mapping.len(Orientation::Horizontal)
    }

    /// Physical members a logical section stands for (itself when not a target).
    pub fn united_sections(&self, logical: usize, orientation: Orientation) -> Vec<SectionIndex> {
        let Some(physical) = self.header_data(logical, orientation) else {
            return Vec::new();
        };
        self.targets
            .members_of(orientation, physical)
            .map(<[SectionIndex]>::to_vec)
            .unwrap_or_else(|| vec![physical])
    }
}

// ============================================================================
// AGGREGATION CACHE
// ============================================================================

/// View id -> cache entry.
#[derive(Debug, Clone, Default)]
pub struct AggregationCache {
    entries: FxHashMap<ViewId, CacheEntry>,
}

impl AggregationCache {
    pub fn new() -> Self {
        AggregationCache::default()
    }

    pub fn get(&self, view: ViewId) -> Option<&CacheEntry> {
        self.entries.get(&view)
    }

    /// Stores an entry, replacing the view's previous one.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(entry.view_id, entry)
    }

    /// Drops a view's entry. Returns whether one existed.
    pub fn invalidate(&mut self, view: ViewId) -> bool {
        self.entries.remove(&view).is_some()
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.entries.contains_key(&view)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
