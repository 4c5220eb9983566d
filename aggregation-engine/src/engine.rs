//! FILENAME: aggregation-engine/src/engine.rs
//! Aggregation Engine - The pipeline that turns a raw model matrix into a
//! cached, filtered and aggregated view.
//!
//! Algorithm (per view):
//! 1. Aggregation "None" with no active filter: raw passthrough, no cache
//! 2. Copy raw cells of the view region that pass the value filter
//! 3. Unite rows (Vertical groups)
//! 4. Drop rows failing the identifier/label filters; record row mapping
//! 5. Default every surviving row so the column pass sees each of them
//! 6. Unite columns (Horizontal groups)
//! 7. Drop failing columns; record column mapping; renumber to logical
//! 8. Hand the entry to the cache
//!
//! The pipeline never fails. Inconsistent configuration contributes
//! nothing and degrades to absent cells or NA.

use std::ops::Range;
use std::time::Instant;

use engine::{
    load_raw_matrix, log_debug, log_enter, log_exit, CellValue, ModelSource, Orientation,
    SectionIndex, SparseMatrix, SparseRow,
};
use rustc_hash::FxHashMap;

use crate::aggregator::{Aggregator, TargetRecord};
use crate::cache::{AggregationCache, CacheEntry, CacheStats, SectionMapping};
use crate::definition::{Aggregation, ViewConfig, ViewId, ViewKind};
use crate::filter::{IdentifierFilter, LabelFilter, SectionFilter, ValueFilter};
use crate::grouping::SectionGroup;

// ============================================================================
// VIEW CALCULATOR
// ============================================================================

/// Runs the pipeline for one immutable configuration snapshot.
pub struct ViewCalculator<'a> {
    raw: &'a SparseMatrix,
    model: &'a dyn ModelSource,
    config: &'a ViewConfig,
    aggregator: Aggregator,
    row_range: Range<SectionIndex>,
    column_range: Range<SectionIndex>,
    targets: TargetRecord,
    stats: CacheStats,
}

impl<'a> ViewCalculator<'a> {
    pub fn new(raw: &'a SparseMatrix, model: &'a dyn ModelSource, config: &'a ViewConfig) -> Self {
        ViewCalculator {
            raw,
            model,
            config,
            aggregator: Aggregator::from(config.aggregation.kind),
            row_range: config.kind.section_range(Orientation::Vertical, model),
            column_range: config.kind.section_range(Orientation::Horizontal, model),
            targets: TargetRecord::new(),
            stats: CacheStats::default(),
        }
    }

    /// Executes steps 2-7 and returns the entry to cache.
    pub fn calculate(mut self) -> CacheEntry {
        let started = Instant::now();
        let use_absolute = self.config.aggregation.use_absolute;

        // Step 2: value filter over the view region
        let working = self.apply_value_filter();

        // Step 3: row pass
        let row_groups = self.effective_groups(Orientation::Vertical);
        let mut working =
            self.aggregator
                .aggregate_rows(working, &row_groups, use_absolute, &mut self.targets);

        // Step 4: row filter
        let rows = self.surviving_sections(Orientation::Vertical);
        self.drop_rows(&mut working, &rows);
        log_debug!("AGG", "view {}: {} rows survive", self.config.view_id, rows.len());

        // Step 5: default surviving rows
        default_rows(&mut working, &rows);

        // Step 6: column pass
        let column_groups = self.effective_groups(Orientation::Horizontal);
        let working = self.aggregator.aggregate_columns(
            working,
            &rows,
            &column_groups,
            use_absolute,
            &mut self.targets,
        );

        // Step 7: column filter + renumbering
        let columns = self.surviving_sections(Orientation::Horizontal);
        log_debug!("AGG", "view {}: {} columns survive", self.config.view_id, columns.len());
        let mapping = SectionMapping::new(rows, columns);
        let matrix = renumber(working, &mapping);

        self.stats.result_cells = matrix.nnz();
        self.stats.build_time_ms = started.elapsed().as_millis() as u64;

        CacheEntry {
            view_id: self.config.view_id,
            version: self.config.version,
            matrix,
            mapping,
            targets: self.targets,
            stats: self.stats,
        }
    }

    /// Copies raw cells inside the view region that pass the value filter.
    fn apply_value_filter(&mut self) -> SparseMatrix {
        let mut working = SparseMatrix::new();

        for (row_idx, row) in self.raw.rows() {
            if !self.row_range.contains(&row_idx) {
                continue;
            }
            let region: SparseRow = row
                .iter()
                .filter(|(col, _)| self.column_range.contains(col))
                .collect();
            if !region.is_empty() {
                working.insert_row(row_idx, region);
            }
        }
        self.stats.source_cells = working.nnz();

        let filter: &ValueFilter = &self.config.value_filter;
        filter.apply(&mut working);
        self.stats.filtered_cells = working.nnz();

        working
    }

    /// Groups of one orientation restricted to the view region. Header
    /// sections are never aggregated; members outside the region are
    /// dropped and emptied groups skipped.
    fn effective_groups(&self, orientation: Orientation) -> Vec<SectionGroup> {
        if self.aggregator.is_identity() || self.config.kind.shows_attributes(orientation) {
            return Vec::new();
        }
        let range = self.range(orientation);
        let header = self.model.header_layout();

        self.config
            .aggregation
            .map
            .groups(orientation)
            .filter_map(|group| {
                let kept: SectionGroup = group
                    .iter()
                    .copied()
                    .filter(|s| range.contains(s) && !header.is_header(*s))
                    .collect();
                if kept.len() < group.len() {
                    log_debug!(
                        "AGG",
                        "{:?} group {:?}: {} members outside the view",
                        orientation,
                        group.as_slice(),
                        group.len() - kept.len()
                    );
                }
                if kept.is_empty() {
                    None
                } else {
                    Some(kept)
                }
            })
            .collect()
    }

    /// Sections of the view region that still exist after the aggregation
    /// pass and pass the identifier and label filters, in physical order.
    fn surviving_sections(&self, orientation: Orientation) -> Vec<SectionIndex> {
        let identifiers: &IdentifierFilter = &self.config.identifier_filter;
        let labels: &LabelFilter = &self.config.label_filter;
        let filter = SectionFilter {
            model: self.model,
            identifiers,
            labels,
            targets: &self.targets,
        };

        self.range(orientation)
            .filter(|&s| !self.targets.is_absorbed(orientation, s))
            .filter(|&s| filter.is_visible(orientation, s))
            .collect()
    }

    fn drop_rows(&self, working: &mut SparseMatrix, rows: &[SectionIndex]) {
        let stored: Vec<SectionIndex> = working.rows().map(|(idx, _)| idx).collect();
        for idx in stored {
            if rows.binary_search(&idx).is_err() {
                working.remove_row(idx);
            }
        }
    }

    fn range(&self, orientation: Orientation) -> Range<SectionIndex> {
        match orientation {
            Orientation::Vertical => self.row_range.clone(),
            Orientation::Horizontal => self.column_range.clone(),
        }
    }
}

/// Gives every surviving row a slot, so the column pass visits rows that
/// lost all of their cells.
fn default_rows(working: &mut SparseMatrix, rows: &[SectionIndex]) {
    for &row in rows {
        if working.row(row).is_none() {
            working.insert_row(row, SparseRow::new());
        }
    }
}

/// Moves a physically addressed matrix into logical coordinates, dropping
/// cells whose row or column did not survive.
fn renumber(mut working: SparseMatrix, mapping: &SectionMapping) -> SparseMatrix {
    let mut result = SparseMatrix::new();
    for (logical_row, &physical_row) in mapping.sections(Orientation::Vertical).iter().enumerate() {
        let Some(row) = working.take_row(physical_row) else {
            continue;
        };
        let renumbered: SparseRow = row
            .iter()
            .filter_map(|(col, value)| {
                mapping
                    .logical(Orientation::Horizontal, col)
                    .map(|logical_col| (logical_col, value))
            })
            .collect();
        if !renumbered.is_empty() {
            result.insert_row(logical_row, renumbered);
        }
    }
    result
}

/// Runs the pipeline for one view. Returns None for raw passthrough
/// (aggregation None and nothing filtered); the caller clears the view's
/// cache in that case.
pub fn aggregate_view(
    raw: &SparseMatrix,
    model: &dyn ModelSource,
    config: &ViewConfig,
) -> Option<CacheEntry> {
    if config.aggregation.is_none() && !config.has_active_filters() {
        return None;
    }
    Some(ViewCalculator::new(raw, model, config).calculate())
}

// ============================================================================
// ENGINE
// ============================================================================

/// Owns the raw matrix of one model instance plus every view's
/// configuration and cache entry.
pub struct AggregationEngine<M: ModelSource> {
    model: M,
    raw: SparseMatrix,
    views: FxHashMap<ViewId, ViewConfig>,
    cache: AggregationCache,
}

impl<M: ModelSource> AggregationEngine<M> {
    /// Loads the raw matrix from the model.
    pub fn new(model: M) -> Self {
        let raw = load_raw_matrix(&model);
        log_debug!(
            "AGG",
            "loaded raw matrix: {} rows, {} cells",
            raw.row_count(),
            raw.nnz()
        );
        AggregationEngine {
            model,
            raw,
            views: FxHashMap::default(),
            cache: AggregationCache::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn raw(&self) -> &SparseMatrix {
        &self.raw
    }

    pub fn view_config(&self, view: ViewId) -> Option<&ViewConfig> {
        self.views.get(&view)
    }

    /// Registers a view, replacing any previous configuration and cache.
    pub fn add_view(&mut self, view: ViewId, kind: ViewKind) {
        self.views.insert(view, ViewConfig::new(view, kind));
        self.cache.invalidate(view);
    }

    /// Replaces a view's whole configuration.
    pub fn set_view_config(&mut self, config: ViewConfig) {
        let view = config.view_id;
        self.views.insert(view, config);
        self.cache.invalidate(view);
    }

    pub fn remove_view(&mut self, view: ViewId) {
        self.views.remove(&view);
        self.cache.invalidate(view);
    }

    fn config_mut(&mut self, view: ViewId) -> &mut ViewConfig {
        self.views
            .entry(view)
            .or_insert_with(|| ViewConfig::new(view, ViewKind::default()))
    }

    pub fn set_view_kind(&mut self, view: ViewId, kind: ViewKind) {
        let config = self.config_mut(view);
        if config.kind != kind {
            config.kind = kind;
            config.bump_version();
            self.cache.invalidate(view);
        }
    }

    /// Filter changes take effect on the next `aggregate` call.
    pub fn set_value_filter(&mut self, view: ViewId, filter: ValueFilter) {
        let config = self.config_mut(view);
        config.value_filter = filter;
        config.bump_version();
    }

    pub fn set_identifier_filter(&mut self, view: ViewId, filter: IdentifierFilter) {
        let config = self.config_mut(view);
        config.identifier_filter = filter;
        config.bump_version();
    }

    pub fn set_label_filter(&mut self, view: ViewId, filter: LabelFilter) {
        let config = self.config_mut(view);
        config.label_filter = filter;
        config.bump_version();
    }

    /// Sets statistic, absolute flag and grouping. Any change drops the
    /// view's cache entry.
    pub fn set_aggregation(&mut self, view: ViewId, aggregation: Aggregation) {
        let config = self.config_mut(view);
        if config.aggregation != aggregation {
            config.aggregation = aggregation;
            config.bump_version();
            self.cache.invalidate(view);
        }
    }

    /// Rebuilds the cache entry of a view from a snapshot of its config.
    pub fn aggregate(&mut self, view: ViewId) -> Option<&CacheEntry> {
        let snapshot = self.config_mut(view).clone();
        log_enter!(
            "AGG",
            "aggregate",
            "view={} kind={:?} statistic={:?}",
            view,
            snapshot.kind,
            snapshot.aggregation.kind
        );

        match aggregate_view(&self.raw, &self.model, &snapshot) {
            Some(entry) => {
                log_exit!(
                    "AGG",
                    "aggregate",
                    "rows={} cols={} cells={} ms={}",
                    entry.row_count(),
                    entry.column_count(),
                    entry.stats.result_cells,
                    entry.stats.build_time_ms
                );
                self.cache.insert(entry);
            }
            None => {
                log_exit!("AGG", "aggregate", "passthrough");
                self.cache.invalidate(view);
            }
        }
        self.cache.get(view)
    }

    pub fn cache_entry(&self, view: ViewId) -> Option<&CacheEntry> {
        self.cache.get(view)
    }

    pub fn is_cached(&self, view: ViewId) -> bool {
        self.cache.contains(view)
    }

    /// Cell at logical (row, column) of a view; the raw matrix when the
    /// view has no cache.
    pub fn data(&self, row: usize, column: usize, view: ViewId) -> Option<CellValue> {
        match self.cache.get(view) {
            Some(entry) => entry.data(row, column),
            None => self.raw.get(row, column),
        }
    }

    /// Logical -> physical section. Identity within the model extent when
    /// the view has no cache.
    pub fn header_data(&self, logical: usize, orientation: Orientation, view: ViewId) -> Option<SectionIndex> {
        match self.cache.get(view) {
            Some(entry) => entry.header_data(logical, orientation),
            None => (logical < self.model.section_count(orientation)).then_some(logical),
        }
    }

    /// Physical -> logical section, None when the section is hidden or
    /// united into another target.
    pub fn logical_index(&self, physical: SectionIndex, orientation: Orientation, view: ViewId) -> Option<usize> {
        match self.cache.get(view) {
            Some(entry) => entry.mapping.logical(orientation, physical),
            None => (physical < self.model.section_count(orientation)).then_some(physical),
        }
    }

    pub fn row_count(&self, view: ViewId) -> usize {
        self.section_count(Orientation::Vertical, view)
    }

    pub fn column_count(&self, view: ViewId) -> usize {
        self.section_count(Orientation::Horizontal, view)
    }

    fn section_count(&self, orientation: Orientation, view: ViewId) -> usize {
        match self.cache.get(view) {
            Some(entry) => entry.mapping.len(orientation),
            None => self.model.section_count(orientation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::AggregationType;
    use crate::grouping::{AggregationItem, AggregationMap};
    use engine::{HeaderLayout, ModelInstance};
    use smallvec::smallvec;

    /// Header-less 3 equations x 2 variables: {(0,0):5, (1,1):-3, (2,0):2}.
    fn model() -> ModelInstance {
        let mut model = ModelInstance::new(HeaderLayout::new(Vec::<String>::new()));
        model.add_equation_symbol(
            "e",
            vec![vec!["1".into()], vec!["2".into()], vec!["3".into()]],
        );
        model.add_variable_symbol("x", vec![vec!["a".into()], vec!["b".into()]]);
        model.set_coefficient(0, 0, CellValue::Number(5.0));
        model.set_coefficient(1, 1, CellValue::Number(-3.0));
        model.set_coefficient(2, 0, CellValue::Number(2.0));
        model
    }

    fn sum_all_rows(use_absolute: bool) -> Aggregation {
        let mut map = AggregationMap::new();
        map.insert(
            Orientation::Vertical,
            AggregationItem::new(0, AggregationType::Sum, vec![smallvec![0, 1, 2]]),
        );
        Aggregation::new(AggregationType::Sum, use_absolute, map)
    }

    #[test]
    fn test_sum_all_rows() {
        let mut engine = AggregationEngine::new(model());
        engine.add_view(1, ViewKind::Jacobian);
        engine.set_aggregation(1, sum_all_rows(false));
        engine.aggregate(1);

        assert_eq!(engine.row_count(1), 1);
        assert_eq!(engine.column_count(1), 2);
        assert_eq!(engine.data(0, 0, 1), Some(CellValue::Number(7.0)));
        assert_eq!(engine.data(0, 1, 1), Some(CellValue::Number(-3.0)));
        assert_eq!(engine.header_data(0, Orientation::Vertical, 1), Some(0));
    }

    #[test]
    fn test_sum_all_rows_absolute() {
        let mut engine = AggregationEngine::new(model());
        engine.set_aggregation(1, sum_all_rows(true));
        engine.aggregate(1);

        assert_eq!(engine.data(0, 0, 1), Some(CellValue::Number(7.0)));
        assert_eq!(engine.data(0, 1, 1), Some(CellValue::Number(3.0)));
    }

    #[test]
    fn test_none_is_raw_passthrough() {
        let mut engine = AggregationEngine::new(model());
        engine.add_view(1, ViewKind::Jacobian);
        assert!(engine.aggregate(1).is_none());
        assert!(!engine.is_cached(1));

        let raw = engine.raw().clone();
        for (row, col, value) in raw.iter() {
            assert_eq!(engine.data(row, col, 1), Some(value));
        }
        assert_eq!(engine.header_data(2, Orientation::Vertical, 1), Some(2));
        assert_eq!(engine.header_data(3, Orientation::Vertical, 1), None);
    }

    #[test]
    fn test_aggregation_change_invalidates_cache() {
        let mut engine = AggregationEngine::new(model());
        engine.set_aggregation(1, sum_all_rows(false));
        engine.aggregate(1);
        assert!(engine.is_cached(1));

        engine.set_aggregation(1, sum_all_rows(false));
        assert!(engine.is_cached(1));

        engine.set_aggregation(1, sum_all_rows(true));
        assert!(!engine.is_cached(1));
    }

    #[test]
    fn test_none_with_filters_runs_identity() {
        let mut engine = AggregationEngine::new(model());
        let mut identifiers = IdentifierFilter::new();
        identifiers.set_section(Orientation::Vertical, engine.model(), 1, false);
        engine.set_identifier_filter(1, identifiers);
        engine.aggregate(1);

        assert_eq!(engine.cache_entry(1).map(|e| e.mapping.sections(Orientation::Vertical).to_vec()), Some(vec![0, 2]));
        assert_eq!(engine.data(1, 0, 1), Some(CellValue::Number(2.0)));
        assert_eq!(engine.logical_index(2, Orientation::Vertical, 1), Some(1));
        assert_eq!(engine.logical_index(1, Orientation::Vertical, 1), None);
    }
}
