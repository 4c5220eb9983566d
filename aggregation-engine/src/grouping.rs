//! FILENAME: aggregation-engine/src/grouping.rs
//! Aggregation grouping model.
//!
//! Describes, per orientation and per symbol, which physical sections are
//! united into which target section. Groups are derived from the
//! dimensions the user chose to collapse: sections sharing the labels of
//! every kept dimension end up in the same group. The first member of a
//! group is its target section.

use std::collections::BTreeMap;

use engine::{log_debug, ModelSource, Orientation, SectionIndex, Symbol};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::definition::AggregationType;
use crate::error::ConfigError;

/// Ordered physical sections reduced into one target section.
pub type SectionGroup = SmallVec<[SectionIndex; 8]>;

// ============================================================================
// AGGREGATION ITEM
// ============================================================================

/// Grouping of one symbol's sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationItem {
    /// First physical section of the symbol.
    pub symbol_anchor: SectionIndex,

    pub statistic: AggregationType,

    /// One entry per target section, each listing the members it unites.
    pub united_sections: Vec<SectionGroup>,
}

impl AggregationItem {
    pub fn new(
        symbol_anchor: SectionIndex,
        statistic: AggregationType,
        united_sections: Vec<SectionGroup>,
    ) -> Self {
        AggregationItem {
            symbol_anchor,
            statistic,
            united_sections,
        }
    }

    /// Groups a symbol's sections by the labels of the dimensions that are
    /// NOT collapsed. Groups appear in order of their first member.
    /// Out-of-range dimensions in `collapsed` are ignored.
    pub fn from_symbol(
        model: &dyn ModelSource,
        symbol: &Symbol,
        collapsed: &[usize],
        statistic: AggregationType,
    ) -> Self {
        let kept: Vec<usize> = (0..symbol.dimension)
            .filter(|dim| !collapsed.contains(dim))
            .collect();

        let mut group_of_key: FxHashMap<Vec<&str>, usize> = FxHashMap::default();
        let mut groups: Vec<SectionGroup> = Vec::new();

        for section in symbol.sections() {
            let labels = model.section_labels(symbol.orientation, section);
            let key: Vec<&str> = kept
                .iter()
                .map(|&dim| labels.get(dim).map_or("", String::as_str))
                .collect();

            match group_of_key.get(&key) {
                Some(&idx) => groups[idx].push(section),
                None => {
                    group_of_key.insert(key, groups.len());
                    groups.push(smallvec![section]);
                }
            }
        }

        AggregationItem::new(symbol.first_section, statistic, groups)
    }

    /// The section a group is reduced into.
    pub fn target_of(group: &[SectionIndex]) -> Option<SectionIndex> {
        group.first().copied()
    }
}

// ============================================================================
// GROUP SELECTION
// ============================================================================

/// The user's choice of which dimensions of a symbol to collapse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelection {
    pub orientation: Orientation,
    pub symbol_anchor: SectionIndex,
    pub collapsed_dimensions: Vec<usize>,
}

impl GroupSelection {
    pub fn new(orientation: Orientation, symbol_anchor: SectionIndex, collapsed_dimensions: Vec<usize>) -> Self {
        GroupSelection {
            orientation,
            symbol_anchor,
            collapsed_dimensions,
        }
    }

    pub fn validate(&self, model: &dyn ModelSource) -> Result<(), ConfigError> {
        let symbol = model
            .symbol_by_anchor(self.orientation, self.symbol_anchor)
            .ok_or(ConfigError::UnknownSymbol {
                orientation: self.orientation,
                anchor: self.symbol_anchor,
            })?;
        match self.collapsed_dimensions.iter().find(|&&d| d >= symbol.dimension) {
            Some(&dimension) => Err(ConfigError::DimensionOutOfRange {
                symbol: symbol.name.clone(),
                dimension,
                symbol_dimension: symbol.dimension,
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// AGGREGATION MAP
// ============================================================================

/// orientation -> (symbol anchor -> AggregationItem)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationMap {
    #[serde(default)]
    vertical: BTreeMap<SectionIndex, AggregationItem>,
    #[serde(default)]
    horizontal: BTreeMap<SectionIndex, AggregationItem>,
}

impl AggregationMap {
    pub fn new() -> Self {
        AggregationMap::default()
    }

    /// Builds the map from the user's selections. Selections naming an
    /// unknown symbol are skipped.
    pub fn build(
        model: &dyn ModelSource,
        selections: &[GroupSelection],
        statistic: AggregationType,
    ) -> Self {
        let mut map = AggregationMap::new();
        for selection in selections {
            match model.symbol_by_anchor(selection.orientation, selection.symbol_anchor) {
                Some(symbol) => {
                    let item = AggregationItem::from_symbol(
                        model,
                        symbol,
                        &selection.collapsed_dimensions,
                        statistic,
                    );
                    map.insert(selection.orientation, item);
                }
                None => {
                    log_debug!(
                        "AGG",
                        "skipping selection for unknown {:?} symbol {}",
                        selection.orientation,
                        selection.symbol_anchor
                    );
                }
            }
        }
        map
    }

    /// Items of one orientation, keyed by symbol anchor.
    pub fn get(&self, orientation: Orientation) -> &BTreeMap<SectionIndex, AggregationItem> {
        match orientation {
            Orientation::Vertical => &self.vertical,
            Orientation::Horizontal => &self.horizontal,
        }
    }

    fn get_mut(&mut self, orientation: Orientation) -> &mut BTreeMap<SectionIndex, AggregationItem> {
        match orientation {
            Orientation::Vertical => &mut self.vertical,
            Orientation::Horizontal => &mut self.horizontal,
        }
    }

    /// Inserts an item, replacing the one for the same symbol.
    pub fn insert(&mut self, orientation: Orientation, item: AggregationItem) -> Option<AggregationItem> {
        self.get_mut(orientation).insert(item.symbol_anchor, item)
    }

    pub fn remove(&mut self, orientation: Orientation, anchor: SectionIndex) -> Option<AggregationItem> {
        self.get_mut(orientation).remove(&anchor)
    }

    pub fn item(&self, orientation: Orientation, anchor: SectionIndex) -> Option<&AggregationItem> {
        self.get(orientation).get(&anchor)
    }

    pub fn items(&self, orientation: Orientation) -> impl Iterator<Item = &AggregationItem> + '_ {
        self.get(orientation).values()
    }

    /// Every group of one orientation, in symbol order.
    pub fn groups(&self, orientation: Orientation) -> impl Iterator<Item = &SectionGroup> + '_ {
        self.items(orientation).flat_map(|item| item.united_sections.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.vertical.is_empty() && self.horizontal.is_empty()
    }

    pub fn set_statistic(&mut self, statistic: AggregationType) {
        for item in self.vertical.values_mut().chain(self.horizontal.values_mut()) {
            item.statistic = statistic;
        }
    }
}
