//! FILENAME: aggregation-engine/src/definition.rs
//! View Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE one matrix view.
//! These structures are designed to be:
//! - Serializable (sent over the UI bridge as JSON)
//! - Immutable snapshots of user intent, handed to the pipeline per run

use std::ops::Range;

use engine::{HeaderLayout, ModelSource, Orientation, SectionIndex};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filter::{IdentifierFilter, LabelFilter, ValueFilter};
use crate::grouping::AggregationMap;

/// Unique identifier for a view (one tab in the inspector).
pub type ViewId = u32;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Statistic used to reduce a group of sections into one target section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationType {
    /// No aggregation; rows and columns pass through unchanged.
    None,
    Count,
    Sum,
    Mean,
    Median,
    Min,
    Max,
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::None
    }
}

/// The aggregation part of a view configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub kind: AggregationType,

    /// Reduce absolute values instead of signed values.
    #[serde(default)]
    pub use_absolute: bool,

    /// Which sections are united into which target sections.
    #[serde(default)]
    pub map: AggregationMap,
}

impl Aggregation {
    /// Creates an aggregation and stamps `kind` onto every item of the map.
    pub fn new(kind: AggregationType, use_absolute: bool, mut map: AggregationMap) -> Self {
        map.set_statistic(kind);
        Aggregation {
            kind,
            use_absolute,
            map,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == AggregationType::None
    }
}

// ============================================================================
// VIEW KIND
// ============================================================================

/// Which region of the physical matrix a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    /// Equations x variables coefficient region.
    Jacobian,
    /// Equations x predefined header attributes (Level, Lower, ...).
    EquationAttributes,
    /// Predefined header attributes x variables.
    VariableAttributes,
}

impl Default for ViewKind {
    fn default() -> Self {
        ViewKind::Jacobian
    }
}

impl ViewKind {
    /// Physical sections of one axis this view keeps.
    pub fn section_range(self, orientation: Orientation, model: &dyn ModelSource) -> Range<SectionIndex> {
        let header = model.header_layout().len();
        let entries = header..model.section_count(orientation);
        let attributes = 0..header;
        match (self, orientation) {
            (ViewKind::Jacobian, _) => entries,
            (ViewKind::EquationAttributes, Orientation::Vertical) => entries,
            (ViewKind::EquationAttributes, Orientation::Horizontal) => attributes,
            (ViewKind::VariableAttributes, Orientation::Vertical) => attributes,
            (ViewKind::VariableAttributes, Orientation::Horizontal) => entries,
        }
    }

    /// Whether sections of this axis are header attributes in this view.
    pub fn shows_attributes(self, orientation: Orientation) -> bool {
        matches!(
            (self, orientation),
            (ViewKind::EquationAttributes, Orientation::Horizontal)
                | (ViewKind::VariableAttributes, Orientation::Vertical)
        )
    }
}

// ============================================================================
// MAIN DEFINITION STRUCT
// ============================================================================

/// The complete, serializable configuration of one view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub view_id: ViewId,

    #[serde(default)]
    pub kind: ViewKind,

    #[serde(default)]
    pub value_filter: ValueFilter,

    #[serde(default)]
    pub identifier_filter: IdentifierFilter,

    #[serde(default)]
    pub label_filter: LabelFilter,

    #[serde(default)]
    pub aggregation: Aggregation,

    /// Version for cache invalidation.
    #[serde(default)]
    pub version: u64,
}

impl ViewConfig {
    pub fn new(view_id: ViewId, kind: ViewKind) -> Self {
        ViewConfig {
            view_id,
            kind,
            ..Default::default()
        }
    }

    /// Increments the version (for cache invalidation).
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// True when any filter would hide something.
    pub fn has_active_filters(&self) -> bool {
        !self.value_filter.is_pass_all()
            || !self.identifier_filter.is_pass_all()
            || !self.label_filter.is_pass_all()
    }

    /// Strict validation for callers that want it. The pipeline itself
    /// never requires this: inconsistent parts are treated as empty.
    pub fn validate(&self, model: &dyn ModelSource) -> Result<(), ConfigError> {
        self.value_filter.validate()?;

        for orientation in Orientation::BOTH {
            for item in self.aggregation.map.items(orientation) {
                let symbol = model
                    .symbol_by_anchor(orientation, item.symbol_anchor)
                    .ok_or(ConfigError::UnknownSymbol {
                        orientation,
                        anchor: item.symbol_anchor,
                    })?;
                for group in &item.united_sections {
                    if group.is_empty() {
                        return Err(ConfigError::EmptyGroup {
                            orientation,
                            anchor: item.symbol_anchor,
                        });
                    }
                    if let Some(&section) = group.iter().find(|&&s| !symbol.contains(s)) {
                        return Err(ConfigError::SectionOutsideSymbol {
                            orientation,
                            anchor: item.symbol_anchor,
                            section,
                        });
                    }
                }
            }

            let header: &HeaderLayout = model.header_layout();
            for anchor in self.identifier_filter.anchors(orientation) {
                if !header.is_header(anchor) && model.symbol_by_anchor(orientation, anchor).is_none() {
                    return Err(ConfigError::UnknownSymbol { orientation, anchor });
                }
            }
        }

        Ok(())
    }
}
