//! FILENAME: aggregation-engine/src/filter.rs
//! Filter stages.
//!
//! - `ValueFilter` prunes raw cells before aggregation.
//! - `IdentifierFilter` and `LabelFilter` prune whole rows/columns after
//!   the aggregation pass of their orientation, using post-aggregation
//!   identity (a target section stands for its whole group).

use std::collections::BTreeMap;

use engine::{CellValue, ModelSource, Orientation, SectionIndex, SparseMatrix, SpecialValue};
use serde::{Deserialize, Serialize};

use crate::aggregator::TargetRecord;
use crate::error::ConfigError;

// ============================================================================
// VALUE FILTER
// ============================================================================

/// Numeric range plus independent show/hide toggles for special values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFilter {
    pub min: f64,
    pub max: f64,

    /// Keep values outside `[min, max]` instead of inside.
    #[serde(default)]
    pub exclude_range: bool,

    /// Compare `|x|` against the range.
    #[serde(default)]
    pub use_absolute: bool,

    #[serde(default = "default_true")]
    pub show_na: bool,
    #[serde(default = "default_true")]
    pub show_eps: bool,
    #[serde(default = "default_true")]
    pub show_pinf: bool,
    #[serde(default = "default_true")]
    pub show_ninf: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ValueFilter {
    fn default() -> Self {
        ValueFilter {
            min: f64::MIN,
            max: f64::MAX,
            exclude_range: false,
            use_absolute: false,
            show_na: true,
            show_eps: true,
            show_pinf: true,
            show_ninf: true,
        }
    }
}

impl ValueFilter {
    /// Range filter with every special value shown.
    pub fn range(min: f64, max: f64) -> Self {
        ValueFilter {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn shows(&self, special: SpecialValue) -> bool {
        match special {
            SpecialValue::NotApplicable => self.show_na,
            SpecialValue::Epsilon => self.show_eps,
            SpecialValue::PositiveInfinity => self.show_pinf,
            SpecialValue::NegativeInfinity => self.show_ninf,
        }
    }

    pub fn set_shown(&mut self, special: SpecialValue, shown: bool) {
        match special {
            SpecialValue::NotApplicable => self.show_na = shown,
            SpecialValue::Epsilon => self.show_eps = shown,
            SpecialValue::PositiveInfinity => self.show_pinf = shown,
            SpecialValue::NegativeInfinity => self.show_ninf = shown,
        }
    }

    /// Whether a single cell survives the filter.
    pub fn accepts(&self, value: &CellValue) -> bool {
        match value.special() {
            Some(special) => self.shows(special),
            None => {
                let number = value.as_number().unwrap_or_default();
                let number = if self.use_absolute { number.abs() } else { number };
                let inside = number >= self.min && number <= self.max;
                inside != self.exclude_range
            }
        }
    }

    /// Removes rejected cells in place.
    pub fn apply(&self, matrix: &mut SparseMatrix) {
        if self.is_pass_all() {
            return;
        }
        matrix.retain_cells(|_, _, value| self.accepts(value));
    }

    /// True when no cell can be rejected.
    pub fn is_pass_all(&self) -> bool {
        !self.exclude_range
            && self.min <= f64::MIN
            && self.max >= f64::MAX
            && SpecialValue::ALL.iter().all(|&s| self.shows(s))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max || self.min.is_nan() || self.max.is_nan() {
            return Err(ConfigError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

// ============================================================================
// IDENTIFIER FILTER
// ============================================================================

/// Check state of a symbol (or a header attribute) in the identifier tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckState {
    Checked,
    Unchecked,
    PartiallyChecked,
}

/// Check state of one symbol, with per-section states when partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCheck {
    pub state: CheckState,

    /// Physical section -> checked. Only consulted when `state` is
    /// `PartiallyChecked`; a missing section is unchecked.
    #[serde(default)]
    pub sections: BTreeMap<SectionIndex, bool>,
}

impl SymbolCheck {
    pub fn checked() -> Self {
        SymbolCheck {
            state: CheckState::Checked,
            sections: BTreeMap::new(),
        }
    }

    pub fn unchecked() -> Self {
        SymbolCheck {
            state: CheckState::Unchecked,
            sections: BTreeMap::new(),
        }
    }

    pub fn partial<I: IntoIterator<Item = (SectionIndex, bool)>>(sections: I) -> Self {
        SymbolCheck {
            state: CheckState::PartiallyChecked,
            sections: sections.into_iter().collect(),
        }
    }

    fn is_section_checked(&self, section: SectionIndex) -> bool {
        match self.state {
            CheckState::Checked => true,
            CheckState::Unchecked => false,
            CheckState::PartiallyChecked => self.sections.get(&section).copied().unwrap_or(false),
        }
    }
}

/// Per orientation: symbol anchor (or header section) -> check state.
/// Symbols without an entry are checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifierFilter {
    #[serde(default)]
    vertical: BTreeMap<SectionIndex, SymbolCheck>,
    #[serde(default)]
    horizontal: BTreeMap<SectionIndex, SymbolCheck>,
}

impl IdentifierFilter {
    pub fn new() -> Self {
        IdentifierFilter::default()
    }

    fn side(&self, orientation: Orientation) -> &BTreeMap<SectionIndex, SymbolCheck> {
        match orientation {
            Orientation::Vertical => &self.vertical,
            Orientation::Horizontal => &self.horizontal,
        }
    }

    fn side_mut(&mut self, orientation: Orientation) -> &mut BTreeMap<SectionIndex, SymbolCheck> {
        match orientation {
            Orientation::Vertical => &mut self.vertical,
            Orientation::Horizontal => &mut self.horizontal,
        }
    }

    pub fn anchors(&self, orientation: Orientation) -> impl Iterator<Item = SectionIndex> + '_ {
        self.side(orientation).keys().copied()
    }

    pub fn symbol(&self, orientation: Orientation, anchor: SectionIndex) -> Option<&SymbolCheck> {
        self.side(orientation).get(&anchor)
    }

    pub fn set_symbol(&mut self, orientation: Orientation, anchor: SectionIndex, check: SymbolCheck) {
        self.side_mut(orientation).insert(anchor, check);
    }

    pub fn check_symbol(&mut self, orientation: Orientation, anchor: SectionIndex) {
        self.set_symbol(orientation, anchor, SymbolCheck::checked());
    }

    pub fn uncheck_symbol(&mut self, orientation: Orientation, anchor: SectionIndex) {
        self.set_symbol(orientation, anchor, SymbolCheck::unchecked());
    }

    /// Sets one section of a symbol. The symbol becomes partial, then
    /// collapses back to Checked/Unchecked when all sections agree.
    /// Unknown sections are ignored.
    pub fn set_section(
        &mut self,
        orientation: Orientation,
        model: &dyn ModelSource,
        section: SectionIndex,
        checked: bool,
    ) {
        if model.header_layout().is_header(section) {
            let check = if checked { SymbolCheck::checked() } else { SymbolCheck::unchecked() };
            self.set_symbol(orientation, section, check);
            return;
        }
        let Some(symbol) = model.symbol_at(orientation, section) else {
            return;
        };

        let current = self
            .symbol(orientation, symbol.first_section)
            .cloned()
            .unwrap_or_else(SymbolCheck::checked);
        let mut sections: BTreeMap<SectionIndex, bool> = symbol
            .sections()
            .map(|s| (s, current.is_section_checked(s)))
            .collect();
        sections.insert(section, checked);

        let check = if sections.values().all(|&c| c) {
            SymbolCheck::checked()
        } else if sections.values().all(|&c| !c) {
            SymbolCheck::unchecked()
        } else {
            SymbolCheck::partial(sections)
        };
        self.set_symbol(orientation, symbol.first_section, check);
    }

    /// Resolved state of a single physical section: Checked or Unchecked.
    /// Header sections anchor to themselves; sections outside every symbol
    /// are checked.
    pub fn check_state(
        &self,
        orientation: Orientation,
        section: SectionIndex,
        model: &dyn ModelSource,
    ) -> CheckState {
        let anchor = if model.header_layout().is_header(section) {
            Some(section)
        } else {
            model.symbol_at(orientation, section).map(|s| s.first_section)
        };
        let checked = anchor
            .and_then(|a| self.side(orientation).get(&a))
            .map_or(true, |check| check.is_section_checked(section));
        if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }

    pub fn is_checked(&self, orientation: Orientation, section: SectionIndex, model: &dyn ModelSource) -> bool {
        self.check_state(orientation, section, model) == CheckState::Checked
    }

    pub fn is_pass_all(&self) -> bool {
        self.vertical
            .values()
            .chain(self.horizontal.values())
            .all(|c| c.state == CheckState::Checked)
    }
}

// ============================================================================
// LABEL FILTER
// ============================================================================

/// How a section's labels combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelMatch {
    /// Kept if at least one label is checked.
    Any,
    /// Kept only if every label is checked.
    All,
}

impl Default for LabelMatch {
    fn default() -> Self {
        LabelMatch::Any
    }
}

/// Label checks of one orientation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelSelection {
    /// Label text -> checked. Labels not listed are checked.
    #[serde(default)]
    pub labels: BTreeMap<String, bool>,

    #[serde(default)]
    pub mode: LabelMatch,
}

impl LabelSelection {
    pub fn is_label_checked(&self, label: &str) -> bool {
        self.labels.get(label).copied().unwrap_or(true)
    }

    /// Sections without labels are always kept.
    pub fn accepts<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        if labels.is_empty() {
            return true;
        }
        match self.mode {
            LabelMatch::Any => labels.iter().any(|l| self.is_label_checked(l.as_ref())),
            LabelMatch::All => labels.iter().all(|l| self.is_label_checked(l.as_ref())),
        }
    }

    pub fn is_pass_all(&self) -> bool {
        self.labels.values().all(|&checked| checked)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelFilter {
    #[serde(default)]
    pub vertical: LabelSelection,
    #[serde(default)]
    pub horizontal: LabelSelection,
}

impl LabelFilter {
    pub fn selection(&self, orientation: Orientation) -> &LabelSelection {
        match orientation {
            Orientation::Vertical => &self.vertical,
            Orientation::Horizontal => &self.horizontal,
        }
    }

    pub fn selection_mut(&mut self, orientation: Orientation) -> &mut LabelSelection {
        match orientation {
            Orientation::Vertical => &mut self.vertical,
            Orientation::Horizontal => &mut self.horizontal,
        }
    }

    pub fn set_label(&mut self, orientation: Orientation, label: &str, checked: bool) {
        self.selection_mut(orientation).labels.insert(label.to_string(), checked);
    }

    pub fn set_mode(&mut self, orientation: Orientation, mode: LabelMatch) {
        self.selection_mut(orientation).mode = mode;
    }

    pub fn is_pass_all(&self) -> bool {
        self.vertical.is_pass_all() && self.horizontal.is_pass_all()
    }
}

// ============================================================================
// SECTION VISIBILITY (post-aggregation)
// ============================================================================

/// Decides whether a row/column survives the identifier and label filters,
/// seeing a target section as the union of the members it absorbed.
pub struct SectionFilter<'a> {
    pub model: &'a dyn ModelSource,
    pub identifiers: &'a IdentifierFilter,
    pub labels: &'a LabelFilter,
    pub targets: &'a TargetRecord,
}

impl<'a> SectionFilter<'a> {
    pub fn is_visible(&self, orientation: Orientation, section: SectionIndex) -> bool {
        let single = [section];
        let members = self
            .targets
            .members_of(orientation, section)
            .unwrap_or(&single);

        let checked = members
            .iter()
            .any(|&m| self.identifiers.is_checked(orientation, m, self.model));
        if !checked {
            return false;
        }

        let shared = shared_labels(self.model, orientation, members);
        self.labels.selection(orientation).accepts(&shared)
    }
}

/// Labels every member of a group carries in the same dimension, in
/// dimension order.
fn shared_labels<'m>(
    model: &'m dyn ModelSource,
    orientation: Orientation,
    members: &[SectionIndex],
) -> Vec<&'m str> {
    let Some((&first, rest)) = members.split_first() else {
        return Vec::new();
    };
    model
        .section_labels(orientation, first)
        .iter()
        .enumerate()
        .filter(|&(dim, label)| {
            rest.iter()
                .all(|&m| model.section_labels(orientation, m).get(dim) == Some(label))
        })
        .map(|(_, label)| label.as_str())
        .collect()
}
