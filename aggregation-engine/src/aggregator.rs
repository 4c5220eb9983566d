//! FILENAME: aggregation-engine/src/aggregator.rs
//! Aggregator strategy family.
//!
//! One `Aggregator` is selected per aggregation run. It reduces a group of
//! cells into one target cell, first along rows (uniting equations) and
//! then along columns (uniting variables) of the row-reduced matrix.
//!
//! Special values never take part in arithmetic. Count counts every
//! populated member; every other statistic works on the numeric members
//! only and yields NA when there are none.

use std::collections::BTreeMap;

use engine::{CellValue, Orientation, SectionIndex, SparseMatrix, SparseRow};
use rustc_hash::FxHashSet;

use crate::definition::AggregationType;
use crate::grouping::{AggregationItem, SectionGroup};

// ============================================================================
// TARGET RECORD
// ============================================================================

/// Which target section each group was reduced into, per orientation.
/// Lets the identifier filter treat a synthesized target as checked when
/// any of its members is checked.
#[derive(Debug, Clone, Default)]
pub struct TargetRecord {
    targets: [BTreeMap<SectionIndex, Vec<SectionIndex>>; 2],
    absorbed: [FxHashSet<SectionIndex>; 2],
}

impl TargetRecord {
    pub fn new() -> Self {
        TargetRecord::default()
    }

    /// Records that `members` (target first) were united into their first member.
    pub fn record(&mut self, orientation: Orientation, members: &[SectionIndex]) {
        let Some((&target, rest)) = members.split_first() else {
            return;
        };
        let slot = orientation.slot();
        self.absorbed[slot].extend(rest.iter().copied());
        self.targets[slot].insert(target, members.to_vec());
    }

    /// Members united into `target`, target included.
    pub fn members_of(&self, orientation: Orientation, target: SectionIndex) -> Option<&[SectionIndex]> {
        self.targets[orientation.slot()].get(&target).map(Vec::as_slice)
    }

    /// True for a non-target member of some group: it no longer exists as
    /// its own section after aggregation.
    pub fn is_absorbed(&self, orientation: Orientation, section: SectionIndex) -> bool {
        self.absorbed[orientation.slot()].contains(&section)
    }

    pub fn targets(&self, orientation: Orientation) -> impl Iterator<Item = SectionIndex> + '_ {
        self.targets[orientation.slot()].keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.iter().all(BTreeMap::is_empty)
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Closed set of reduction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Identity,
    Count,
    Sum,
    Mean,
    Median,
    Min,
    Max,
}

impl From<AggregationType> for Aggregator {
    fn from(kind: AggregationType) -> Self {
        match kind {
            AggregationType::None => Aggregator::Identity,
            AggregationType::Count => Aggregator::Count,
            AggregationType::Sum => Aggregator::Sum,
            AggregationType::Mean => Aggregator::Mean,
            AggregationType::Median => Aggregator::Median,
            AggregationType::Min => Aggregator::Min,
            AggregationType::Max => Aggregator::Max,
        }
    }
}

impl Aggregator {
    pub fn is_identity(&self) -> bool {
        *self == Aggregator::Identity
    }

    /// Reduces one group into one value. `lookup` returns the member's cell
    /// (a row of the group for the row pass, a column for the column pass).
    /// Returns None when the target cell should stay absent.
    pub fn reduce<F>(&self, group: &[SectionIndex], lookup: F, use_absolute: bool) -> Option<CellValue>
    where
        F: Fn(SectionIndex) -> Option<CellValue>,
    {
        let values: SmallValues = group.iter().filter_map(|&member| lookup(member)).collect();
        self.reduce_values(&values, use_absolute)
    }

    /// Reduces the populated cells of one group.
    ///
    /// - Count: number of cells, an explicit 0 when there are none.
    /// - Others: None when there are no cells at all, NA when no cell is
    ///   numeric.
    pub fn reduce_values(&self, values: &[CellValue], use_absolute: bool) -> Option<CellValue> {
        match self {
            Aggregator::Identity => return values.first().copied(),
            Aggregator::Count => return Some(CellValue::Number(values.len() as f64)),
            _ => {}
        }
        if values.is_empty() {
            return None;
        }

        let numbers = values.iter().filter_map(CellValue::as_number).map(|v| {
            if use_absolute {
                v.abs()
            } else {
                v
            }
        });

        let result = match self {
            Aggregator::Sum => numbers.fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v)),
            Aggregator::Mean => {
                let (sum, count) = numbers.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                if count > 0 {
                    Some(sum / count as f64)
                } else {
                    None
                }
            }
            Aggregator::Median => {
                let mut working: Vec<f64> = numbers.collect();
                median(&mut working)
            }
            // Seeded by the first numeric member, never by 0.0.
            Aggregator::Min => numbers.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v)))),
            Aggregator::Max => numbers.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v)))),
            Aggregator::Identity | Aggregator::Count => None,
        };

        // Overflow lands on the infinity tokens, never on a non-finite Number.
        Some(result.map_or(CellValue::NotApplicable, CellValue::from_f64))
    }

    // ========================================================================
    // ROW PASS
    // ========================================================================

    /// Unites the rows of every group into the group's target row. For each
    /// column populated in any member row, the members' cells are reduced.
    /// Rows outside every group pass through untouched.
    ///
    /// Columns empty in every member stay absent, Count included: the row
    /// pass has no column domain. Explicit zero counts come from the column
    /// pass, which visits every surviving row.
    pub fn aggregate_rows(
        &self,
        mut matrix: SparseMatrix,
        groups: &[SectionGroup],
        use_absolute: bool,
        record: &mut TargetRecord,
    ) -> SparseMatrix {
        if self.is_identity() {
            return matrix;
        }

        for group in groups {
            let Some(target) = AggregationItem::target_of(group) else {
                continue;
            };
            record.record(Orientation::Vertical, group);

            // Members already taken by an earlier group contribute nothing.
            let members: Vec<SparseRow> = group.iter().filter_map(|&r| matrix.take_row(r)).collect();
            if members.is_empty() {
                continue;
            }

            let mut columns: Vec<usize> = members.iter().flat_map(|row| row.iter().map(|(c, _)| c)).collect();
            columns.sort_unstable();
            columns.dedup();

            let mut united = SparseRow::with_capacity(columns.len());
            for col in columns {
                let values: SmallValues = members.iter().filter_map(|row| row.get(col)).collect();
                if let Some(value) = self.reduce_values(&values, use_absolute) {
                    united.set(col, value);
                }
            }
            matrix.insert_row(target, united);
        }

        matrix
    }

    // ========================================================================
    // COLUMN PASS
    // ========================================================================

    /// Unites the columns of every group into the group's target column, in
    /// every stored row. Callers default the surviving rows first so each of
    /// them is visited, which is what makes Count write explicit zeros.
    pub fn aggregate_columns(
        &self,
        mut matrix: SparseMatrix,
        rows: &[SectionIndex],
        groups: &[SectionGroup],
        use_absolute: bool,
        record: &mut TargetRecord,
    ) -> SparseMatrix {
        if self.is_identity() {
            return matrix;
        }

        for group in groups {
            record.record(Orientation::Horizontal, group);
        }

        for &row_idx in rows {
            let Some(row) = matrix.row_mut(row_idx) else {
                continue;
            };
            for group in groups {
                let Some(target) = AggregationItem::target_of(group) else {
                    continue;
                };
                let reduced = self.reduce(group, |col| row.get(col), use_absolute);
                for &member in group.iter() {
                    row.remove(member);
                }
                if let Some(value) = reduced {
                    row.set(target, value);
                }
            }
        }

        matrix
    }
}

type SmallValues = smallvec::SmallVec<[CellValue; 16]>;

/// Median through two order-statistic selections for even sizes.
fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    let (_, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let (_, lower, _) = values.select_nth_unstable_by(mid - 1, f64::total_cmp);
    Some((*lower + upper) / 2.0)
}
