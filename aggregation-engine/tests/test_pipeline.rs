//! FILENAME: tests/test_pipeline.rs
//! Integration tests for the aggregation pipeline.

mod common;

use aggregation_engine::{AggregationType, GroupSelection, ValueFilter};
use common::{approx_eq, TestHarness, TransportFixture, COST, DEMAND, X};
use engine::{CellValue, Orientation};

fn markets_collapsed() -> Vec<GroupSelection> {
    vec![GroupSelection::new(Orientation::Horizontal, X, vec![1])]
}

fn demand_collapsed() -> Vec<GroupSelection> {
    vec![GroupSelection::new(Orientation::Vertical, DEMAND, vec![0])]
}

// ============================================================================
// PASSTHROUGH AND IDENTITY
// ============================================================================

#[test]
fn test_passthrough_without_aggregation_or_filters() {
    let mut harness = TestHarness::transport();
    assert!(harness.engine.aggregate(1).is_none());
    assert!(!harness.engine.is_cached(1));

    assert_eq!(harness.engine.row_count(1), harness.section_count(Orientation::Vertical));
    assert_eq!(harness.engine.data(COST, 11, 1), Some(CellValue::Number(-1.0)));
    assert_eq!(harness.engine.data(4, 5, 1), Some(CellValue::PositiveInfinity));
}

#[test]
fn test_identity_keeps_every_jacobian_cell() {
    let mut harness = TestHarness::transport();
    harness.engine.set_value_filter(1, ValueFilter::range(-1000.0, 1000.0));
    harness.engine.aggregate(1);

    assert_eq!(harness.physical_rows(1), (5..=10).collect::<Vec<_>>());
    assert_eq!(harness.physical_columns(1), (5..=11).collect::<Vec<_>>());

    let raw: Vec<_> = harness.engine.raw().iter().filter(|&(r, c, _)| r >= 5 && c >= 5).collect();
    for &(row, col, value) in &raw {
        let logical_row = harness.engine.logical_index(row, Orientation::Vertical, 1).unwrap();
        let logical_col = harness.engine.logical_index(col, Orientation::Horizontal, 1).unwrap();
        assert_eq!(harness.engine.data(logical_row, logical_col, 1), Some(value));
    }

    let entry = harness.engine.cache_entry(1).unwrap();
    assert_eq!(entry.stats.source_cells, 19);
    assert_eq!(entry.stats.result_cells, raw.len());
}

// ============================================================================
// STATISTICS (column pass)
// ============================================================================

#[test]
fn test_count_writes_explicit_zeros() {
    let mut harness = TestHarness::transport();
    harness.group(1, AggregationType::Count, false, &markets_collapsed());
    let dense = harness.dense(1);

    assert_eq!(harness.physical_columns(1), vec![5, 8, 11]);
    let n = |v: f64| Some(CellValue::Number(v));
    assert_eq!(dense[0], vec![n(3.0), n(0.0), None]);
    assert_eq!(dense[1], vec![n(0.0), n(3.0), None]);
    assert_eq!(dense[2], vec![n(1.0), n(1.0), None]);
    assert_eq!(dense[5], vec![n(3.0), n(3.0), n(-1.0)]);
}

#[test]
fn test_count_matches_populated_members() {
    let mut harness = TestHarness::transport();
    harness.group(1, AggregationType::Count, false, &markets_collapsed());
    harness.engine.aggregate(1);

    let groups: [&[usize]; 2] = [&[5, 6, 7], &[8, 9, 10]];
    let raw = harness.engine.raw().clone();
    for (logical_row, physical_row) in harness.physical_rows(1).into_iter().enumerate() {
        for (logical_col, members) in groups.iter().enumerate() {
            let populated = members.iter().filter(|&&c| raw.get(physical_row, c).is_some()).count();
            assert_eq!(harness.number(logical_row, logical_col, 1), populated as f64);
        }
    }
}

#[test]
fn test_sum_and_mean_of_costs() {
    let costs = TransportFixture::COSTS;

    let mut harness = TestHarness::transport();
    harness.group(1, AggregationType::Sum, false, &markets_collapsed());
    harness.engine.aggregate(1);
    assert!(approx_eq(harness.number(5, 0, 1), costs[0] + costs[1] + costs[2]));
    assert!(approx_eq(harness.number(5, 1, 1), costs[3] + costs[4] + costs[5]));
    // No populated member: the target cell stays absent.
    assert_eq!(harness.engine.data(0, 1, 1), None);

    harness.group(1, AggregationType::Mean, false, &markets_collapsed());
    harness.engine.aggregate(1);
    assert!(approx_eq(harness.number(5, 0, 1), 0.18));
    assert!(approx_eq(harness.number(5, 1, 1), 0.171));
}

#[test]
fn test_order_statistics() {
    let mut harness = TestHarness::transport();

    let cases = [
        (AggregationType::Median, 0.162, 0.162),
        (AggregationType::Min, 0.153, 0.126),
        (AggregationType::Max, 0.225, 0.225),
    ];
    for (statistic, seattle, san_diego) in cases {
        harness.group(1, statistic, false, &markets_collapsed());
        harness.engine.aggregate(1);
        assert!(approx_eq(harness.number(5, 0, 1), seattle), "{:?}", statistic);
        assert!(approx_eq(harness.number(5, 1, 1), san_diego), "{:?}", statistic);
    }
}

// ============================================================================
// ROW PASS AND BOTH PASSES
// ============================================================================

#[test]
fn test_row_sum_matches_example() {
    let mut harness = TestHarness::small();
    let all_rows = vec![GroupSelection::new(Orientation::Vertical, 0, vec![0])];

    harness.group(1, AggregationType::Sum, false, &all_rows);
    let dense = harness.dense(1);
    assert_eq!(dense, vec![vec![Some(CellValue::Number(7.0)), Some(CellValue::Number(-3.0))]]);

    harness.group(1, AggregationType::Sum, true, &all_rows);
    let dense = harness.dense(1);
    assert_eq!(dense, vec![vec![Some(CellValue::Number(7.0)), Some(CellValue::Number(3.0))]]);
}

#[test]
fn test_row_pass_unites_demand_rows() {
    let mut harness = TestHarness::transport();
    harness.group(1, AggregationType::Sum, false, &demand_collapsed());
    harness.engine.aggregate(1);

    assert_eq!(harness.physical_rows(1), vec![5, 6, 7, 10]);
    for col in 0..6 {
        assert_eq!(harness.number(2, col, 1), 1.0);
    }
    assert_eq!(harness.engine.logical_index(8, Orientation::Vertical, 1), None);

    let entry = harness.engine.cache_entry(1).unwrap();
    assert_eq!(entry.united_sections(2, Orientation::Vertical), vec![7, 8, 9]);
    assert_eq!(entry.united_sections(0, Orientation::Vertical), vec![5]);
}

#[test]
fn test_both_passes() {
    let mut harness = TestHarness::transport();
    let mut selections = demand_collapsed();
    selections.extend(markets_collapsed());
    harness.group(1, AggregationType::Sum, false, &selections);
    let dense = harness.dense(1);

    assert_eq!(harness.physical_rows(1), vec![5, 6, 7, 10]);
    assert_eq!(harness.physical_columns(1), vec![5, 8, 11]);
    let n = |v: f64| Some(CellValue::Number(v));
    assert_eq!(dense[0], vec![n(3.0), None, None]);
    assert_eq!(dense[2], vec![n(3.0), n(3.0), None]);
    assert!(approx_eq(harness.number(3, 0, 1), 0.54));
    assert_eq!(dense[3][2], n(-1.0));
}

#[test]
fn test_logical_indices_are_contiguous() {
    let mut harness = TestHarness::transport();
    let mut selections = demand_collapsed();
    selections.extend(markets_collapsed());
    harness.group(1, AggregationType::Max, false, &selections);
    harness.engine.aggregate(1);

    for orientation in Orientation::BOTH {
        let physical = match orientation {
            Orientation::Vertical => harness.physical_rows(1),
            Orientation::Horizontal => harness.physical_columns(1),
        };
        assert!(physical.windows(2).all(|w| w[0] < w[1]));
        for (logical, section) in physical.iter().enumerate() {
            assert_eq!(harness.engine.logical_index(*section, orientation, 1), Some(logical));
        }
    }

    let entry = harness.engine.cache_entry(1).unwrap();
    for (row, col, _) in entry.matrix.iter() {
        assert!(row < entry.row_count());
        assert!(col < entry.column_count());
    }
}

#[test]
fn test_attribute_views_are_not_aggregated_on_the_attribute_axis() {
    use aggregation_engine::ViewKind;

    let mut harness = TestHarness::transport();
    harness.engine.add_view(2, ViewKind::EquationAttributes);
    harness.group(2, AggregationType::Sum, false, &demand_collapsed());
    harness.engine.aggregate(2);

    assert_eq!(harness.physical_rows(2), vec![5, 6, 7, 10]);
    assert_eq!(harness.physical_columns(2), (0..5).collect::<Vec<_>>());
    // Lower of the united demand rows: 325 + 300 + 275.
    assert_eq!(harness.number(2, 1, 2), 900.0);
    assert_eq!(harness.engine.data(3, 1, 2), Some(CellValue::NegativeInfinity));
}
