//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for aggregation integration tests.

#![allow(dead_code)]

use aggregation_engine::{
    Aggregation, AggregationEngine, AggregationMap, AggregationType, GroupSelection, ViewId,
    ViewKind,
};
use engine::{CellValue, HeaderLayout, ModelInstance, ModelSource, Orientation, SectionIndex};

/// Physical anchors of the transport fixture (default five-attribute header).
pub const SUPPLY: SectionIndex = 5;
pub const DEMAND: SectionIndex = 7;
pub const COST: SectionIndex = 10;
pub const X: SectionIndex = 5;
pub const Z: SectionIndex = 11;

/// Test harness owning an engine over a fixture model.
pub struct TestHarness {
    pub engine: AggregationEngine<ModelInstance>,
}

impl TestHarness {
    pub fn new(model: ModelInstance) -> Self {
        TestHarness {
            engine: AggregationEngine::new(model),
        }
    }

    /// Harness over the transport model with one Jacobian view (id 1).
    pub fn transport() -> Self {
        let mut harness = Self::new(TransportFixture::model());
        harness.engine.add_view(1, ViewKind::Jacobian);
        harness
    }

    /// Header-less 3x2 matrix {(0,0):5, (1,1):-3, (2,0):2}.
    pub fn small() -> Self {
        let mut model = ModelInstance::new(HeaderLayout::new(Vec::<String>::new()));
        model.add_equation_symbol("e", labels(&[&["1"], &["2"], &["3"]]));
        model.add_variable_symbol("v", labels(&[&["a"], &["b"]]));
        model.set_coefficient(0, 0, CellValue::Number(5.0));
        model.set_coefficient(1, 1, CellValue::Number(-3.0));
        model.set_coefficient(2, 0, CellValue::Number(2.0));
        let mut harness = Self::new(model);
        harness.engine.add_view(1, ViewKind::Jacobian);
        harness
    }

    /// Builds the grouping from selections and sets it on a view.
    pub fn group(
        &mut self,
        view: ViewId,
        statistic: AggregationType,
        use_absolute: bool,
        selections: &[GroupSelection],
    ) {
        let map = AggregationMap::build(self.engine.model(), selections, statistic);
        self.engine
            .set_aggregation(view, Aggregation::new(statistic, use_absolute, map));
    }

    /// Aggregates a view and returns its visible matrix as dense rows.
    pub fn dense(&mut self, view: ViewId) -> Vec<Vec<Option<CellValue>>> {
        self.engine.aggregate(view);
        (0..self.engine.row_count(view))
            .map(|r| {
                (0..self.engine.column_count(view))
                    .map(|c| self.engine.data(r, c, view))
                    .collect()
            })
            .collect()
    }

    pub fn physical_rows(&self, view: ViewId) -> Vec<SectionIndex> {
        self.physical(Orientation::Vertical, view)
    }

    pub fn physical_columns(&self, view: ViewId) -> Vec<SectionIndex> {
        self.physical(Orientation::Horizontal, view)
    }

    fn physical(&self, orientation: Orientation, view: ViewId) -> Vec<SectionIndex> {
        let count = match orientation {
            Orientation::Vertical => self.engine.row_count(view),
            Orientation::Horizontal => self.engine.column_count(view),
        };
        (0..count)
            .filter_map(|logical| self.engine.header_data(logical, orientation, view))
            .collect()
    }

    /// Numeric cell at logical coordinates; panics on anything else.
    pub fn number(&self, row: usize, column: usize, view: ViewId) -> f64 {
        match self.engine.data(row, column, view) {
            Some(CellValue::Number(v)) => v,
            other => panic!("expected a number at ({}, {}), got {:?}", row, column, other),
        }
    }

    pub fn model(&self) -> &ModelInstance {
        self.engine.model()
    }

    pub fn section_count(&self, orientation: Orientation) -> usize {
        self.engine.model().section_count(orientation)
    }
}

pub fn labels(items: &[&[&str]]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|tuple| tuple.iter().map(|s| s.to_string()).collect())
        .collect()
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Classic transportation model: two plants, three markets.
///
/// Rows: supply(i) 5..=6, demand(j) 7..=9, cost 10.
/// Columns: x(i, j) 5..=10 in (i, j) order, z 11.
pub struct TransportFixture;

impl TransportFixture {
    pub const PLANTS: [&'static str; 2] = ["seattle", "san-diego"];
    pub const MARKETS: [&'static str; 3] = ["new-york", "chicago", "topeka"];
    /// Per-unit shipping cost of x(i, j), in x order.
    pub const COSTS: [f64; 6] = [0.225, 0.153, 0.162, 0.225, 0.162, 0.126];
    pub const CAPACITY: [f64; 2] = [350.0, 600.0];
    pub const DEMAND: [f64; 3] = [325.0, 300.0, 275.0];

    pub fn model() -> ModelInstance {
        let mut model = ModelInstance::default();

        let plants: Vec<Vec<String>> = Self::PLANTS.iter().map(|p| vec![p.to_string()]).collect();
        let markets: Vec<Vec<String>> = Self::MARKETS.iter().map(|m| vec![m.to_string()]).collect();
        let routes: Vec<Vec<String>> = Self::PLANTS
            .iter()
            .flat_map(|p| Self::MARKETS.iter().map(move |m| vec![p.to_string(), m.to_string()]))
            .collect();

        model.add_equation_symbol("supply", plants);
        model.add_equation_symbol("demand", markets);
        model.add_equation_symbol("cost", vec![]);
        model.add_variable_symbol("x", routes);
        model.add_variable_symbol("z", vec![]);

        for (i, _) in Self::PLANTS.iter().enumerate() {
            for (j, _) in Self::MARKETS.iter().enumerate() {
                let x = i * 3 + j;
                model.set_coefficient(i, x, CellValue::Number(1.0));
                model.set_coefficient(2 + j, x, CellValue::Number(1.0));
                model.set_coefficient(5, x, CellValue::Number(Self::COSTS[x]));
            }
            model.set_row_attribute("Upper", i, CellValue::Number(Self::CAPACITY[i]));
        }
        model.set_coefficient(5, 6, CellValue::Number(-1.0));

        for (j, demand) in Self::DEMAND.iter().enumerate() {
            model.set_row_attribute("Lower", 2 + j, CellValue::Number(*demand));
        }
        model.set_row_attribute("Lower", 5, CellValue::NegativeInfinity);

        for x in 0..6 {
            model.set_column_attribute("Upper", x, CellValue::PositiveInfinity);
            model.set_column_attribute("Lower", x, CellValue::Number(0.0));
        }
        model.set_column_attribute("Level", 0, CellValue::Number(50.0));
        model.set_column_attribute("Level", 1, CellValue::Number(300.0));
        model.set_column_attribute("Marginal", 2, CellValue::Epsilon);
        model.set_column_attribute("Level", 3, CellValue::Number(275.0));
        model.set_column_attribute("Level", 5, CellValue::Number(275.0));
        model.set_column_attribute("Level", 6, CellValue::Number(153.675));

        model
    }
}
