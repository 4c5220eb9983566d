//! FILENAME: aggregation-engine/benches/aggregation.rs
//! Pipeline throughput on a synthetic banded model.

use aggregation_engine::{
    aggregate_view, Aggregation, AggregationMap, AggregationType, GroupSelection, ViewConfig,
    ViewKind,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engine::{load_raw_matrix, CellValue, ModelInstance, Orientation};

/// `size` x 10 equations and variables, each equation touching a band of
/// eight variables.
fn banded_model(size: usize) -> ModelInstance {
    let tuples = |n: usize| -> Vec<Vec<String>> {
        (0..n)
            .flat_map(|i| (0..10).map(move |t| vec![format!("i{}", i), format!("t{}", t)]))
            .collect()
    };

    let mut model = ModelInstance::default();
    model.add_equation_symbol("balance", tuples(size));
    model.add_variable_symbol("flow", tuples(size));

    let entries = size * 10;
    for eq in 0..entries {
        for offset in 0..8 {
            let var = (eq + offset * 7) % entries;
            let value = ((eq * 31 + offset * 17) % 97) as f64 - 48.0;
            model.set_coefficient(eq, var, CellValue::Number(value));
        }
    }
    model
}

fn view_config(model: &ModelInstance, statistic: AggregationType) -> ViewConfig {
    let selections = [
        GroupSelection::new(Orientation::Vertical, 5, vec![1]),
        GroupSelection::new(Orientation::Horizontal, 5, vec![0]),
    ];
    let map = AggregationMap::build(model, &selections, statistic);
    let mut config = ViewConfig::new(1, ViewKind::Jacobian);
    config.aggregation = Aggregation::new(statistic, false, map);
    config
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_view");
    for size in [10_usize, 100, 500] {
        let model = banded_model(size);
        let raw = load_raw_matrix(&model);
        group.throughput(Throughput::Elements(raw.nnz() as u64));

        for statistic in [AggregationType::Sum, AggregationType::Median] {
            let config = view_config(&model, statistic);
            let id = BenchmarkId::new(format!("{:?}", statistic), size);
            group.bench_with_input(id, &config, |b, config| {
                b.iter(|| {
                    let entry = aggregate_view(black_box(&raw), &model, black_box(config));
                    black_box(entry);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(aggregation, benchmark_pipeline);
criterion_main!(aggregation);
