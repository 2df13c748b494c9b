use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use dev_utils::{build_example_scenario, get_example_date};

fn profile_search_benchmark(c: &mut Criterion) {
    let scenario = build_example_scenario();
    let date = get_example_date();
    let always_possible = |_: conscan::TripId, _: chrono::NaiveDate| true;

    c.bench_function("ProfileSearch", |b| {
        b.iter(|| {
            let mut search = conscan::ProfileSearch::new(
                &scenario.connections,
                Some(&scenario.transfers),
                date,
                scenario.num_stops,
                scenario.num_trips,
                &always_possible,
            );
            search.set_source_stop(black_box(0), 27_000);
            search.set_target_stop(black_box(scenario.num_stops as u32 - 1), 0);
            search.run(|| false).unwrap()
        })
    });
}

criterion_group!(benches, profile_search_benchmark);
criterion_main!(benches);
