#![allow(dead_code)]

use proptest::prelude::*;

/// Optional runtime estimates for a set of siblings
pub fn run_times_strategy() -> impl Strategy<Value = Vec<Option<u64>>> {
    prop::collection::vec(prop::option::of(0u64..500), 1..6)
}

/// Progress reports as (child index, percent complete). Percent values can
/// go backwards; listeners must ignore regressions.
pub fn progress_reports_strategy(children: usize) -> impl Strategy<Value = Vec<(usize, f64)>> {
    prop::collection::vec((0..children, 0.0f64..=100.0), 0..40)
}

/// Sibling runtime estimates together with progress reports for them
pub fn children_with_reports_strategy(
) -> impl Strategy<Value = (Vec<Option<u64>>, Vec<(usize, f64)>)> {
    run_times_strategy().prop_flat_map(|run_times| {
        let children = run_times.len();
        (Just(run_times), progress_reports_strategy(children))
    })
}
