use std::sync::Arc;

use algomon_types::{AlgorithmResult, Point, SeriesType};
use rust_decimal::Decimal;

use crate::timeseries::merge::since;

/// A derived-series computation run on the merged result after every update.
///
/// Implementations add or extend series in place. They must be incremental:
/// a second run over an unchanged result must not add points.
pub trait ResultMutator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Update derived series of `result`.
    fn mutate(&self, result: &mut AlgorithmResult);
}

/// Ordered list of mutators.
#[derive(Clone, Default)]
pub struct MutatorPipeline {
    mutators: Vec<Arc<dyn ResultMutator>>,
}

impl MutatorPipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped pipeline: the relative benchmark.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut p = Self::new();
        p.push(Arc::new(BenchmarkMutator));
        p
    }

    /// Append a mutator; it runs after the ones already registered.
    pub fn push(&mut self, mutator: Arc<dyn ResultMutator>) {
        self.mutators.push(mutator);
    }

    /// Number of registered mutators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    /// `true` if no mutator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    /// Run every mutator over `result`, in registration order.
    pub fn run(&self, result: &mut AlgorithmResult) {
        for m in &self.mutators {
            #[cfg(feature = "tracing")]
            tracing::trace!(target = "algomon::mutator", mutator = m.name(), "running mutator");
            m.mutate(result);
        }
    }
}

impl std::fmt::Debug for MutatorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.mutators.iter().map(|m| m.name()))
            .finish()
    }
}

/// Chart holding the raw benchmark series.
pub const BENCHMARK_CHART: &str = "Benchmark";
/// Raw benchmark series name.
pub const BENCHMARK_SERIES: &str = "Benchmark";
/// Chart holding the equity curve; the relative series is added here.
pub const EQUITY_CHART: &str = "Strategy Equity";
/// Equity series name.
pub const EQUITY_SERIES: &str = "Equity";
/// Name of the derived series.
pub const RELATIVE_BENCHMARK_SERIES: &str = "Relative Benchmark";

/// Rescales the raw benchmark to the strategy's starting equity.
///
/// The first relative point is pinned to the equity's opening value; every
/// following point scales the previous relative value by the step ratio of the
/// raw benchmark. A step where either raw value is zero carries the previous
/// relative value forward.
///
/// On later runs computation resumes after the last relative point, seeded
/// with that point's value and the raw benchmark value at its timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct BenchmarkMutator;

impl ResultMutator for BenchmarkMutator {
    fn name(&self) -> &'static str {
        "relative-benchmark"
    }

    fn mutate(&self, result: &mut AlgorithmResult) {
        let Some(benchmark) = result.series(BENCHMARK_CHART, BENCHMARK_SERIES) else {
            return;
        };
        let Some(equity_open) = result
            .series(EQUITY_CHART, EQUITY_SERIES)
            .and_then(|s| s.values.first())
            .map(|p| p.y)
        else {
            return;
        };
        let last_relative = result
            .series(EQUITY_CHART, RELATIVE_BENCHMARK_SERIES)
            .and_then(|s| s.values.last())
            .copied();

        let new_points = match last_relative {
            None => {
                let sorted = since(benchmark, chrono::DateTime::<chrono::Utc>::MIN_UTC).values;
                let Some(first) = sorted.first() else {
                    return;
                };
                let mut out = vec![Point::new(first.x, equity_open)];
                extend_relative(&mut out, equity_open, first.y, &sorted[1..]);
                out
            }
            Some(last) => {
                let mut sorted = benchmark.values.clone();
                sorted.sort_by_key(|p| p.x);
                let split = sorted.partition_point(|p| p.x <= last.x);
                let Some(seed) = split.checked_sub(1).map(|i| sorted[i].y) else {
                    return;
                };
                let mut out = Vec::with_capacity(sorted.len() - split);
                extend_relative(&mut out, last.y, seed, &sorted[split..]);
                out
            }
        };

        if new_points.is_empty() {
            return;
        }
        result
            .chart_or_insert(EQUITY_CHART)
            .series_or_insert(RELATIVE_BENCHMARK_SERIES, SeriesType::Line)
            .values
            .extend(new_points);
    }
}

fn extend_relative(out: &mut Vec<Point>, mut prev_rel: Decimal, mut prev_raw: Decimal, rest: &[Point]) {
    for p in rest {
        let rel = if prev_raw.is_zero() || p.y.is_zero() {
            prev_rel
        } else {
            prev_rel
                .checked_mul(p.y)
                .and_then(|v| v.checked_div(prev_raw))
                .unwrap_or(prev_rel)
        };
        out.push(Point::new(p.x, rel));
        prev_rel = rel;
        prev_raw = p.y;
    }
}
