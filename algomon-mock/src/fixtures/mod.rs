//! Fixed results and documents.
//!
//! Timestamps are Unix seconds; [`T0`] is 2020-01-01T00:00:00Z. Values are
//! integers so expectations can be written as plain numbers.

mod packets;

pub use packets::{backtest_packet, debug_packet, live_packet, log_packet, unknown_packet};

use algomon_core::{
    AlgorithmResult, BacktestSnapshot, ChartDefinition, Point, ResultType, SeriesDefinition,
    SeriesType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};

/// 2020-01-01T00:00:00Z.
pub const T0: i64 = 1_577_836_800;
/// One day in seconds.
pub const DAY: i64 = 86_400;

/// Chart and series names used by the fixtures.
pub const EQUITY_CHART: &str = "Strategy Equity";
/// See [`EQUITY_CHART`].
pub const EQUITY_SERIES: &str = "Equity";
/// See [`EQUITY_CHART`].
pub const BENCHMARK_CHART: &str = "Benchmark";
/// See [`EQUITY_CHART`].
pub const BENCHMARK_SERIES: &str = "Benchmark";

/// UTC time `secs` after the epoch.
///
/// # Panics
/// Panics for timestamps outside chrono's range.
#[must_use]
pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp in range")
}

/// Point at `secs` with an integer value.
#[must_use]
pub fn point(secs: i64, y: i64) -> Point {
    Point::new(ts(secs), Decimal::from(y))
}

/// Series of `series_type` holding `points` in the given order.
#[must_use]
pub fn series(name: &str, series_type: SeriesType, points: &[(i64, i64)]) -> SeriesDefinition {
    let mut s = SeriesDefinition::new(name, series_type);
    s.values = points.iter().map(|&(x, y)| point(x, y)).collect();
    s
}

/// Backtest result with a single line series.
#[must_use]
pub fn single_series_result(chart: &str, name: &str, points: &[(i64, i64)]) -> AlgorithmResult {
    let mut r = AlgorithmResult::new(ResultType::Backtest);
    let mut c = ChartDefinition::new(chart);
    c.series
        .insert(name.to_string(), series(name, SeriesType::Line, points));
    r.charts.insert(chart.to_string(), c);
    r
}

/// Backtest result with an equity curve and a raw benchmark series.
#[must_use]
pub fn equity_benchmark_result(
    equity: &[(i64, i64)],
    benchmark: &[(i64, i64)],
) -> AlgorithmResult {
    let mut r = single_series_result(EQUITY_CHART, EQUITY_SERIES, equity);
    let mut c = ChartDefinition::new(BENCHMARK_CHART);
    c.series.insert(
        BENCHMARK_SERIES.to_string(),
        series(BENCHMARK_SERIES, SeriesType::Line, benchmark),
    );
    r.charts.insert(BENCHMARK_CHART.to_string(), c);
    r
}

/// Raw result document with one chart and one line series.
#[must_use]
pub fn result_document(chart: &str, name: &str, points: &[(i64, i64)]) -> Value {
    let values: Vec<Value> = points.iter().map(|&(x, y)| json!({ "x": x, "y": y })).collect();
    json!({
        "Charts": {
            chart: {
                "Name": chart,
                "Series": {
                    name: {
                        "Name": name,
                        "Unit": "$",
                        "Index": 0,
                        "SeriesType": 0,
                        "Values": values,
                    }
                }
            }
        },
        "Orders": {},
        "ProfitLoss": {},
        "Statistics": { "Net Profit": "1.5%", "Sharpe Ratio": "-0.2", "Total Fees": "$3.00" },
        "RuntimeStatistics": { "Equity": "$100,150.00" },
    })
}

/// Equity points of [`three_point_document`].
pub const THREE_POINTS: [(i64, i64); 3] = [
    (T0, 100_000),
    (T0 + DAY, 100_100),
    (T0 + 2 * DAY, 100_150),
];

/// Document with one chart, one series and three ascending daily points.
#[must_use]
pub fn three_point_document() -> String {
    result_document(EQUITY_CHART, EQUITY_SERIES, &THREE_POINTS).to_string()
}

/// API snapshot carrying a single-series result.
#[must_use]
pub fn snapshot(points: &[(i64, i64)], progress: Decimal, completed: bool) -> BacktestSnapshot {
    BacktestSnapshot {
        name: "Smooth Blue Owl".to_string(),
        project: Some("Fixture Project".to_string()),
        progress,
        completed,
        result: Some(single_series_result(EQUITY_CHART, EQUITY_SERIES, points)),
    }
}
