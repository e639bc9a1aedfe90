use std::collections::HashSet;

use algomon_types::{AlgorithmResult, Point, SeriesDefinition};
use chrono::{DateTime, Utc};

/// Merge a partial result into an accumulated one.
///
/// - A chart missing from `target` is added whole, with all of its series.
/// - For a chart present in both, a series missing from `target` is added
///   whole; otherwise the source points are appended with [`merge_series`].
/// - Orders, statistics, runtime statistics, profit/loss and rolling windows
///   are overwritten by key: the source value wins, new keys are added.
///
/// Merging the same source twice is a no-op the second time.
pub fn merge_result(target: &mut AlgorithmResult, source: &AlgorithmResult) {
    if target.is_empty() {
        target.result_type = source.result_type;
    }

    for (name, chart) in &source.charts {
        let Some(existing) = target.charts.get_mut(name) else {
            target.charts.insert(name.clone(), chart.clone());
            continue;
        };
        for (series_name, series) in &chart.series {
            match existing.series.get_mut(series_name) {
                Some(t) => merge_series(t, series),
                None => {
                    existing.series.insert(series_name.clone(), series.clone());
                }
            }
        }
    }

    for (id, order) in &source.orders {
        target.orders.insert(*id, order.clone());
    }
    for (ts, pl) in &source.profit_loss {
        target.profit_loss.insert(*ts, *pl);
    }
    for (k, v) in &source.statistics {
        target.statistics.insert(k.clone(), v.clone());
    }
    for (k, v) in &source.runtime_statistics {
        target.runtime_statistics.insert(k.clone(), v.clone());
    }
    for (k, v) in &source.rolling_window {
        target.rolling_window.insert(k.clone(), v.clone());
    }
}

/// Append every point of `source` not already present in `target`.
///
/// Existing points are never removed and keep their relative order; new
/// points keep their arrival order. Value equality covers both timestamp and
/// value, so a changed value at an existing timestamp is appended as a new
/// point. If an appended point is older than the current tail, the list is
/// stably re-sorted by timestamp so it stays non-decreasing.
pub fn merge_series(target: &mut SeriesDefinition, source: &SeriesDefinition) {
    if source.values.is_empty() {
        return;
    }

    let mut seen: HashSet<Point> = target.values.iter().copied().collect();
    let mut tail = target.last_x();
    let mut out_of_order = false;

    for p in &source.values {
        if !seen.insert(*p) {
            continue;
        }
        if tail.is_some_and(|t| p.x < t) {
            out_of_order = true;
        } else {
            tail = Some(p.x);
        }
        target.values.push(*p);
    }

    if out_of_order {
        target.values.sort_by_key(|p| p.x);
    }
}

/// Points of `series` strictly newer than `cutoff`, in timestamp order.
///
/// Returns a new series with the same metadata. The input order is not
/// trusted: values are sorted by timestamp before filtering.
#[must_use]
pub fn since(series: &SeriesDefinition, cutoff: DateTime<Utc>) -> SeriesDefinition {
    let mut values: Vec<Point> = series.values.iter().filter(|p| p.x > cutoff).copied().collect();
    values.sort_by_key(|p| p.x);
    series.with_values(values)
}
