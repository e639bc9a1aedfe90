use std::sync::{Mutex, MutexGuard, PoisonError};

use algomon_core::{
    AlgorithmResult, ChartResolution, OhlcPoint, Point, Resolution, SeriesDefinition, SeriesType,
    aggregate_daily, append_candles, detect_resolution, since,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Display state of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    /// Series name.
    pub name: String,
    /// How the series is drawn.
    pub series_type: SeriesType,
    /// Timestamp of the newest point taken in so far.
    pub cursor: Option<DateTime<Utc>>,
    /// Points taken in so far, in timestamp order.
    pub points: Vec<Point>,
    /// Daily candles; only filled for candle series.
    pub candles: Vec<OhlcPoint>,
}

impl SeriesView {
    fn new(series: &SeriesDefinition) -> Self {
        Self {
            name: series.name.clone(),
            series_type: series.series_type,
            cursor: None,
            points: Vec::new(),
            candles: Vec::new(),
        }
    }

    /// Take in the points of `series` newer than the cursor.
    ///
    /// Returns the number of points added.
    fn advance(&mut self, series: &SeriesDefinition) -> usize {
        let fresh = match self.cursor {
            Some(cursor) => since(series, cursor),
            None => {
                let mut all = series.clone();
                all.values.sort_by_key(|p| p.x);
                all
            }
        };
        let Some(last) = fresh.values.last() else {
            return 0;
        };
        self.cursor = Some(last.x);
        if self.series_type == SeriesType::Candle {
            append_candles(&mut self.candles, aggregate_daily(&fresh.values));
        }
        let added = fresh.values.len();
        self.points.extend(fresh.values);
        added
    }
}

/// Display state of one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    /// Chart name.
    pub name: String,
    /// Effective resolution; only ever becomes finer.
    pub resolution: ChartResolution,
    /// Series in first-seen order.
    pub series: IndexMap<String, SeriesView>,
    /// A collaborator asked for this chart to be shown.
    pub open: bool,
}

impl ChartView {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resolution: ChartResolution::default(),
            series: IndexMap::new(),
            open: false,
        }
    }

    /// Effective display resolution of the chart.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.resolution.resolution()
    }
}

/// Per-chart bookkeeping for the active session.
///
/// Updates arrive from the delivery loop while collaborators may request a
/// chart at any time; both go through one lock, so a chart opened in the
/// middle of an update sees either all or none of it.
#[derive(Debug, Default)]
pub struct ChartBook {
    inner: Mutex<IndexMap<String, ChartView>>,
}

impl ChartBook {
    /// Empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, ChartView>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold a merged result into the book.
    ///
    /// Every series advances its cursor past the points it has not seen yet;
    /// candle series also aggregate those points into daily candles. The chart
    /// resolution is re-detected over the full series.
    ///
    /// Returns the names of the charts that received new points.
    pub fn update(&self, result: &AlgorithmResult) -> Vec<String> {
        let mut charts = self.lock();
        let mut touched = Vec::new();
        for (chart_name, chart) in &result.charts {
            let view = charts
                .entry(chart_name.clone())
                .or_insert_with(|| ChartView::new(chart_name));
            let mut added = 0;
            for (series_name, series) in &chart.series {
                view.resolution.observe(detect_resolution(series));
                added += view
                    .series
                    .entry(series_name.clone())
                    .or_insert_with(|| SeriesView::new(series))
                    .advance(series);
            }
            if added > 0 {
                touched.push(chart_name.clone());
            }
        }
        touched
    }

    /// Mark `name` as shown and return its current state.
    ///
    /// A chart requested before any data for it arrived is created empty and
    /// filled by later updates.
    pub fn open_chart(&self, name: &str) -> ChartView {
        let mut charts = self.lock();
        let view = charts
            .entry(name.to_string())
            .or_insert_with(|| ChartView::new(name));
        view.open = true;
        view.clone()
    }

    /// Snapshot of one chart.
    #[must_use]
    pub fn chart(&self, name: &str) -> Option<ChartView> {
        self.lock().get(name).cloned()
    }

    /// Chart names in first-seen order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Forget all charts.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
