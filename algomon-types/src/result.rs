//! The accumulated result model: charts, orders and statistics of one
//! algorithm run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a result stems from a backtest or a live deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResultType {
    /// Historical simulation; deliveries carry a progress.
    #[default]
    Backtest,
    /// Live trading; deliveries carry no progress.
    Live,
}

/// A single chart value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Timestamp of the value.
    pub x: DateTime<Utc>,
    /// The value.
    pub y: Decimal,
}

impl Point {
    /// Construct a point.
    #[must_use]
    pub const fn new(x: DateTime<Utc>, y: Decimal) -> Self {
        Self { x, y }
    }
}

/// Open/high/low/close aggregate of the points of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OhlcPoint {
    /// Start of the bucket.
    pub x: DateTime<Utc>,
    /// First value in the bucket.
    pub open: Decimal,
    /// Maximum value in the bucket.
    pub high: Decimal,
    /// Minimum value in the bucket.
    pub low: Decimal,
    /// Last value in the bucket.
    pub close: Decimal,
}

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SeriesType {
    /// Connected line.
    #[default]
    Line,
    /// Unconnected markers.
    Scatter,
    /// Daily candles aggregated from the raw points.
    Candle,
    /// Bars.
    Bar,
}

/// Marker shape of scatter series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ScatterMarkerSymbol {
    #[default]
    None,
    Circle,
    Square,
    Diamond,
    Triangle,
    TriangleDown,
}

/// A named series of points plus its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeriesDefinition {
    /// Series name, unique within its chart.
    pub name: String,
    /// Points in non-decreasing timestamp order.
    pub values: Vec<Point>,
    /// Drawing style.
    pub series_type: SeriesType,
    /// Optional color, e.g. `#FF0000`.
    pub color: Option<String>,
    /// Unit label of the values, e.g. `$`.
    pub unit: String,
    /// Marker shape for scatter series.
    pub scatter_marker_symbol: ScatterMarkerSymbol,
    /// Sub-chart index the series is drawn in.
    pub index: i32,
}

impl SeriesDefinition {
    /// An empty series of the given type.
    pub fn new(name: impl Into<String>, series_type: SeriesType) -> Self {
        Self {
            name: name.into(),
            series_type,
            ..Self::default()
        }
    }

    /// Copy of this series' metadata with the given values.
    #[must_use]
    pub fn with_values(&self, values: Vec<Point>) -> Self {
        Self {
            name: self.name.clone(),
            values,
            series_type: self.series_type,
            color: self.color.clone(),
            unit: self.unit.clone(),
            scatter_marker_symbol: self.scatter_marker_symbol,
            index: self.index,
        }
    }

    /// Timestamp of the last point, if any.
    #[must_use]
    pub fn last_x(&self) -> Option<DateTime<Utc>> {
        self.values.last().map(|p| p.x)
    }
}

/// A named group of series.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChartDefinition {
    /// Chart name, unique within a result.
    pub name: String,
    /// Series keyed by name, in arrival order.
    pub series: IndexMap<String, SeriesDefinition>,
}

impl ChartDefinition {
    /// An empty chart.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: IndexMap::new(),
        }
    }

    /// Return the named series, inserting an empty one of `series_type` if absent.
    pub fn series_or_insert(
        &mut self,
        name: &str,
        series_type: SeriesType,
    ) -> &mut SeriesDefinition {
        self.series
            .entry(name.to_string())
            .or_insert_with(|| SeriesDefinition::new(name, series_type))
    }
}

/// An order placed by the algorithm.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    /// Order id; the key in [`AlgorithmResult::orders`].
    pub id: i64,
    /// Ticker of the traded security.
    pub symbol: Option<String>,
    /// Numeric order type code.
    pub order_type: Option<i64>,
    /// Numeric status code.
    pub status: Option<i64>,
    /// Signed quantity.
    pub quantity: Decimal,
    /// Limit/fill price.
    pub price: Decimal,
    /// Creation time.
    pub time: Option<DateTime<Utc>>,
    /// Free-form tag.
    pub tag: Option<String>,
    /// Remaining fields of the source document, kept verbatim.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Rolling performance statistics for one window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceWindow {
    /// Trade statistics as reported by the engine.
    pub trade_statistics: IndexMap<String, serde_json::Value>,
    /// Portfolio statistics as reported by the engine.
    pub portfolio_statistics: IndexMap<String, serde_json::Value>,
    /// Closed trades of the window.
    pub closed_trades: Vec<serde_json::Value>,
}

/// Accumulated snapshot of an algorithm run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Charts keyed by name, in arrival order.
    pub charts: IndexMap<String, ChartDefinition>,
    /// Orders keyed by id.
    pub orders: BTreeMap<i64, Order>,
    /// Realized profit and loss keyed by time.
    pub profit_loss: BTreeMap<DateTime<Utc>, Decimal>,
    /// Summary statistics.
    pub statistics: IndexMap<String, String>,
    /// Statistics updated while the algorithm runs.
    pub runtime_statistics: IndexMap<String, String>,
    /// Rolling performance windows keyed by window name.
    pub rolling_window: IndexMap<String, PerformanceWindow>,
    /// Backtest or live.
    pub result_type: ResultType,
}

impl AlgorithmResult {
    /// An empty result of the given type.
    #[must_use]
    pub fn new(result_type: ResultType) -> Self {
        Self {
            result_type,
            ..Self::default()
        }
    }

    /// Return the named chart, inserting an empty one if absent.
    pub fn chart_or_insert(&mut self, name: &str) -> &mut ChartDefinition {
        self.charts
            .entry(name.to_string())
            .or_insert_with(|| ChartDefinition::new(name))
    }

    /// Look up a series by chart and series name.
    #[must_use]
    pub fn series(&self, chart: &str, series: &str) -> Option<&SeriesDefinition> {
        self.charts.get(chart).and_then(|c| c.series.get(series))
    }

    /// `true` when the result holds no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
            && self.orders.is_empty()
            && self.profit_loss.is_empty()
            && self.statistics.is_empty()
            && self.runtime_statistics.is_empty()
            && self.rolling_window.is_empty()
    }
}

/// One delivery of a transport: the result plus run metadata.
///
/// Built fresh for every delivery and never stored by the transport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultContext {
    /// Display name of the session (file name, endpoint or backtest name).
    pub name: String,
    /// Project name, when known.
    pub project: Option<String>,
    /// The result.
    pub result: AlgorithmResult,
    /// Progress in `0..=1`; `None` for live results.
    pub progress: Option<Decimal>,
}

impl ResultContext {
    /// `true` when the run reported a progress of exactly one.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.progress == Some(Decimal::ONE)
    }
}
