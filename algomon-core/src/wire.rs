//! JSON shapes exchanged with the trading engine.
//!
//! Result documents use PascalCase members (`Charts`, `Orders`, `ProfitLoss`,
//! ...). Chart points carry `x` as unix seconds and are accepted either as
//! `{"x": .., "y": ..}` objects or as `[x, y]` arrays. Stream packets are tagged
//! by `eType` (or `type`) and carry their payload in Hungarian-notation members
//! (`oResults`, `dProgress`, `sMessage`).

use std::fmt;

use algomon_types::{
    AlgorithmResult, ChartDefinition, MonitorError, Order, PerformanceWindow, Point, ResultType,
    ScatterMarkerSymbol, SeriesDefinition, SeriesType,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Decimal written as a JSON number and read from a number or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireNumber(pub Decimal);

impl Serialize for WireNumber {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.0.to_f64() {
            Some(f) => s.serialize_f64(f),
            None => s.serialize_str(&self.0.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for WireNumber {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(d).map(Self)
    }
}

fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// Integer code or name of an enum value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

/// A chart point in any of the accepted encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WirePoint {
    Object { x: i64, y: Option<WireNumber> },
    Pair(i64, Option<WireNumber>),
    // x, open, high, low, close; only the close is kept
    Candle(i64, IgnoredAny, IgnoredAny, IgnoredAny, Option<WireNumber>),
}

impl WirePoint {
    fn into_point(self) -> Option<Point> {
        let (x, y) = match self {
            Self::Object { x, y } | Self::Pair(x, y) => (x, y),
            Self::Candle(x, _, _, _, close) => (x, close),
        };
        Some(Point::new(DateTime::from_timestamp(x, 0)?, y?.0))
    }
}

#[derive(Debug, Clone, Serialize)]
struct OutPoint {
    x: i64,
    y: WireNumber,
}

/// A series as found in a result document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WireSeries {
    #[serde(deserialize_with = "null_default")]
    name: String,
    #[serde(deserialize_with = "null_default")]
    unit: String,
    #[serde(deserialize_with = "null_default")]
    index: i32,
    series_type: Option<CodeOrName>,
    color: Option<Value>,
    scatter_marker_symbol: Option<CodeOrName>,
    #[serde(deserialize_with = "null_default")]
    values: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WireChart {
    #[serde(deserialize_with = "null_default")]
    name: String,
    #[serde(deserialize_with = "null_default")]
    series: IndexMap<String, WireSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WirePerformance {
    #[serde(deserialize_with = "null_default")]
    trade_statistics: IndexMap<String, Value>,
    #[serde(deserialize_with = "null_default")]
    portfolio_statistics: IndexMap<String, Value>,
    #[serde(deserialize_with = "null_default")]
    closed_trades: Vec<Value>,
}

/// A result document as produced by the engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WireResult {
    #[serde(deserialize_with = "null_default")]
    charts: IndexMap<String, WireChart>,
    #[serde(deserialize_with = "null_default")]
    orders: IndexMap<String, Value>,
    #[serde(deserialize_with = "null_default")]
    profit_loss: IndexMap<String, WireNumber>,
    #[serde(deserialize_with = "null_default")]
    statistics: IndexMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    runtime_statistics: IndexMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    rolling_window: IndexMap<String, WirePerformance>,
}

fn series_type_from(v: Option<CodeOrName>) -> SeriesType {
    match v {
        Some(CodeOrName::Code(1)) => SeriesType::Scatter,
        Some(CodeOrName::Code(2)) => SeriesType::Candle,
        Some(CodeOrName::Code(3)) => SeriesType::Bar,
        Some(CodeOrName::Name(n)) => match n.to_ascii_lowercase().as_str() {
            "scatter" => SeriesType::Scatter,
            "candle" => SeriesType::Candle,
            "bar" => SeriesType::Bar,
            _ => SeriesType::Line,
        },
        _ => SeriesType::Line,
    }
}

const fn series_type_code(t: SeriesType) -> i64 {
    match t {
        SeriesType::Line => 0,
        SeriesType::Scatter => 1,
        SeriesType::Candle => 2,
        SeriesType::Bar => 3,
    }
}

fn marker_from(v: Option<CodeOrName>) -> ScatterMarkerSymbol {
    match v {
        Some(CodeOrName::Code(1)) => ScatterMarkerSymbol::Circle,
        Some(CodeOrName::Code(2)) => ScatterMarkerSymbol::Square,
        Some(CodeOrName::Code(3)) => ScatterMarkerSymbol::Diamond,
        Some(CodeOrName::Code(4)) => ScatterMarkerSymbol::Triangle,
        Some(CodeOrName::Code(5)) => ScatterMarkerSymbol::TriangleDown,
        Some(CodeOrName::Name(n)) => match n.to_ascii_lowercase().replace('-', "").as_str() {
            "circle" => ScatterMarkerSymbol::Circle,
            "square" => ScatterMarkerSymbol::Square,
            "diamond" => ScatterMarkerSymbol::Diamond,
            "triangle" => ScatterMarkerSymbol::Triangle,
            "triangledown" => ScatterMarkerSymbol::TriangleDown,
            _ => ScatterMarkerSymbol::None,
        },
        _ => ScatterMarkerSymbol::None,
    }
}

const fn marker_name(m: ScatterMarkerSymbol) -> &'static str {
    match m {
        ScatterMarkerSymbol::None => "none",
        ScatterMarkerSymbol::Circle => "circle",
        ScatterMarkerSymbol::Square => "square",
        ScatterMarkerSymbol::Diamond => "diamond",
        ScatterMarkerSymbol::Triangle => "triangle",
        ScatterMarkerSymbol::TriangleDown => "triangle-down",
    }
}

fn color_from(v: Option<Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Parse a profit/loss key. Offsets are honoured; naive times are UTC.
fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%m/%d/%Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|n| n.and_utc())
}

fn take_str(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn take_decimal(obj: &mut Map<String, Value>, key: &str) -> Decimal {
    obj.remove(key)
        .and_then(|v| serde_json::from_value::<WireNumber>(v).ok())
        .map_or(Decimal::ZERO, |n| n.0)
}

fn take_code(obj: &mut Map<String, Value>, key: &str) -> Option<i64> {
    obj.remove(key).and_then(|v| v.as_i64())
}

fn order_from(key: &str, value: Value) -> Option<Order> {
    let Value::Object(mut obj) = value else {
        return None;
    };
    let id = take_code(&mut obj, "Id").or_else(|| key.parse().ok())?;
    let symbol = match obj.remove("Symbol") {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(mut sym)) => take_str(&mut sym, "Value").or_else(|| take_str(&mut sym, "value")),
        _ => None,
    };
    let time = take_str(&mut obj, "Time").and_then(|t| parse_time(&t));
    Some(Order {
        id,
        symbol,
        order_type: take_code(&mut obj, "Type"),
        status: take_code(&mut obj, "Status"),
        quantity: take_decimal(&mut obj, "Quantity"),
        price: take_decimal(&mut obj, "Price"),
        time,
        tag: take_str(&mut obj, "Tag"),
        extra: obj,
    })
}

fn order_to_value(order: &Order) -> Value {
    let mut obj = order.extra.clone();
    obj.insert("Id".into(), Value::from(order.id));
    if let Some(sym) = &order.symbol {
        obj.insert("Symbol".into(), serde_json::json!({ "Value": sym }));
    }
    if let Some(t) = order.order_type {
        obj.insert("Type".into(), Value::from(t));
    }
    if let Some(s) = order.status {
        obj.insert("Status".into(), Value::from(s));
    }
    obj.insert("Quantity".into(), number_value(order.quantity));
    obj.insert("Price".into(), number_value(order.price));
    if let Some(t) = order.time {
        obj.insert("Time".into(), Value::String(t.to_rfc3339()));
    }
    if let Some(tag) = &order.tag {
        obj.insert("Tag".into(), Value::String(tag.clone()));
    }
    Value::Object(obj)
}

fn number_value(d: Decimal) -> Value {
    serde_json::to_value(WireNumber(d)).unwrap_or(Value::Null)
}

impl WireSeries {
    fn into_series(self, key: &str) -> SeriesDefinition {
        let values = self
            .values
            .into_iter()
            .filter_map(|v| serde_json::from_value::<WirePoint>(v).ok())
            .filter_map(WirePoint::into_point)
            .collect();
        SeriesDefinition {
            name: if self.name.is_empty() { key.to_string() } else { self.name },
            values,
            series_type: series_type_from(self.series_type),
            color: color_from(self.color),
            unit: self.unit,
            scatter_marker_symbol: marker_from(self.scatter_marker_symbol),
            index: self.index,
        }
    }
}

impl WireResult {
    /// Convert into the result model.
    ///
    /// Points or orders that cannot be decoded are skipped rather than
    /// failing the whole document.
    #[must_use]
    pub fn into_result(self, result_type: ResultType) -> AlgorithmResult {
        let mut out = AlgorithmResult::new(result_type);

        for (key, chart) in self.charts {
            let mut def = ChartDefinition::new(if chart.name.is_empty() { key.clone() } else { chart.name });
            for (series_key, series) in chart.series {
                let s = series.into_series(&series_key);
                def.series.insert(series_key, s);
            }
            out.charts.insert(key, def);
        }

        for (key, value) in self.orders {
            if let Some(o) = order_from(&key, value) {
                out.orders.insert(o.id, o);
            }
        }

        for (key, pl) in self.profit_loss {
            match parse_time(&key) {
                Some(ts) => {
                    out.profit_loss.insert(ts, pl.0);
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(target = "algomon::wire", key = %key, "skipping profit/loss entry with unparseable time");
                }
            }
        }

        out.statistics = self.statistics;
        out.runtime_statistics = self.runtime_statistics;
        out.rolling_window = self
            .rolling_window
            .into_iter()
            .map(|(k, w)| {
                (
                    k,
                    PerformanceWindow {
                        trade_statistics: w.trade_statistics,
                        portfolio_statistics: w.portfolio_statistics,
                        closed_trades: w.closed_trades,
                    },
                )
            })
            .collect();
        out
    }
}

/// Encode a result in the engine's document shape.
#[must_use]
pub fn result_to_value(result: &AlgorithmResult) -> Value {
    let charts: Map<String, Value> = result
        .charts
        .iter()
        .map(|(key, chart)| {
            let series: Map<String, Value> = chart
                .series
                .iter()
                .map(|(sk, s)| {
                    let values: Vec<OutPoint> = s
                        .values
                        .iter()
                        .map(|p| OutPoint {
                            x: p.x.timestamp(),
                            y: WireNumber(p.y),
                        })
                        .collect();
                    let v = serde_json::json!({
                        "Name": s.name,
                        "Unit": s.unit,
                        "Index": s.index,
                        "SeriesType": series_type_code(s.series_type),
                        "Color": s.color.clone().unwrap_or_default(),
                        "ScatterMarkerSymbol": marker_name(s.scatter_marker_symbol),
                        "Values": values,
                    });
                    (sk.clone(), v)
                })
                .collect();
            (
                key.clone(),
                serde_json::json!({ "Name": chart.name, "Series": series }),
            )
        })
        .collect();

    let orders: Map<String, Value> = result
        .orders
        .iter()
        .map(|(id, o)| (id.to_string(), order_to_value(o)))
        .collect();
    let profit_loss: Map<String, Value> = result
        .profit_loss
        .iter()
        .map(|(ts, pl)| (ts.to_rfc3339(), number_value(*pl)))
        .collect();
    let rolling: Map<String, Value> = result
        .rolling_window
        .iter()
        .map(|(k, w)| {
            (
                k.clone(),
                serde_json::json!({
                    "TradeStatistics": w.trade_statistics,
                    "PortfolioStatistics": w.portfolio_statistics,
                    "ClosedTrades": w.closed_trades,
                }),
            )
        })
        .collect();

    serde_json::json!({
        "Charts": charts,
        "Orders": orders,
        "ProfitLoss": profit_loss,
        "Statistics": result.statistics,
        "RuntimeStatistics": result.runtime_statistics,
        "RollingWindow": rolling,
    })
}

/// Packet kinds the monitor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Live trading result update.
    LiveResult,
    /// Backtest result update with progress.
    BacktestResult,
    /// Log line of the algorithm.
    Log,
    /// Debug line of the algorithm.
    Debug,
}

impl PacketType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "LiveResult" => Some(Self::LiveResult),
            "BacktestResult" => Some(Self::BacktestResult),
            "Log" => Some(Self::Log),
            "Debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Deserialize)]
struct PacketHeader {
    #[serde(rename = "eType", alias = "type")]
    kind: Value,
}

#[derive(Deserialize)]
struct BacktestPacket {
    #[serde(rename = "oResults", default, deserialize_with = "null_default")]
    results: WireResult,
    #[serde(rename = "dProgress", default)]
    progress: Option<WireNumber>,
    #[serde(rename = "sName", default)]
    name: Option<String>,
    #[serde(rename = "sProjectName", default)]
    project: Option<String>,
}

#[derive(Deserialize)]
struct LivePacket {
    #[serde(rename = "oResults", default, deserialize_with = "null_default")]
    results: WireResult,
}

#[derive(Deserialize)]
struct MessagePacket {
    #[serde(rename = "sMessage", alias = "message", default)]
    message: String,
}

/// A decoded stream packet.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPacket {
    /// Backtest update.
    BacktestResult {
        /// Partial result carried by the packet.
        result: AlgorithmResult,
        /// Backtest progress in `0..=1`.
        progress: Decimal,
        /// Backtest name, when sent.
        name: Option<String>,
        /// Project name, when sent.
        project: Option<String>,
    },
    /// Live update.
    LiveResult {
        /// Partial result carried by the packet.
        result: AlgorithmResult,
    },
    /// Log line.
    Log(String),
    /// Debug line.
    Debug(String),
}

fn decode_as<T: DeserializeOwned>(payload: &[u8]) -> Result<T, MonitorError> {
    serde_json::from_slice(payload).map_err(|e| MonitorError::Data(e.to_string()))
}

/// Decode one single-frame stream message.
///
/// Returns `Ok(None)` for packet types the monitor does not handle.
///
/// # Errors
/// Returns `MonitorError::Data` if the payload is not JSON, lacks the type
/// tag, or does not match the shape of its declared type.
pub fn decode_packet(payload: &[u8]) -> Result<Option<StreamPacket>, MonitorError> {
    let header: PacketHeader = decode_as(payload)?;
    let Some(kind) = header.kind.as_str().and_then(PacketType::from_name) else {
        return Ok(None);
    };

    let packet = match kind {
        PacketType::BacktestResult => {
            let p: BacktestPacket = decode_as(payload)?;
            StreamPacket::BacktestResult {
                result: p.results.into_result(ResultType::Backtest),
                progress: p.progress.map_or(Decimal::ZERO, |n| n.0),
                name: p.name,
                project: p.project,
            }
        }
        PacketType::LiveResult => {
            let p: LivePacket = decode_as(payload)?;
            StreamPacket::LiveResult {
                result: p.results.into_result(ResultType::Live),
            }
        }
        PacketType::Log => StreamPacket::Log(decode_as::<MessagePacket>(payload)?.message),
        PacketType::Debug => StreamPacket::Debug(decode_as::<MessagePacket>(payload)?.message),
    };
    Ok(Some(packet))
}
