//! algomon-core
//!
//! Pure algorithms and shared plumbing of the result monitor.
//!
//! - `timeseries`: merging results, `since` filtering, resolution detection and
//!   daily candle aggregation.
//! - `mutator`: derived series computed after every merge.
//! - `wire` / `serializer`: the JSON result document and stream packet formats.
//! - `transport`: the delivery channel from transports to the coordinator and
//!   the socket/HTTP primitives transports are built on.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `stream::WorkerHandle` wraps `tokio::task::JoinHandle<()>` and stops workers
//! through a `tokio::sync::watch` flag; `transport::SessionLink` sends over a
//! `tokio::sync::mpsc` channel. Transports therefore run under a Tokio 1.x
//! runtime.
//!
#![warn(missing_docs)]

/// Derived-series mutators run after every merge.
pub mod mutator;
/// Result document (de)serialization.
pub mod serializer;
/// Classification of summary statistics.
pub mod statistics;
/// Worker task handles and stop signals.
pub mod stream;
/// Time-series utilities for merging, resolution detection and candles.
pub mod timeseries;
/// Delivery channel and transport primitives.
pub mod transport;
pub mod types;
/// Wire representation of result documents and stream packets.
pub mod wire;

pub use mutator::{BenchmarkMutator, MutatorPipeline, ResultMutator};
pub use serializer::ResultSerializer;
pub use statistics::{StatisticState, classify_statistic};
pub use timeseries::infer::{ChartResolution, Resolution, chart_resolution, detect_resolution};
pub use timeseries::merge::{merge_result, merge_series, since};
pub use timeseries::resample::{aggregate_daily, append_candles, update_existing_candles};
pub use transport::{
    BacktestSnapshot, Delivery, FrameConnector, FrameSource, ResultApi, SessionEvent, SessionLink,
};
pub use types::*;
