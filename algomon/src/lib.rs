//! Algomon follows an algorithm run (backtest or live) and keeps one merged,
//! ever-growing result of it.
//!
//! Overview
//! - A session reads results from one of three transports: a JSON file
//!   (optionally watched), a ZeroMQ pull socket the engine pushes packets to,
//!   or the polled results API.
//! - Each transport delivers snapshots over a channel to the
//!   [`SessionCoordinator`], which merges them into the accumulated result,
//!   runs the derived-series mutators and notifies its collaborator.
//! - Chart bookkeeping ([`ChartBook`]) keeps per-series cursors, the display
//!   resolution of every chart and daily candles for candle series.
//!
//! Key behaviors and trade-offs
//! - Merging is idempotent: a watched file is simply re-read in full on every
//!   change and redelivered; duplicate points are discarded by value.
//! - Exactly one session is active. Deliveries of a replaced or closed session
//!   are dropped by session id, so a late packet never leaks into a new run.
//! - Cancellation is cooperative and fire-and-forget: unsubscribing raises a
//!   stop flag that workers observe within one receive timeout or poll
//!   interval; callers do not wait for the workers to exit.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use algomon::{ChannelNotifier, SessionCoordinator, FileParams};
//!
//! let (notifier, mut events) = ChannelNotifier::new();
//! let coordinator = Arc::new(
//!     SessionCoordinator::builder()
//!         .notifier(Arc::new(notifier))
//!         .build()?,
//! );
//! let _delivery = coordinator.spawn_delivery_loop();
//! coordinator
//!     .open(FileParams { path: "backtest.json".into(), watch: true })
//!     .await?;
//! while let Some(event) = events.recv().await {
//!     // render
//! }
//! ```
#![warn(missing_docs)]

/// Chart bookkeeping: cursors, resolution and candles per chart.
pub mod charts;
pub(crate) mod core;
/// The three transports.
pub mod session;

pub use charts::{ChartBook, ChartView, SeriesView};
pub use core::{
    BootstrapAction, ChannelNotifier, MonitorEvent, NullNotifier, Notifier, SessionCoordinator,
    SessionCoordinatorBuilder,
};
pub use session::zmq::ZmqConnector;
pub use session::{Session, SessionEnv};

// Re-export core types for convenience
pub use algomon_core::{
    AlgorithmResult, ApiConfig, ApiParams, BackoffConfig, ChartDefinition, FileParams, LogLevel,
    MonitorConfig, MonitorError, OhlcPoint, Order, Point, Resolution, ResultContext, ResultType,
    SerializerConfig, SeriesDefinition, SeriesType, SessionParams, SessionState,
    StatisticState, StreamParams, classify_statistic,
};
