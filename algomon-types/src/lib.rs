//! Result model, session parameters and configuration primitives shared by the
//! algomon crates.
#![warn(missing_docs)]

mod config;
mod error;
mod result;
mod session;

pub use config::{ApiConfig, BackoffConfig, MonitorConfig, SerializerConfig};
pub use error::MonitorError;
pub use result::{
    AlgorithmResult, ChartDefinition, OhlcPoint, Order, PerformanceWindow, Point, ResultContext,
    ResultType, ScatterMarkerSymbol, SeriesDefinition, SeriesType,
};
pub use session::{
    ApiParams, FileParams, LogLevel, SessionParams, SessionState, StreamParams,
};
