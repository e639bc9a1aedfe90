//! Re-exports of the shared result model so downstream crates only need
//! `algomon-core`.

pub use algomon_types::{
    AlgorithmResult, ApiConfig, ApiParams, BackoffConfig, ChartDefinition, FileParams, LogLevel,
    MonitorConfig, MonitorError, OhlcPoint, Order, PerformanceWindow, Point, ResultContext,
    ResultType, ScatterMarkerSymbol, SerializerConfig, SeriesDefinition, SeriesType,
    SessionParams, SessionState, StreamParams,
};
