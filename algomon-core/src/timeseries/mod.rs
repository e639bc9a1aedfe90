//! Time-series utilities shared by transports, mutators and chart bookkeeping.
//!
//! Modules include:
//! - `infer`: detect the display resolution of a series
//! - `merge`: merge partial results into an accumulated one
//! - `resample`: aggregate points into daily candles
/// Resolution detection helpers.
pub mod infer;
/// Merge utilities for accumulating partial results.
pub mod merge;
/// Daily candle aggregation.
pub mod resample;

pub(crate) const DAY: i64 = 86_400;
