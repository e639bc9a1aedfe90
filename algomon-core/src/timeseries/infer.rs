use std::collections::HashSet;
use std::fmt;

use algomon_types::{ChartDefinition, SeriesDefinition, SeriesType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DAY;

/// Display granularity of a time axis.
///
/// Ordered from finest to coarsest, so `min` picks the more granular one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Sub-second.
    Tick,
    /// One second.
    Second,
    /// One minute.
    Minute,
    /// One hour.
    Hour,
    /// One day.
    Day,
}

impl Resolution {
    /// Bucketing granularities from coarsest to finest, excluding `Tick`.
    const BUCKETED: [Self; 4] = [Self::Day, Self::Hour, Self::Minute, Self::Second];

    /// Length of one bucket in seconds; `None` for `Tick`.
    #[must_use]
    pub const fn seconds(self) -> Option<i64> {
        match self {
            Self::Tick => None,
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3_600),
            Self::Day => Some(DAY),
        }
    }

    /// Bucket key of `ts` at this resolution.
    ///
    /// `Tick` keys on the full microsecond timestamp.
    #[must_use]
    pub fn bucket_key(self, ts: DateTime<Utc>) -> i64 {
        match self.seconds() {
            Some(step) => ts.timestamp().div_euclid(step),
            None => ts.timestamp_micros(),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tick => "tick",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        };
        f.write_str(s)
    }
}

/// Coarsest resolution at which no two points of `series` share a bucket.
///
/// Candle series are always `Day`. Granularities are tried from `Day` down to
/// `Second`; if points still collide at one second the series needs `Tick`.
///
/// ```
/// use algomon_core::{detect_resolution, Resolution};
/// use algomon_core::{Point, SeriesDefinition, SeriesType};
/// use chrono::DateTime;
/// use rust_decimal::Decimal;
///
/// let mut s = SeriesDefinition::new("Equity", SeriesType::Line);
/// for ts in [0, 3_600] {
///     s.values.push(Point::new(DateTime::from_timestamp(ts, 0).unwrap(), Decimal::ONE));
/// }
/// assert_eq!(detect_resolution(&s), Resolution::Hour);
/// ```
#[must_use]
pub fn detect_resolution(series: &SeriesDefinition) -> Resolution {
    if series.series_type == SeriesType::Candle {
        return Resolution::Day;
    }

    let mut keys: HashSet<i64> = HashSet::with_capacity(series.values.len());
    for res in Resolution::BUCKETED {
        keys.clear();
        if series.values.iter().all(|p| keys.insert(res.bucket_key(p.x))) {
            return res;
        }
    }
    Resolution::Tick
}

/// Finest resolution required by any series of `chart`; `Day` when empty.
#[must_use]
pub fn chart_resolution(chart: &ChartDefinition) -> Resolution {
    chart
        .series
        .values()
        .map(detect_resolution)
        .min()
        .unwrap_or(Resolution::Day)
}

/// Resolution of a chart that only ever becomes finer.
///
/// Streaming data can reveal denser points later; once a chart is shown at a
/// finer granularity it is never coarsened again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChartResolution {
    current: Option<Resolution>,
}

impl ChartResolution {
    /// Fold in a newly detected resolution and return the effective one.
    pub fn observe(&mut self, detected: Resolution) -> Resolution {
        let next = self.current.map_or(detected, |cur| cur.min(detected));
        self.current = Some(next);
        next
    }

    /// Effective resolution; `Day` before anything was observed.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        self.current.unwrap_or(Resolution::Day)
    }
}
