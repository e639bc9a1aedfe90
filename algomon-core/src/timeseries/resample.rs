use algomon_types::{OhlcPoint, Point};
use chrono::{DateTime, Utc};

use super::DAY;

fn day_of(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(DAY)
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    day_of(a) == day_of(b)
}

/// Aggregate raw points into one candle per UTC day.
///
/// Points are sorted by timestamp first (stable, so equal timestamps keep
/// arrival order). Each candle is stamped with the start of its day and takes
/// `open` from the first point, `close` from the last and `high`/`low` from
/// the extremes.
#[must_use]
pub fn aggregate_daily(points: &[Point]) -> Vec<OhlcPoint> {
    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by_key(|p| p.x);

    let mut out: Vec<OhlcPoint> = Vec::new();
    let mut cur_day: Option<i64> = None;

    for p in sorted {
        let day = day_of(p.x);
        if cur_day == Some(day)
            && let Some(c) = out.last_mut()
        {
            c.high = c.high.max(p.y);
            c.low = c.low.min(p.y);
            c.close = p.y;
            continue;
        }
        let Some(start) = DateTime::from_timestamp(day * DAY, 0) else {
            continue;
        };
        cur_day = Some(day);
        out.push(OhlcPoint {
            x: start,
            open: p.y,
            high: p.y,
            low: p.y,
            close: p.y,
        });
    }

    out
}

/// Fold pending candles that fall on the last stored candle's day into it.
///
/// While the first pending candle shares its day with the last stored one,
/// the stored candle takes the wider `high`/`low` and the newer `close` (its
/// `open` is kept) and the pending candle is removed from the batch.
pub fn update_existing_candles(existing: &mut [OhlcPoint], pending: &mut Vec<OhlcPoint>) {
    let Some(last) = existing.last_mut() else {
        return;
    };
    let mut consumed = 0;
    for c in pending.iter() {
        if !same_day(c.x, last.x) {
            break;
        }
        last.high = last.high.max(c.high);
        last.low = last.low.min(c.low);
        last.close = c.close;
        consumed += 1;
    }
    pending.drain(..consumed);
}

/// Apply [`update_existing_candles`] and append what remains of `pending`.
///
/// A day straddling two deliveries therefore never yields two candles.
pub fn append_candles(existing: &mut Vec<OhlcPoint>, mut pending: Vec<OhlcPoint>) {
    update_existing_candles(existing, &mut pending);
    existing.extend(pending);
}
