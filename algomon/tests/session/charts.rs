use algomon::{AlgorithmResult, ChartBook, ChartDefinition, OhlcPoint, Resolution, SeriesType};
use algomon_mock::fixtures::{self, DAY, T0};
use rust_decimal::Decimal;

fn chart_result(series: Vec<algomon::SeriesDefinition>) -> AlgorithmResult {
    let mut r = AlgorithmResult::default();
    let mut c = ChartDefinition::new("Price");
    for s in series {
        c.series.insert(s.name.clone(), s);
    }
    r.charts.insert("Price".to_string(), c);
    r
}

fn candle(day: i64, o: i64, h: i64, l: i64, c: i64) -> OhlcPoint {
    OhlcPoint {
        x: fixtures::ts(T0 + day * DAY),
        open: Decimal::from(o),
        high: Decimal::from(h),
        low: Decimal::from(l),
        close: Decimal::from(c),
    }
}

#[test]
fn candles_extend_across_updates_without_duplicate_days() {
    let book = ChartBook::new();
    let mut points = vec![(T0, 10), (T0 + 3_600, 20), (T0 + DAY, 5)];
    let changed = book.update(&chart_result(vec![fixtures::series(
        "SPY",
        SeriesType::Candle,
        &points,
    )]));
    assert_eq!(changed, vec!["Price".to_string()]);

    let view = book.chart("Price").unwrap();
    assert_eq!(
        view.series["SPY"].candles,
        vec![candle(0, 10, 20, 10, 20), candle(1, 5, 5, 5, 5)]
    );

    // Second delivery re-sends everything plus one point on the last day.
    points.push((T0 + DAY + 60, 30));
    book.update(&chart_result(vec![fixtures::series(
        "SPY",
        SeriesType::Candle,
        &points,
    )]));
    let view = book.chart("Price").unwrap();
    assert_eq!(
        view.series["SPY"].candles,
        vec![candle(0, 10, 20, 10, 20), candle(1, 5, 30, 5, 30)]
    );
    assert_eq!(view.series["SPY"].points.len(), 4);

    // Nothing new: nothing changes.
    let changed = book.update(&chart_result(vec![fixtures::series(
        "SPY",
        SeriesType::Candle,
        &points,
    )]));
    assert!(changed.is_empty());
}

#[test]
fn chart_resolution_only_gets_finer() {
    let book = ChartBook::new();
    let hourly = fixtures::series("A", SeriesType::Line, &[(T0, 1), (T0 + 3_600, 2)]);
    book.update(&chart_result(vec![hourly.clone()]));
    assert_eq!(book.chart("Price").unwrap().resolution(), Resolution::Hour);

    let minutely = fixtures::series("B", SeriesType::Line, &[(T0, 1), (T0 + 60, 2)]);
    book.update(&chart_result(vec![hourly.clone(), minutely]));
    assert_eq!(book.chart("Price").unwrap().resolution(), Resolution::Minute);

    // A later coarse-only update does not coarsen the chart.
    book.update(&chart_result(vec![hourly]));
    assert_eq!(book.chart("Price").unwrap().resolution(), Resolution::Minute);
}

#[test]
fn opening_a_chart_before_data_arrives() {
    let book = ChartBook::new();
    let empty = book.open_chart("Price");
    assert!(empty.open);
    assert!(empty.series.is_empty());
    assert_eq!(empty.resolution(), Resolution::Day);

    book.update(&chart_result(vec![fixtures::series(
        "A",
        SeriesType::Line,
        &[(T0, 1), (T0 + DAY, 2)],
    )]));
    let view = book.chart("Price").unwrap();
    assert!(view.open);
    assert_eq!(view.series["A"].points.len(), 2);
    assert_eq!(book.names(), vec!["Price".to_string()]);

    book.clear();
    assert!(book.chart("Price").is_none());
}
