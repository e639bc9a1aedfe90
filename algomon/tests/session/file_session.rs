use algomon::{FileParams, MonitorError, MonitorEvent, SessionState};
use algomon_mock::fixtures::{self, DAY, EQUITY_CHART, EQUITY_SERIES, T0, THREE_POINTS};
use rust_decimal::Decimal;

use crate::helpers::{Harness, fast_builder, is_state, points_in};

#[tokio::test]
async fn initialize_delivers_one_completed_result_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backtest.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams {
            path: path.clone(),
            watch: false,
        })
        .await
        .unwrap();
    assert_eq!(h.coordinator.process_pending().await, 1);

    let events = h.drain();
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(
        events[0],
        MonitorEvent::SessionOpened {
            name: "backtest.json".to_string()
        }
    );
    let MonitorEvent::SessionUpdated(ctx) = &events[1] else {
        panic!("expected an update, got {:?}", events[1]);
    };
    assert_eq!(ctx.progress, Some(Decimal::ONE));
    assert!(ctx.completed());
    let xs: Vec<i64> = ctx
        .result
        .series(EQUITY_CHART, EQUITY_SERIES)
        .unwrap()
        .values
        .iter()
        .map(|p| p.x.timestamp())
        .collect();
    assert_eq!(xs, THREE_POINTS.iter().map(|p| p.0).collect::<Vec<_>>());

    assert!(!h.coordinator.is_subscribed().await);
    assert!(h.coordinator.can_subscribe().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watched_file_is_reread_on_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::running(fast_builder());
    h.coordinator
        .open(FileParams {
            path: path.clone(),
            watch: true,
        })
        .await
        .unwrap();

    let (first, _) = h
        .wait_for(|e| points_in(e, EQUITY_CHART, EQUITY_SERIES).is_some())
        .await;
    assert_eq!(points_in(&first, EQUITY_CHART, EQUITY_SERIES), Some(3));
    h.wait_for(|e| is_state(e, true)).await;
    assert!(h.coordinator.is_subscribed().await);

    let mut grown = THREE_POINTS.to_vec();
    grown.push((T0 + 3 * DAY, 100_400));
    let doc = fixtures::result_document(EQUITY_CHART, EQUITY_SERIES, &grown);
    std::fs::write(&path, doc.to_string()).unwrap();

    let (updated, _) = h
        .wait_for(|e| points_in(e, EQUITY_CHART, EQUITY_SERIES) == Some(4))
        .await;
    let MonitorEvent::SessionUpdated(ctx) = updated else {
        unreachable!()
    };
    let last = ctx.result.series(EQUITY_CHART, EQUITY_SERIES).unwrap().values[3];
    assert_eq!(last, fixtures::point(T0 + 3 * DAY, 100_400));

    h.coordinator.set_subscribed(false).await.unwrap();
    h.wait_for(|e| is_state(e, false)).await;
}

#[tokio::test]
async fn missing_file_is_announced_then_closed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.json");

    let mut h = Harness::manual(fast_builder());
    let err = h
        .coordinator
        .open(FileParams {
            path: path.clone(),
            watch: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::FileNotFound { .. }));
    assert!(err.to_string().contains("nope.json"));

    let events = h.drain();
    assert!(matches!(events[0], MonitorEvent::SessionOpened { .. }));
    assert_eq!(events[1], MonitorEvent::SessionClosed);
    assert!(!h.coordinator.has_session().await);
}

#[tokio::test]
async fn malformed_file_is_not_a_valid_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"Charts\": [1, 2").unwrap();

    let h = Harness::manual(fast_builder());
    let err = h
        .coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidResult(_)));
    assert!(err.to_string().starts_with("The file is no valid result"));
}

#[tokio::test]
async fn unsubscribed_file_session_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();

    // Same state again: nothing happens.
    h.coordinator.set_subscribed(false).await.unwrap();
    h.coordinator.set_subscribed(true).await.unwrap();
    assert!(h.coordinator.is_subscribed().await);
    h.coordinator.process_pending().await;
    assert!(
        h.drain()
            .contains(&MonitorEvent::StateChanged(SessionState::Subscribed))
    );
    h.coordinator.set_subscribed(false).await.unwrap();
    assert!(!h.coordinator.is_subscribed().await);
}
