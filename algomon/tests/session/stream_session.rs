use std::time::Duration;

use algomon::{LogLevel, MonitorError, MonitorEvent, StreamParams};
use algomon_mock::fixtures::{self, DAY, EQUITY_CHART, EQUITY_SERIES, T0};
use algomon_mock::{FailingConnector, MockFrames};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::helpers::{Harness, fast_builder, is_state, is_update, points_in};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn merges_packets_and_closes_after_completion() {
    let (connector, ctrl) = MockFrames::new();
    let mut h = Harness::running(fast_builder().frame_connector(connector));
    h.coordinator
        .open(StreamParams::new("localhost", 5678))
        .await
        .unwrap();
    assert_eq!(ctrl.endpoints().await, vec![">tcp://localhost:5678".to_string()]);
    h.wait_for(|e| is_state(e, true)).await;

    ctrl.push(fixtures::backtest_packet(
        EQUITY_CHART,
        EQUITY_SERIES,
        &[(T0, 100), (T0 + DAY, 110)],
        0.5,
    ))
    .await;
    let (ev, _) = h.wait_for(is_update).await;
    let MonitorEvent::SessionUpdated(ctx) = &ev else {
        unreachable!()
    };
    assert_eq!(ctx.name, "localhost:5678");
    assert_eq!(ctx.project.as_deref(), Some("Fixture Project"));
    assert_eq!(ctx.progress, Some(Decimal::new(5, 1)));
    assert_eq!(points_in(&ev, EQUITY_CHART, EQUITY_SERIES), Some(2));

    // Overlapping packet: the repeated point is not duplicated.
    ctrl.push(fixtures::backtest_packet(
        EQUITY_CHART,
        EQUITY_SERIES,
        &[(T0 + DAY, 110), (T0 + 2 * DAY, 120)],
        1.0,
    ))
    .await;
    let (ev, _) = h.wait_for(is_update).await;
    assert_eq!(points_in(&ev, EQUITY_CHART, EQUITY_SERIES), Some(3));
    let MonitorEvent::SessionUpdated(ctx) = &ev else {
        unreachable!()
    };
    assert!(ctx.completed());

    h.wait_for(|e| is_state(e, false)).await;
    assert!(!h.coordinator.is_subscribed().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn log_packets_are_forwarded_and_junk_is_dropped() {
    let (connector, ctrl) = MockFrames::new();
    let mut h = Harness::running(fast_builder().frame_connector(connector));
    h.coordinator
        .open(StreamParams::new("localhost", 1234))
        .await
        .unwrap();

    ctrl.push(fixtures::unknown_packet()).await;
    ctrl.push(b"definitely not json".to_vec()).await;
    ctrl.push_multipart(vec![fixtures::log_packet("a"), fixtures::log_packet("b")])
        .await;
    ctrl.push(fixtures::log_packet("hello")).await;
    ctrl.push(fixtures::debug_packet("dbg")).await;

    let (log, skipped) = h
        .wait_for(|e| matches!(e, MonitorEvent::LogEntry { .. }))
        .await;
    assert!(matches!(
        log,
        MonitorEvent::LogEntry { ref message, level: LogLevel::Log, .. } if message == "hello"
    ));
    let (debug, more) = h
        .wait_for(|e| matches!(e, MonitorEvent::LogEntry { .. }))
        .await;
    assert!(matches!(
        debug,
        MonitorEvent::LogEntry { ref message, level: LogLevel::Debug, .. } if message == "dbg"
    ));
    assert!(!skipped.iter().chain(&more).any(is_update));
    assert!(h.coordinator.last_result().await.is_none());
    assert!(h.coordinator.is_subscribed().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn receive_failure_unsubscribes_and_resubscribe_reconnects() {
    let (connector, ctrl) = MockFrames::new();
    let mut h = Harness::running(fast_builder().frame_connector(connector));
    h.coordinator
        .open(StreamParams::new("localhost", 4000))
        .await
        .unwrap();
    h.wait_for(|e| is_state(e, true)).await;

    ctrl.fail(MonitorError::Other("socket closed".into())).await;
    let (err, _) = h
        .wait_for(|e| matches!(e, MonitorEvent::LogEntry { level: LogLevel::Error, .. }))
        .await;
    assert!(matches!(err, MonitorEvent::LogEntry { ref message, .. } if message.contains("socket closed")));
    h.wait_for(|e| is_state(e, false)).await;

    assert!(h.coordinator.can_subscribe().await);
    h.coordinator.set_subscribed(true).await.unwrap();
    h.wait_for(|e| is_state(e, true)).await;
    assert_eq!(ctrl.endpoints().await.len(), 2);

    h.coordinator.set_subscribed(false).await.unwrap();
    h.wait_for(|e| is_state(e, false)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!ctrl.is_connected().await);
}

#[tokio::test]
async fn connect_failure_surfaces_from_open() {
    let mut h = Harness::manual(fast_builder().frame_connector(Arc::new(FailingConnector)));
    let err = h
        .coordinator
        .open(StreamParams::new("nowhere", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Connect { .. }));

    let events = h.drain();
    assert!(matches!(events[0], MonitorEvent::SessionOpened { ref name } if name == "nowhere:1"));
    assert_eq!(events.last(), Some(&MonitorEvent::SessionClosed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deliveries_of_a_replaced_session_are_dropped() {
    let (connector, ctrl) = MockFrames::new();
    let mut h = Harness::manual(fast_builder().frame_connector(connector));
    h.coordinator
        .open(StreamParams::new("localhost", 7000))
        .await
        .unwrap();
    ctrl.push(fixtures::backtest_packet(
        EQUITY_CHART,
        EQUITY_SERIES,
        &[(T0, 1)],
        0.1,
    ))
    .await;
    // Let the listener and drainer queue the update.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();
    h.coordinator
        .open(algomon::FileParams { path, watch: false })
        .await
        .unwrap();

    h.coordinator.process_pending().await;
    let updates: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::SessionUpdated(ctx) => Some(ctx.name),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec!["other.json".to_string()]);
}
