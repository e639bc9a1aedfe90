use algomon::{ApiParams, LogLevel, MonitorError, MonitorEvent, ResultType};
use algomon_mock::fixtures::{self, DAY, EQUITY_CHART, EQUITY_SERIES, T0};
use algomon_mock::{ApiStep, MockApi};
use rust_decimal::Decimal;

use crate::helpers::{Harness, fast_builder, is_state, is_update, points_in};

fn backtest(id: &str) -> ApiParams {
    ApiParams {
        project_id: 42,
        instance_id: id.to_string(),
        instance_type: ResultType::Backtest,
    }
}

fn is_error_log(e: &MonitorEvent) -> bool {
    matches!(e, MonitorEvent::LogEntry { level: LogLevel::Error, .. })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn polls_until_the_backtest_completes() {
    let api = MockApi::new([
        ApiStep::Return(fixtures::snapshot(
            &[(T0, 100), (T0 + DAY, 105)],
            Decimal::new(5, 1),
            false,
        )),
        ApiStep::Return(fixtures::snapshot(
            &[(T0, 100), (T0 + DAY, 105), (T0 + 2 * DAY, 111)],
            Decimal::ONE,
            true,
        )),
    ]);
    let mut h = Harness::running(fast_builder().result_api(api.clone()));
    h.coordinator.open(backtest("bt-1")).await.unwrap();
    assert!(!h.coordinator.can_subscribe().await);

    let (first, _) = h.wait_for(is_update).await;
    assert_eq!(points_in(&first, EQUITY_CHART, EQUITY_SERIES), Some(2));
    let MonitorEvent::SessionUpdated(ctx) = &first else {
        unreachable!()
    };
    assert_eq!(ctx.name, "Smooth Blue Owl");
    assert!(!ctx.completed());

    let (last, _) = h.wait_for(is_update).await;
    assert_eq!(points_in(&last, EQUITY_CHART, EQUITY_SERIES), Some(3));
    let MonitorEvent::SessionUpdated(ctx) = &last else {
        unreachable!()
    };
    assert!(ctx.completed());

    h.wait_for(|e| is_state(e, false)).await;
    assert_eq!(api.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_failure_is_retried() {
    let api = MockApi::new([
        ApiStep::Fail(MonitorError::Http("502 Bad Gateway".into())),
        ApiStep::Return(fixtures::snapshot(&[(T0, 1)], Decimal::ONE, true)),
    ]);
    let mut h = Harness::running(fast_builder().result_api(api.clone()));
    h.coordinator.open(backtest("bt-2")).await.unwrap();

    let (update, skipped) = h.wait_for(is_update).await;
    assert!(skipped.iter().any(is_error_log));
    let MonitorEvent::SessionUpdated(ctx) = update else {
        unreachable!()
    };
    assert!(ctx.completed());
    h.wait_for(|e| is_state(e, false)).await;
    assert_eq!(api.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gives_up_after_consecutive_failures() {
    let api = MockApi::new([ApiStep::Fail(MonitorError::Http("timeout".into()))]);
    let mut h = Harness::running(
        fast_builder()
            .max_poll_failures(3)
            .result_api(api.clone()),
    );
    h.coordinator.open(backtest("bt-3")).await.unwrap();

    let (_, skipped) = h.wait_for(|e| is_state(e, false)).await;
    // One line per failure plus the final notice.
    assert_eq!(skipped.iter().filter(|e| is_error_log(e)).count(), 4);
    assert_eq!(api.calls(), 3);
    assert!(!h.coordinator.is_subscribed().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn permanent_failure_stops_at_once() {
    let api = MockApi::new([ApiStep::Fail(MonitorError::InvalidArg("bad id".into()))]);
    let mut h = Harness::running(fast_builder().result_api(api.clone()));
    h.coordinator.open(backtest("bt-4")).await.unwrap();

    h.wait_for(|e| is_state(e, false)).await;
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn live_instances_are_unsupported() {
    let api = MockApi::new(Vec::new());
    let h = Harness::manual(fast_builder().result_api(api.clone()));
    let err = h
        .coordinator
        .open(ApiParams {
            project_id: 1,
            instance_id: "L-1".into(),
            instance_type: ResultType::Live,
        })
        .await
        .unwrap_err();
    assert_eq!(err, MonitorError::unsupported("api/live"));
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn api_session_needs_a_client() {
    let h = Harness::manual(fast_builder());
    let err = h.coordinator.open(backtest("bt-5")).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidArg(_)));
    assert!(!h.coordinator.has_session().await);
}
