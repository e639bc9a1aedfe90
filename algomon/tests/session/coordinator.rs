use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use algomon::{
    AlgorithmResult, BootstrapAction, FileParams, MonitorError, MonitorEvent, SessionCoordinator,
    SessionState,
};
use algomon_core::mutator::{EQUITY_CHART, RELATIVE_BENCHMARK_SERIES};
use algomon_core::{ResultMutator, ResultSerializer};
use algomon_mock::MockFrames;
use algomon_mock::fixtures::{self, DAY, T0};
use rust_decimal::Decimal;

use crate::helpers::{Harness, fast_builder};

fn write_result(dir: &tempfile::TempDir, name: &str, result: &AlgorithmResult) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let json = ResultSerializer::default().serialize(result).unwrap();
    std::fs::write(&path, json).unwrap();
    path
}

#[tokio::test]
async fn relative_benchmark_is_derived_after_merge() {
    let dir = tempfile::tempdir().unwrap();
    let result = fixtures::equity_benchmark_result(
        &[(T0, 1_000), (T0 + DAY, 1_100), (T0 + 2 * DAY, 1_200)],
        &[(T0, 50), (T0 + DAY, 100), (T0 + 2 * DAY, 50)],
    );
    let path = write_result(&dir, "bench.json", &result);

    let h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();
    h.coordinator.process_pending().await;

    let merged = h.coordinator.last_result().await.unwrap();
    let rel: Vec<Decimal> = merged
        .series(EQUITY_CHART, RELATIVE_BENCHMARK_SERIES)
        .unwrap()
        .values
        .iter()
        .map(|p| p.y)
        .collect();
    assert_eq!(
        rel,
        vec![Decimal::from(1_000), Decimal::from(2_000), Decimal::from(1_000)]
    );
}

struct CountingMutator(AtomicUsize);

impl ResultMutator for CountingMutator {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn mutate(&self, _result: &mut AlgorithmResult) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn extra_mutators_run_once_per_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let counter = Arc::new(CountingMutator(AtomicUsize::new(0)));
    let h = Harness::manual(fast_builder().without_mutators().with_mutator(counter.clone()));
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();
    h.coordinator.process_pending().await;
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn operations_without_a_session_fail() {
    let h = Harness::manual(fast_builder());
    assert_eq!(
        h.coordinator.shutdown_session().await,
        Err(MonitorError::NoSession)
    );
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        h.coordinator.export(dir.path().join("out.json")).await,
        Err(MonitorError::NoSession)
    );
    assert_eq!(
        h.coordinator.set_subscribed(true).await,
        Err(MonitorError::NoSession)
    );
    assert!(!h.coordinator.is_subscribed().await);
    assert!(!h.coordinator.can_subscribe().await);
}

#[tokio::test]
async fn close_clears_the_result_and_announces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("r.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();
    h.coordinator.process_pending().await;
    assert!(!h.coordinator.charts().names().is_empty());

    h.coordinator.shutdown_session().await.unwrap();
    assert_eq!(h.drain().last(), Some(&MonitorEvent::SessionClosed));
    assert!(h.coordinator.last_result().await.is_none());
    assert!(h.coordinator.charts().names().is_empty());
}

#[tokio::test]
async fn closing_a_subscribed_session_reports_unsubscribe_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watched.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: true })
        .await
        .unwrap();
    h.coordinator.process_pending().await;
    assert!(
        h.drain()
            .contains(&MonitorEvent::StateChanged(SessionState::Subscribed))
    );

    h.coordinator.shutdown_session().await.unwrap();
    h.coordinator.process_pending().await;
    assert_eq!(
        h.drain(),
        vec![
            MonitorEvent::StateChanged(SessionState::Unsubscribed),
            MonitorEvent::SessionClosed,
        ]
    );
}

#[tokio::test]
async fn closing_an_unsubscribed_session_only_announces_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let mut h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();
    h.coordinator.process_pending().await;
    h.drain();

    h.coordinator.shutdown_session().await.unwrap();
    h.coordinator.process_pending().await;
    assert_eq!(h.drain(), vec![MonitorEvent::SessionClosed]);
}

#[tokio::test]
async fn export_writes_the_merged_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let h = Harness::manual(fast_builder());
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();
    h.coordinator.process_pending().await;

    let out = dir.path().join("out.json");
    h.coordinator.export(&out).await.unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    let back = ResultSerializer::default().deserialize(&text).unwrap();
    assert_eq!(back, h.coordinator.last_result().await.unwrap());
}

#[tokio::test]
async fn bootstrap_without_arguments_prompts() {
    let mut h = Harness::manual(fast_builder());
    let action = h.coordinator.bootstrap(["algomon"]).await.unwrap();
    assert_eq!(action, BootstrapAction::Prompt);
    assert_eq!(h.drain(), vec![MonitorEvent::ShowNewSession]);
    assert!(!h.coordinator.has_session().await);
}

#[tokio::test]
async fn bootstrap_port_opens_local_stream() {
    let (connector, ctrl) = MockFrames::new();
    let h = Harness::manual(fast_builder().frame_connector(connector));
    let action = h.coordinator.bootstrap(["algomon", "8080"]).await.unwrap();
    assert_eq!(action, BootstrapAction::Stream(8080));
    assert_eq!(ctrl.endpoints().await, vec![">tcp://localhost:8080".to_string()]);
    assert!(h.coordinator.is_subscribed().await);
}

#[tokio::test]
async fn bootstrap_json_opens_watched_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cli.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();

    let h = Harness::manual(fast_builder());
    let arg = path.to_string_lossy().into_owned();
    let action = h.coordinator.bootstrap(["algomon", arg.as_str()]).await.unwrap();
    assert_eq!(action, BootstrapAction::File(path));
    assert!(h.coordinator.is_subscribed().await);
}

#[tokio::test]
async fn bootstrap_rejects_out_of_range_port() {
    let h = Harness::manual(fast_builder());
    let err = h.coordinator.bootstrap(["99999"]).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidArg(_)));
}

#[test]
fn builder_rejects_zero_intervals() {
    let err = SessionCoordinator::builder()
        .poll_interval(Duration::ZERO)
        .build()
        .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidArg(_)));
    assert!(
        SessionCoordinator::builder()
            .receive_timeout(Duration::ZERO)
            .build()
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivery_loop_stops_with_its_handle() {
    let h = Harness::manual(fast_builder());
    let handle = h.coordinator.spawn_delivery_loop();
    assert!(!handle.is_finished());
    tokio_test::assert_ok!(
        tokio::time::timeout(Duration::from_secs(1), handle.stop()).await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_delivery_loop_leaves_queued_deliveries() {
    let h = Harness::manual(fast_builder());
    h.coordinator.spawn_delivery_loop().stop().await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.json");
    std::fs::write(&path, fixtures::three_point_document()).unwrap();
    h.coordinator
        .open(FileParams { path, watch: false })
        .await
        .unwrap();

    assert_eq!(h.coordinator.process_pending().await, 1);
    assert!(h.coordinator.last_result().await.is_some());
}
