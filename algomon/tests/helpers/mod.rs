// Shared by the integration tests: `mod helpers;` then `use crate::helpers::*;`
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use algomon::{
    BackoffConfig, ChannelNotifier, MonitorEvent, SessionCoordinator, SessionCoordinatorBuilder,
};
use algomon_core::stream::WorkerHandle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound for waiting on a single event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder with intervals short enough for tests.
pub fn fast_builder() -> SessionCoordinatorBuilder {
    SessionCoordinator::builder()
        .poll_interval(Duration::from_millis(10))
        .receive_timeout(Duration::from_millis(20))
        .watch_interval(Duration::from_millis(20))
        .retry(BackoffConfig {
            min_backoff_ms: 1,
            max_backoff_ms: 5,
            factor: 2,
            jitter_percent: 0,
        })
}

/// A coordinator wired to a channel notifier.
pub struct Harness {
    pub coordinator: Arc<SessionCoordinator>,
    pub events: UnboundedReceiver<MonitorEvent>,
    delivery: Option<WorkerHandle>,
}

impl Harness {
    /// Coordinator with a running delivery loop.
    pub fn running(builder: SessionCoordinatorBuilder) -> Self {
        let mut h = Self::manual(builder);
        h.delivery = Some(h.coordinator.spawn_delivery_loop());
        h
    }

    /// Coordinator whose deliveries are only handled through
    /// `process_pending`/`process_next`.
    pub fn manual(builder: SessionCoordinatorBuilder) -> Self {
        let (notifier, events) = ChannelNotifier::new();
        let coordinator = Arc::new(
            builder
                .notifier(Arc::new(notifier))
                .build()
                .expect("valid test configuration"),
        );
        Self {
            coordinator,
            events,
            delivery: None,
        }
    }

    /// Next event, failing the test after [`EVENT_TIMEOUT`].
    pub async fn next_event(&mut self) -> MonitorEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("notifier channel closed")
    }

    /// Skip events until one matches `pred`; returns it and the skipped ones.
    pub async fn wait_for(
        &mut self,
        pred: impl Fn(&MonitorEvent) -> bool,
    ) -> (MonitorEvent, Vec<MonitorEvent>) {
        let mut skipped = Vec::new();
        loop {
            let ev = self.next_event().await;
            if pred(&ev) {
                return (ev, skipped);
            }
            skipped.push(ev);
        }
    }

    /// Events already queued, without waiting.
    pub fn drain(&mut self) -> Vec<MonitorEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

/// Number of points in `chart/series` of an update event.
pub fn points_in(ev: &MonitorEvent, chart: &str, series: &str) -> Option<usize> {
    match ev {
        MonitorEvent::SessionUpdated(ctx) => ctx.result.series(chart, series).map(|s| s.values.len()),
        _ => None,
    }
}

pub fn is_update(ev: &MonitorEvent) -> bool {
    matches!(ev, MonitorEvent::SessionUpdated(_))
}

pub fn is_state(ev: &MonitorEvent, subscribed: bool) -> bool {
    matches!(ev, MonitorEvent::StateChanged(s) if s.is_subscribed() == subscribed)
}
