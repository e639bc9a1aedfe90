use std::sync::Arc;
use std::time::Duration;

use algomon_core::stream::{StopSignal, WorkerHandle, stopped};
use algomon_core::{
    AlgorithmResult, ApiParams, BackoffConfig, LogLevel, MonitorError, ResultApi, ResultContext,
    ResultType, SessionLink, SessionState, merge_result,
};
use tokio::sync::watch;

use super::SessionEnv;
use super::backoff::retry_delay;

/// Polls the results API until the backtest completes.
///
/// Failed polls are retried with exponential backoff. Polling gives up after
/// `max_poll_failures` consecutive failures, or at once for errors that are not
/// transient. Live instances are not supported over the API.
pub struct ApiSession {
    params: ApiParams,
    name: String,
    link: SessionLink,
    api: Arc<dyn ResultApi>,
    poll_interval: Duration,
    retry: BackoffConfig,
    max_poll_failures: u32,
    poller: Option<WorkerHandle>,
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("params", &self.params)
            .field("state", &self.link.state())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ApiSession {
    /// Build an API session.
    ///
    /// # Errors
    /// `InvalidArg` if `env` carries no API client.
    pub fn new(params: ApiParams, link: SessionLink, env: &SessionEnv) -> Result<Self, MonitorError> {
        let Some(api) = env.api.clone() else {
            return Err(MonitorError::InvalidArg(
                "API sessions require a configured API client".to_string(),
            ));
        };
        let name = format!("{}/{}", params.project_id, params.instance_id);
        Ok(Self {
            params,
            name,
            link,
            api,
            poll_interval: env.config.poll_interval,
            retry: env.config.retry,
            max_poll_failures: env.config.max_poll_failures,
            poller: None,
        })
    }

    /// `project/instance` of the polled backtest.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current subscription state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.link.state()
    }

    /// Start polling.
    ///
    /// # Errors
    /// See [`subscribe`](Self::subscribe).
    pub fn initialize(&mut self) -> Result<(), MonitorError> {
        self.subscribe()
    }

    /// Start the poll loop. The first poll happens immediately.
    ///
    /// # Errors
    /// `Unsupported` for live instances.
    pub fn subscribe(&mut self) -> Result<(), MonitorError> {
        if self.params.instance_type == ResultType::Live {
            return Err(MonitorError::unsupported("api/live"));
        }
        if self.state().is_subscribed() {
            return Ok(());
        }
        if let Some(old) = self.poller.take() {
            old.cancel();
        }

        let (stop, stop_rx) = StopSignal::new();
        self.link.set_state(SessionState::Subscribed);
        let task = tokio::spawn(poll(
            PollJob {
                api: Arc::clone(&self.api),
                project_id: self.params.project_id,
                backtest_id: self.params.instance_id.clone(),
                name: self.name.clone(),
                interval: self.poll_interval,
                retry: self.retry,
                max_failures: self.max_poll_failures,
                link: self.link.worker(),
            },
            stop_rx,
        ));
        self.poller = Some(WorkerHandle::new(task, stop));
        Ok(())
    }

    /// Stop polling.
    pub fn unsubscribe(&mut self) {
        if let Some(p) = self.poller.take() {
            p.cancel();
        }
        self.link.set_state(SessionState::Unsubscribed);
    }

    /// Stop polling.
    ///
    /// # Errors
    /// Never fails.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        self.unsubscribe();
        Ok(())
    }
}

struct PollJob {
    api: Arc<dyn ResultApi>,
    project_id: i64,
    backtest_id: String,
    name: String,
    interval: Duration,
    retry: BackoffConfig,
    max_failures: u32,
    link: SessionLink,
}

async fn poll(job: PollJob, mut stop_rx: watch::Receiver<bool>) {
    let mut accumulated = AlgorithmResult::default();
    let mut failures: u32 = 0;
    let mut delay = Duration::ZERO;

    loop {
        tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => break,
            () = tokio::time::sleep(delay) => {}
        }
        let outcome = tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => break,
            r = job.api.read_backtest(job.project_id, &job.backtest_id) => r,
        };

        match outcome {
            Ok(snapshot) => {
                failures = 0;
                delay = job.interval;
                if let Some(partial) = &snapshot.result {
                    merge_result(&mut accumulated, partial);
                }
                let context = ResultContext {
                    name: if snapshot.name.is_empty() {
                        job.name.clone()
                    } else {
                        snapshot.name.clone()
                    },
                    project: snapshot.project.clone(),
                    result: accumulated.clone(),
                    progress: Some(snapshot.progress),
                };
                if !job.link.deliver(context) {
                    break;
                }
                if snapshot.completed {
                    #[cfg(feature = "tracing")]
                    tracing::info!(target = "algomon::api", session = %job.name, "backtest completed, polling stopped");
                    job.link.set_state(SessionState::Unsubscribed);
                    break;
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                #[cfg(feature = "tracing")]
                tracing::warn!(target = "algomon::api", error = %e, failures, "backtest poll failed");
                job.link
                    .log(format!("Polling '{}' failed: {e}", job.name), LogLevel::Error);
                let exhausted = job.max_failures > 0 && failures >= job.max_failures;
                if exhausted || !e.is_transient() {
                    job.link.log(
                        format!("Stopped polling '{}' after {failures} failed attempt(s)", job.name),
                        LogLevel::Error,
                    );
                    job.link.set_state(SessionState::Unsubscribed);
                    break;
                }
                delay = retry_delay(&job.retry, failures);
            }
        }
    }
}
