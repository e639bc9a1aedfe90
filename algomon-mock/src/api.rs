use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use algomon_core::{BacktestSnapshot, MonitorError, ResultApi};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// One scripted answer of [`MockApi`].
#[derive(Debug, Clone)]
pub enum ApiStep {
    /// Answer with this snapshot.
    Return(BacktestSnapshot),
    /// Fail with this error.
    Fail(MonitorError),
    /// Never answer (simulate a stalled request).
    Hang,
}

/// Results API replaying a script.
///
/// Each `read_backtest` call consumes one step; once the script is exhausted
/// the last step is repeated.
#[derive(Default)]
pub struct MockApi {
    script: Mutex<VecDeque<ApiStep>>,
    last: Mutex<Option<ApiStep>>,
    calls: AtomicUsize,
}

impl MockApi {
    /// An API answering with `steps` in order.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = ApiStep>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of `read_backtest` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultApi for MockApi {
    async fn read_backtest(
        &self,
        _project_id: i64,
        _backtest_id: &str,
    ) -> Result<BacktestSnapshot, MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let next = self.script.lock().await.pop_front();
            let mut last = self.last.lock().await;
            if let Some(s) = next {
                *last = Some(s);
            }
            last.clone()
        };
        match step {
            Some(ApiStep::Return(s)) => Ok(s),
            Some(ApiStep::Fail(e)) => Err(e),
            Some(ApiStep::Hang) => std::future::pending().await,
            None => Err(MonitorError::Other("mock api has no script".to_string())),
        }
    }
}
