use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use algomon_core::stream::{StopSignal, WorkerHandle, stopped};
use algomon_core::{
    FileParams, LogLevel, MonitorError, ResultContext, ResultSerializer, SessionLink,
    SessionState,
};
use rust_decimal::Decimal;

use super::SessionEnv;

/// Reads a result file once and, when subscribed, re-reads it on every change.
///
/// Change detection polls the file's modification time and length. Each
/// detected change redelivers the complete document; the coordinator's merge
/// discards what it has already seen.
#[derive(Debug)]
pub struct FileSession {
    params: FileParams,
    name: String,
    link: SessionLink,
    serializer: ResultSerializer,
    watch_interval: Duration,
    watcher: Option<WorkerHandle>,
}

impl FileSession {
    /// Build a file session; nothing is read until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(params: FileParams, link: SessionLink, env: &SessionEnv) -> Self {
        let name = params
            .path
            .file_name()
            .map_or_else(|| params.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            params,
            name,
            link,
            serializer: env.serializer,
            watch_interval: env.config.watch_interval,
            watcher: None,
        }
    }

    /// File name of the watched document.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current subscription state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.link.state()
    }

    /// Read and deliver the file once; arm the watch if requested.
    ///
    /// # Errors
    /// `FileNotFound` if the file is missing, `FileUnreadable` if it cannot be
    /// read and `InvalidResult` if it is not a result document.
    pub async fn initialize(&mut self) -> Result<(), MonitorError> {
        let ctx = read_context(&self.params.path, &self.name, &self.serializer).await?;
        self.link.deliver(ctx);
        if self.params.watch {
            self.subscribe()?;
        }
        Ok(())
    }

    /// Arm the change watch. Does not re-read the file.
    ///
    /// # Errors
    /// `InvalidArg` if the path cannot be made absolute.
    pub fn subscribe(&mut self) -> Result<(), MonitorError> {
        if self.state().is_subscribed() {
            return Ok(());
        }
        let path = std::path::absolute(&self.params.path).map_err(|e| {
            MonitorError::InvalidArg(format!("{}: {e}", self.params.path.display()))
        })?;
        let baseline = fingerprint_now(&path);
        let (stop, stop_rx) = StopSignal::new();

        self.link.set_state(SessionState::Subscribed);
        let task = tokio::spawn(watch_file(
            path,
            baseline,
            self.name.clone(),
            self.serializer,
            self.watch_interval,
            self.link.worker(),
            stop_rx,
        ));
        if let Some(old) = self.watcher.replace(WorkerHandle::new(task, stop)) {
            old.cancel();
        }
        Ok(())
    }

    /// Stop watching.
    pub fn unsubscribe(&mut self) {
        if let Some(w) = self.watcher.take() {
            w.cancel();
        }
        self.link.set_state(SessionState::Unsubscribed);
    }

    /// Stop watching; the file session holds no other resources.
    ///
    /// # Errors
    /// Never fails.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        self.unsubscribe();
        Ok(())
    }
}

/// Modification time and length; `None` while the file is absent.
type Fingerprint = Option<(Option<SystemTime>, u64)>;

fn fingerprint_now(path: &Path) -> Fingerprint {
    std::fs::metadata(path).ok().map(|m| (m.modified().ok(), m.len()))
}

async fn fingerprint(path: &Path) -> Fingerprint {
    tokio::fs::metadata(path)
        .await
        .ok()
        .map(|m| (m.modified().ok(), m.len()))
}

async fn watch_file(
    path: PathBuf,
    mut last: Fingerprint,
    name: String,
    serializer: ResultSerializer,
    interval: Duration,
    link: SessionLink,
    mut stop_rx: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => break,
            () = tokio::time::sleep(interval) => {}
        }

        let current = fingerprint(&path).await;
        if current == last {
            continue;
        }
        last = current;
        if current.is_none() {
            continue;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(target = "algomon::file", path = %path.display(), "file changed, re-reading");
        match read_context(&path, &name, &serializer).await {
            Ok(ctx) => {
                if !link.deliver(ctx) {
                    break;
                }
            }
            // Writers may be mid-way through the file; the next change retries.
            Err(e) => {
                link.log(format!("Could not reload '{name}': {e}"), LogLevel::Error);
            }
        }
    }
}

async fn read_context(
    path: &Path,
    name: &str,
    serializer: &ResultSerializer,
) -> Result<ResultContext, MonitorError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(MonitorError::file_not_found(path.display().to_string()));
        }
        Err(e) => {
            return Err(MonitorError::file_unreadable(
                path.display().to_string(),
                e.to_string(),
            ));
        }
    };
    let result = serializer.deserialize(&text)?;
    Ok(ResultContext {
        name: name.to_string(),
        project: None,
        result,
        progress: Some(Decimal::ONE),
    })
}
