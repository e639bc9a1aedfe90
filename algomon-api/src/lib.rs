//! algomon-api
//!
//! Client for the QuantConnect REST API (v2) as far as the monitor needs it:
//! authentication check, project and backtest listings, and reading a single
//! backtest with its result. [`ApiClient`] implements
//! [`ResultApi`](algomon_core::ResultApi) so it can back API sessions.
//!
//! Every request is authenticated with HTTP basic auth: the user id as user
//! name and, as password, the hex SHA-256 of `"{token}:{timestamp}"`. The
//! timestamp travels in the `Timestamp` header; the API rejects stale ones, so
//! the hash is computed fresh per request.
#![warn(missing_docs)]

pub mod contracts;

use algomon_core::{
    ApiConfig, BacktestSnapshot, MonitorError, ResultApi, ResultSerializer, SerializerConfig,
};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

pub use contracts::{Backtest, Project, RestResponse};
use contracts::{BacktestList, ProjectList};

const TIMESTAMP_HEADER: &str = "Timestamp";

/// Password for one request: hex SHA-256 of `"{token}:{timestamp}"`.
#[must_use]
pub fn secure_hash(token: &str, timestamp: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{token}:{timestamp}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Authenticated client of the results API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    user_id: String,
    token: String,
    serializer: ResultSerializer,
}

impl ApiClient {
    /// Build a client from `config`, decoding results with the default rules.
    ///
    /// # Errors
    /// `InvalidArg` if the base URL does not parse, `Http` if the HTTP client
    /// cannot be set up.
    pub fn new(config: ApiConfig) -> Result<Self, MonitorError> {
        Self::with_serializer(config, SerializerConfig::default())
    }

    /// Build a client decoding results with `serializer`.
    ///
    /// # Errors
    /// See [`new`](Self::new).
    pub fn with_serializer(
        config: ApiConfig,
        serializer: SerializerConfig,
    ) -> Result<Self, MonitorError> {
        // Without the trailing slash `join` would replace the last segment.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| MonitorError::InvalidArg(format!("base url '{}': {e}", config.base_url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| MonitorError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base,
            user_id: config.user_id,
            token: config.token,
            serializer: ResultSerializer::new(serializer),
        })
    }

    /// Check the credentials.
    ///
    /// # Errors
    /// `Api` if the credentials are rejected, `Http` on transport failures.
    pub async fn authenticate(&self) -> Result<(), MonitorError> {
        self.get::<RestResponse>("authenticate", &[]).await.map(|_| ())
    }

    /// Projects of the authenticated user.
    ///
    /// # Errors
    /// `Api` if the request is rejected, `Http` on transport failures and
    /// `Data` for unexpected response shapes.
    pub async fn read_projects(&self) -> Result<Vec<Project>, MonitorError> {
        Ok(self.get::<ProjectList>("projects/read", &[]).await?.projects)
    }

    /// Backtests of a project, without their results.
    ///
    /// # Errors
    /// See [`read_projects`](Self::read_projects).
    pub async fn read_backtests(&self, project_id: i64) -> Result<Vec<Backtest>, MonitorError> {
        let project = project_id.to_string();
        Ok(self
            .get::<BacktestList>("backtests/read", &[("projectId", project.as_str())])
            .await?
            .backtests)
    }

    /// One backtest including its result.
    ///
    /// # Errors
    /// See [`read_projects`](Self::read_projects).
    pub async fn read_backtest(
        &self,
        project_id: i64,
        backtest_id: &str,
    ) -> Result<Backtest, MonitorError> {
        let project = project_id.to_string();
        self.get::<Backtest>(
            "backtests/read",
            &[("projectId", project.as_str()), ("backtestId", backtest_id)],
        )
        .await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MonitorError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| MonitorError::InvalidArg(format!("path '{path}': {e}")))?;
        let timestamp = chrono::Utc::now().timestamp();

        #[cfg(feature = "tracing")]
        tracing::debug!(target = "algomon::api", %url, "api request");
        let response = self
            .http
            .get(url)
            .query(query)
            .basic_auth(&self.user_id, Some(secure_hash(&self.token, timestamp)))
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .send()
            .await
            .map_err(|e| MonitorError::Http(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::Http(format!("{status}: {e}")))?;

        let envelope: RestResponse = serde_json::from_value(body.clone())
            .map_err(|e| MonitorError::Data(e.to_string()))?;
        if !envelope.success {
            return Err(MonitorError::Api {
                errors: envelope.errors,
            });
        }
        if !status.is_success() {
            return Err(MonitorError::Http(status.to_string()));
        }

        // Newer API versions nest the backtest under its own member.
        let body = match body {
            Value::Object(mut obj) if obj.get("backtest").is_some_and(Value::is_object) => {
                obj.remove("backtest").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(body).map_err(|e| MonitorError::Data(e.to_string()))
    }
}

#[async_trait]
impl ResultApi for ApiClient {
    async fn read_backtest(
        &self,
        project_id: i64,
        backtest_id: &str,
    ) -> Result<BacktestSnapshot, MonitorError> {
        let backtest = Self::read_backtest(self, project_id, backtest_id).await?;
        let result = match backtest.result {
            Some(Value::Null) | None => None,
            Some(doc) => Some(self.serializer.deserialize_value(doc)?),
        };
        Ok(BacktestSnapshot {
            name: backtest.name,
            project: None,
            progress: backtest.progress,
            completed: backtest.completed,
            result,
        })
    }
}
