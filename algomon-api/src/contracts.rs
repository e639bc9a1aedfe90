//! Response shapes of the results API.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope every response carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestResponse {
    /// `false` if the request was rejected.
    #[serde(default)]
    pub success: bool,
    /// Reasons for a rejection.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// A project of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project id.
    #[serde(rename = "projectId")]
    pub project_id: i64,
    /// Project name.
    #[serde(default)]
    pub name: String,
    /// Creation time as sent by the API.
    #[serde(default)]
    pub created: String,
    /// Last modification time as sent by the API.
    #[serde(default)]
    pub modified: String,
}

impl Project {
    /// Creation time, if the API sent a parseable one.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_api_time(&self.created)
    }

    /// Modification time, if the API sent a parseable one.
    #[must_use]
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        parse_api_time(&self.modified)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectList {
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// State of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtest {
    /// Backtest name.
    #[serde(default)]
    pub name: String,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
    /// Backtest id.
    #[serde(rename = "backtestId")]
    pub backtest_id: String,
    /// The backtest finished.
    #[serde(default)]
    pub completed: bool,
    /// Progress in `0..=1`.
    #[serde(default)]
    pub progress: Decimal,
    /// Result document; absent in listings and before the first result.
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BacktestList {
    #[serde(default)]
    pub backtests: Vec<Backtest>,
}

/// Times are sent as `2017-07-12 12:34:56` (UTC) or RFC 3339.
fn parse_api_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}
