use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::BotError;
use crate::models::Contest;

pub mod client;
pub use client::AtcoderClient;

/// Default base of the AtCoder Problems API.
pub const DEFAULT_BASE_URL: &str = "https://kenkoooo.com/atcoder";

/// A raw submission record as the judge API returns it. The embedded
/// `user_id` is the judge-side handle and is never trusted as an identity;
/// the sync engine always maps records to the caller-provided one.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeSubmission {
    pub id: i64,
    pub epoch_second: i64,
    pub problem_id: String,
    #[serde(default)]
    pub contest_id: String,
    pub user_id: String,
    pub language: String,
    pub point: f64,
    pub length: i64,
    pub result: String,
    pub execution_time: Option<i64>,
}

/// A catalog entry: title and contest only, no rating data.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProblem {
    pub id: String,
    #[serde(default)]
    pub contest_id: String,
    pub title: String,
}

/// Read-only view of the judge's data API.
///
/// Every call may fail with `BotError::Transport` or `BotError::Upstream`;
/// both mean "try again on the next scheduled cycle", never retry inline.
#[async_trait]
pub trait JudgeApi: Send + Sync {
    /// Contests starting within the next few days.
    async fn fetch_upcoming_contests(&self) -> Result<Vec<Contest>, BotError>;

    /// The full problem catalog (titles, no difficulty).
    async fn fetch_catalog(&self) -> Result<Vec<CatalogProblem>, BotError>;

    /// Difficulty estimates by problem id. Experimental or unrated entries
    /// are excluded.
    async fn fetch_difficulties(&self) -> Result<HashMap<String, i64>, BotError>;

    /// Submissions for `handle` at or after `since`. `None` asks for a
    /// bounded recent-history window instead of full history.
    async fn fetch_submissions(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JudgeSubmission>, BotError>;

    /// Minimum pause between consecutive calls to the upstream. The caller's
    /// loop owns the actual sleep, so it controls how many entities are
    /// processed per cycle and can bound total cycle duration.
    fn min_request_interval(&self) -> Duration {
        Duration::from_secs(1)
    }
}
