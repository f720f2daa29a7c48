use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::acapi::{CatalogProblem, JudgeApi, JudgeSubmission};
use crate::error::BotError;
use crate::models::Contest;

const USER_AGENT: &str = "shojinbot/0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How many records an initial (cursor-less) history fetch is allowed to
/// bring back.
const FULL_HISTORY_LIMIT: usize = 100;

/// How far ahead the contest listing looks.
const UPCOMING_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct ContestResponse {
    id: String,
    start_epoch_second: i64,
    duration_second: i64,
    title: String,
    #[serde(default)]
    rate_change: String,
}

#[derive(Debug, Deserialize)]
struct ProblemModel {
    difficulty: Option<i64>,
    #[serde(default)]
    is_experimental: bool,
}

/// Rate-limited client over the AtCoder Problems API.
pub struct AtcoderClient {
    base_url: String,
    http: reqwest::Client,
}

impl AtcoderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BotError> {
        let url = format!("{}{}", self.base_url, path);
        log::trace!("[acapi] GET {url}");

        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|err| BotError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Upstream(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| BotError::Transport(err.to_string()))
    }
}

#[async_trait]
impl JudgeApi for AtcoderClient {
    async fn fetch_upcoming_contests(&self) -> Result<Vec<Contest>, BotError> {
        let raw: Vec<ContestResponse> = self.get_json("/atcoder-api/v3/contests").await?;

        let now = Utc::now();
        let horizon = now + TimeDelta::days(UPCOMING_WINDOW_DAYS);

        let contests = raw
            .into_iter()
            .filter_map(|c| {
                let start_time = DateTime::from_timestamp(c.start_epoch_second, 0)?;
                (start_time > now && start_time < horizon).then(|| Contest {
                    rated_range: format_rated_range(&c.rate_change),
                    id: c.id,
                    title: c.title,
                    start_time,
                    duration: TimeDelta::seconds(c.duration_second),
                })
            })
            .collect();

        Ok(contests)
    }

    async fn fetch_catalog(&self) -> Result<Vec<CatalogProblem>, BotError> {
        self.get_json("/resources/problems.json").await
    }

    async fn fetch_difficulties(&self) -> Result<HashMap<String, i64>, BotError> {
        let raw: HashMap<String, ProblemModel> =
            self.get_json("/resources/problem-models.json").await?;

        Ok(raw
            .into_iter()
            .filter_map(|(problem_id, model)| match model.difficulty {
                Some(difficulty) if !model.is_experimental => Some((problem_id, difficulty)),
                _ => None,
            })
            .collect())
    }

    async fn fetch_submissions(
        &self,
        handle: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JudgeSubmission>, BotError> {
        let from_second = since.map(|t| t.timestamp()).unwrap_or(0);
        let path = format!(
            "/atcoder-api/v3/user/submissions?user={handle}&from_second={from_second}"
        );

        let mut submissions: Vec<JudgeSubmission> = self.get_json(&path).await?;

        // A cursor-less call asks for the bounded recent-history window, not
        // the user's entire past.
        if since.is_none() && submissions.len() > FULL_HISTORY_LIMIT {
            submissions.sort_by_key(|s| std::cmp::Reverse(s.epoch_second));
            submissions.truncate(FULL_HISTORY_LIMIT);
        }

        Ok(submissions)
    }
}

/// Renders AtCoder's `rate_change` field ("-", " ~ 1999", "1200 ~ ") into a
/// short human-readable label.
fn format_rated_range(rate_change: &str) -> String {
    if rate_change.is_empty() || rate_change == "-" {
        return String::from("Unrated");
    }

    let digits = regex::Regex::new(r"\d+").unwrap();
    let numbers: Vec<&str> = digits.find_iter(rate_change).map(|m| m.as_str()).collect();

    match numbers.as_slice() {
        [] => String::from("All"),
        [upper] => format!("~ {upper}"),
        [lower, upper, ..] => format!("{lower} ~ {upper}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rated_range_formatting() {
        assert_eq!(format_rated_range("-"), "Unrated");
        assert_eq!(format_rated_range(""), "Unrated");
        assert_eq!(format_rated_range("All"), "All");
        assert_eq!(format_rated_range(" ~ 1999"), "~ 1999");
        assert_eq!(format_rated_range("1200 ~ 2799"), "1200 ~ 2799");
    }
}
