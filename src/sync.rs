use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::acapi::{CatalogProblem, JudgeApi, JudgeSubmission};
use crate::acdb::Db;
use crate::error::BotError;
use crate::models::{Problem, Submission};

/// What a full `sync_all_users` pass did, for the caller to log.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub users: usize,
    pub synced: usize,
    pub failed: usize,
    pub inserted: usize,
}

/// Converts judge API responses into internal records and merges them via
/// idempotent writes. Sole writer of Submission and Problem rows.
pub struct SyncEngine<C> {
    client: Arc<C>,
    db: Db,
}

impl<C: JudgeApi> SyncEngine<C> {
    pub fn new(client: Arc<C>, db: Db) -> Self {
        Self { client, db }
    }

    /// Fetches the catalog and the difficulty estimates, merges them, and
    /// bulk-upserts the result. The two fetches are deliberately coupled: a
    /// difficulty failure aborts the whole pass (title data included) until
    /// the next cycle, so the store never sees a half-merged catalog state.
    pub async fn sync_catalog(&self) -> Result<usize, BotError> {
        let catalog = self.client.fetch_catalog().await?;
        let difficulties = self.client.fetch_difficulties().await?;

        let problems = merge_catalog(catalog, &difficulties);
        let count = self.db.upsert_problems(&problems)?;

        log::info!("[sync_catalog] Upserted {count} problems.");
        Ok(count)
    }

    /// Incrementally syncs one identity's submissions.
    ///
    /// The resumption instant is re-derived from the store on every call
    /// (`max(submitted_at)`), never cached, so it can't drift from reality.
    /// Inserts are conflict-skip on the judge-assigned id; zero new rows is
    /// a normal outcome.
    pub async fn sync_user(&self, discord_id: &str, handle: &str) -> Result<usize, BotError> {
        let since = self.db.latest_submission_time(discord_id)?;
        let fetched = self.client.fetch_submissions(handle, since).await?;
        if fetched.is_empty() {
            return Ok(0);
        }

        let synced_at = Utc::now();
        let records: Vec<Submission> = fetched
            .into_iter()
            .map(|raw| to_submission(raw, discord_id, synced_at))
            .collect();

        let inserted = self.db.insert_submissions(&records)?;
        Ok(inserted)
    }

    /// Syncs every registered user. One user's failure is logged and never
    /// blocks the rest; the upstream's minimum request interval is honored
    /// between users.
    pub async fn sync_all_users(&self) -> Result<SyncOutcome, BotError> {
        let users = self.db.query_all_users()?;
        let mut outcome = SyncOutcome {
            users: users.len(),
            ..SyncOutcome::default()
        };

        for (i, user) in users.iter().enumerate() {
            match self.sync_user(&user.discord_id, &user.handle).await {
                Ok(inserted) => {
                    outcome.synced += 1;
                    outcome.inserted += inserted;
                    if inserted > 0 {
                        log::info!(
                            "[sync_all_users] Synced {inserted} new submissions for {}.",
                            user.handle
                        );
                    }
                }
                Err(err) => {
                    outcome.failed += 1;
                    log::error!("[sync_all_users] Sync failed for {}: {err}", user.handle);
                }
            }

            if i + 1 < users.len() {
                tokio::time::sleep(self.client.min_request_interval()).await;
            }
        }

        Ok(outcome)
    }
}

/// Maps a judge record onto the caller-provided identity. The handle the
/// judge embeds in the payload is ignored on purpose.
fn to_submission(raw: JudgeSubmission, discord_id: &str, synced_at: DateTime<Utc>) -> Submission {
    Submission {
        id: raw.id,
        discord_id: discord_id.to_string(),
        problem_id: raw.problem_id,
        contest_id: (!raw.contest_id.is_empty()).then_some(raw.contest_id),
        result: raw.result,
        point: raw.point,
        language: raw.language,
        submitted_at: DateTime::from_timestamp(raw.epoch_second, 0).unwrap_or_default(),
        synced_at,
    }
}

fn merge_catalog(catalog: Vec<CatalogProblem>, difficulties: &HashMap<String, i64>) -> Vec<Problem> {
    catalog
        .into_iter()
        .map(|entry| Problem {
            difficulty: difficulties.get(&entry.id).copied(),
            contest_id: (!entry.contest_id.is_empty()).then_some(entry.contest_id),
            problem_id: entry.id,
            title: entry.title,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::models::Contest;

    /// In-memory judge double. `fail_handles` answer with an upstream error.
    #[derive(Default)]
    struct FakeJudge {
        submissions: Mutex<Vec<JudgeSubmission>>,
        catalog: Vec<CatalogProblem>,
        difficulties: Option<HashMap<String, i64>>,
        fail_handles: Vec<String>,
        calls: Mutex<Vec<(String, Option<i64>)>>,
    }

    impl FakeJudge {
        fn push_submission(&self, raw: JudgeSubmission) {
            self.submissions.lock().unwrap().push(raw);
        }
    }

    #[async_trait]
    impl JudgeApi for FakeJudge {
        async fn fetch_upcoming_contests(&self) -> Result<Vec<Contest>, BotError> {
            Ok(Vec::new())
        }

        async fn fetch_catalog(&self) -> Result<Vec<CatalogProblem>, BotError> {
            Ok(self.catalog.clone())
        }

        async fn fetch_difficulties(&self) -> Result<HashMap<String, i64>, BotError> {
            self.difficulties
                .clone()
                .ok_or_else(|| BotError::Transport(String::from("connection reset")))
        }

        async fn fetch_submissions(
            &self,
            handle: &str,
            since: Option<DateTime<Utc>>,
        ) -> Result<Vec<JudgeSubmission>, BotError> {
            self.calls
                .lock()
                .unwrap()
                .push((handle.to_string(), since.map(|t| t.timestamp())));

            if self.fail_handles.iter().any(|h| h == handle) {
                return Err(BotError::Upstream(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                ));
            }

            let cutoff = since.map(|t| t.timestamp());
            Ok(self
                .submissions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| cutoff.is_none_or(|c| s.epoch_second >= c))
                .cloned()
                .collect())
        }

        fn min_request_interval(&self) -> Duration {
            Duration::ZERO
        }
    }

    fn raw_submission(id: i64, epoch_second: i64, problem_id: &str) -> JudgeSubmission {
        JudgeSubmission {
            id,
            epoch_second,
            problem_id: problem_id.to_string(),
            contest_id: String::from("abc300"),
            user_id: String::from("someone_else"),
            language: String::from("Rust (rustc 1.70.0)"),
            point: 100.0,
            length: 256,
            result: String::from("AC"),
            execution_time: Some(17),
        }
    }

    fn test_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[tokio::test]
    async fn incremental_sync_resumes_from_latest_stored_timestamp() {
        let judge = Arc::new(FakeJudge::default());
        judge.push_submission(raw_submission(1, 1_000, "abc300_a"));
        judge.push_submission(raw_submission(2, 2_000, "abc300_b"));

        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        let engine = SyncEngine::new(Arc::clone(&judge), db.clone());

        // First pass has no cursor: bounded full-history mode.
        assert_eq!(engine.sync_user("100", "alice").await.unwrap(), 2);

        // A new record appears upstream; the second pass must resume from
        // t=2000 and add exactly the new row.
        judge.push_submission(raw_submission(3, 3_000, "abc300_c"));
        assert_eq!(engine.sync_user("100", "alice").await.unwrap(), 1);

        let calls = judge.calls.lock().unwrap().clone();
        assert_eq!(calls[0], (String::from("alice"), None));
        assert_eq!(calls[1], (String::from("alice"), Some(2_000)));

        assert_eq!(
            db.latest_submission_time("100").unwrap(),
            Some(Utc.timestamp_opt(3_000, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn overlapping_refetch_inserts_nothing_new() {
        let judge = Arc::new(FakeJudge::default());
        judge.push_submission(raw_submission(1, 1_000, "abc300_a"));
        judge.push_submission(raw_submission(2, 2_000, "abc300_b"));

        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        let engine = SyncEngine::new(judge, db);

        assert_eq!(engine.sync_user("100", "alice").await.unwrap(), 2);
        // The boundary record at the cursor is re-fetched but skipped.
        assert_eq!(engine.sync_user("100", "alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn caller_identity_wins_over_payload_identity() {
        let judge = Arc::new(FakeJudge::default());
        judge.push_submission(raw_submission(1, 1_000, "abc300_a"));

        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        let engine = SyncEngine::new(judge, db.clone());
        engine.sync_user("100", "alice").await.unwrap();

        let stored = db.query_submission(1).unwrap().unwrap();
        assert_eq!(stored.discord_id, "100");
    }

    #[tokio::test]
    async fn one_failing_user_does_not_block_the_rest() {
        let judge = Arc::new(FakeJudge {
            fail_handles: vec![String::from("bob")],
            ..FakeJudge::default()
        });
        judge.push_submission(raw_submission(1, 1_000, "abc300_a"));

        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        db.upsert_user("200", "bob").unwrap();
        db.upsert_user("300", "carol").unwrap();

        let engine = SyncEngine::new(Arc::clone(&judge), db);
        let outcome = engine.sync_all_users().await.unwrap();

        assert_eq!(outcome.users, 3);
        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.failed, 1);

        // All three were attempted, bob included.
        let calls = judge.calls.lock().unwrap();
        let handles: Vec<&str> = calls.iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(handles, ["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn empty_user_set_is_a_successful_noop() {
        let engine = SyncEngine::new(Arc::new(FakeJudge::default()), test_db());
        let outcome = engine.sync_all_users().await.unwrap();
        assert_eq!(outcome.users, 0);
        assert_eq!(outcome.inserted, 0);
    }

    #[tokio::test]
    async fn catalog_sync_merges_difficulties_where_known() {
        let judge = Arc::new(FakeJudge {
            catalog: vec![
                CatalogProblem {
                    id: String::from("abc300_a"),
                    contest_id: String::from("abc300"),
                    title: String::from("A. Example"),
                },
                CatalogProblem {
                    id: String::from("abc300_b"),
                    contest_id: String::from("abc300"),
                    title: String::from("B. Harder"),
                },
            ],
            difficulties: Some(HashMap::from([(String::from("abc300_b"), 1_450)])),
            ..FakeJudge::default()
        });

        let db = test_db();
        let engine = SyncEngine::new(judge, db.clone());
        assert_eq!(engine.sync_catalog().await.unwrap(), 2);

        assert_eq!(db.query_problem("abc300_a").unwrap().unwrap().difficulty, None);
        assert_eq!(
            db.query_problem("abc300_b").unwrap().unwrap().difficulty,
            Some(1_450)
        );
    }

    #[tokio::test]
    async fn difficulty_fetch_failure_aborts_the_whole_catalog_sync() {
        let judge = Arc::new(FakeJudge {
            catalog: vec![CatalogProblem {
                id: String::from("abc300_a"),
                contest_id: String::from("abc300"),
                title: String::from("A. Example"),
            }],
            difficulties: None,
            ..FakeJudge::default()
        });

        let db = test_db();
        let engine = SyncEngine::new(judge, db.clone());

        assert!(matches!(
            engine.sync_catalog().await,
            Err(BotError::Transport(_))
        ));
        // The otherwise-good title data was discarded with it.
        assert!(db.query_problem("abc300_a").unwrap().is_none());
    }
}
