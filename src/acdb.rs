use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub mod configs;
pub mod problems;
pub mod schema;
pub mod submissions;
pub mod users;

pub type DBResult<T> = Result<T, rusqlite::Error>;

/// Timestamps are stored as unix seconds; out-of-range values fall back to
/// the epoch rather than failing the row.
pub(crate) fn datetime_from_epoch(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Handle on the bot's SQLite store. Cheap to clone; all clones share one
/// connection behind a mutex, so concurrent job bodies and the registration
/// background task can use it without further coordination. Write safety
/// across those callers comes from the idempotent upsert / insert-or-skip
/// statements, not from application-level locking.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> DBResult<Self> {
        log::debug!("[Db::open] opening database at {path}");
        Ok(Self::wrap(Connection::open(path)?))
    }

    pub fn open_in_memory() -> DBResult<Self> {
        Ok(Self::wrap(Connection::open_in_memory()?))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Creates all tables if they don't exist yet.
    pub fn initialize(&self) -> DBResult<()> {
        let conn = self.lock();
        for (name, ddl) in schema::ALL {
            log::debug!("[initialize] creating {name} table...");
            conn.execute(ddl, [])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{Problem, Submission};

    fn test_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn submission(id: i64, discord_id: &str, problem_id: &str, ts: i64) -> Submission {
        Submission {
            id,
            discord_id: discord_id.to_string(),
            problem_id: problem_id.to_string(),
            contest_id: Some(String::from("abc300")),
            result: String::from("AC"),
            point: 100.0,
            language: String::from("Rust (rustc 1.70.0)"),
            submitted_at: Utc.timestamp_opt(ts, 0).unwrap(),
            synced_at: Utc.timestamp_opt(ts + 60, 0).unwrap(),
        }
    }

    #[test]
    fn duplicate_submission_ids_are_skipped_and_fields_preserved() {
        let db = test_db();
        db.upsert_user("100", "alice").unwrap();

        let original = submission(1, "100", "abc300_a", 1_700_000_000);
        assert_eq!(db.insert_submissions(&[original.clone()]).unwrap(), 1);

        // Same id with different field values: the original must win.
        let mut altered = original.clone();
        altered.result = String::from("WA");
        altered.point = 0.0;
        assert_eq!(db.insert_submissions(&[altered]).unwrap(), 0);

        let stored = db.query_submission(1).unwrap().unwrap();
        assert_eq!(stored.result, "AC");
        assert_eq!(stored.point, 100.0);
        assert_eq!(stored.submitted_at, original.submitted_at);
    }

    #[test]
    fn latest_submission_time_is_max_over_stored_rows() {
        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        assert_eq!(db.latest_submission_time("100").unwrap(), None);

        db.insert_submissions(&[
            submission(1, "100", "abc300_a", 1_000),
            submission(2, "100", "abc300_b", 3_000),
            submission(3, "100", "abc300_c", 2_000),
        ])
        .unwrap();

        assert_eq!(
            db.latest_submission_time("100").unwrap(),
            Some(Utc.timestamp_opt(3_000, 0).unwrap())
        );
    }

    #[test]
    fn problem_upsert_refines_difficulty_and_keeps_title() {
        let db = test_db();

        let without_difficulty = Problem {
            problem_id: String::from("abc300_a"),
            contest_id: Some(String::from("abc300")),
            title: String::from("A. Example"),
            difficulty: None,
        };
        db.upsert_problems(std::slice::from_ref(&without_difficulty))
            .unwrap();

        let with_difficulty = Problem {
            difficulty: Some(950),
            ..without_difficulty
        };
        db.upsert_problems(&[with_difficulty]).unwrap();

        let stored = db.query_problem("abc300_a").unwrap().unwrap();
        assert_eq!(stored.title, "A. Example");
        assert_eq!(stored.difficulty, Some(950));
    }

    #[test]
    fn user_upsert_overwrites_handle() {
        let db = test_db();
        db.upsert_user("100", "alice").unwrap();
        db.upsert_user("100", "alice_renamed").unwrap();

        let users = db.query_all_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].handle, "alice_renamed");
    }

    #[test]
    fn weekly_ac_counts_exclude_window_end() {
        let db = test_db();
        db.upsert_user("100", "alice").unwrap();

        let start = Utc.timestamp_opt(1_000_000, 0).unwrap();
        let end = Utc.timestamp_opt(2_000_000, 0).unwrap();

        let mut inside = submission(1, "100", "abc300_a", 1_500_000);
        inside.result = String::from("AC");
        // Exactly at the window end: must not count.
        let at_end = submission(2, "100", "abc300_b", 2_000_000);
        // Same problem solved twice: distinct problems only.
        let duplicate_problem = submission(3, "100", "abc300_a", 1_600_000);
        db.insert_submissions(&[inside, at_end, duplicate_problem])
            .unwrap();

        let standings = db.weekly_ac_counts(start, end).unwrap();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].handle, "alice");
        assert_eq!(standings[0].ac_count, 1);
    }
}
