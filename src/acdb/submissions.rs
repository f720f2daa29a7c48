use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::acdb::{DBResult, Db, datetime_from_epoch};
use crate::models::{self, ACCEPTED};

/////*============== SUBMISSION QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Submission {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            discord_id: row.get("discord_id")?,
            problem_id: row.get("problem_id")?,
            contest_id: row.get("contest_id")?,
            result: row.get("result")?,
            point: row.get("point")?,
            language: row.get("language")?,
            submitted_at: datetime_from_epoch(row.get("submitted_at")?),
            synced_at: datetime_from_epoch(row.get("synced_at")?),
        })
    }
}

impl Db {
    /// Bulk-inserts submissions, silently skipping ids that are already
    /// stored. Already-seen rows are never overwritten, so re-delivery of
    /// overlapping batches is safe. Returns how many rows were actually new.
    pub fn insert_submissions(&self, submissions: &[models::Submission]) -> DBResult<usize> {
        if submissions.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO Submissions
                    ( id,  discord_id,  problem_id,  contest_id,  result,
                      point,  language,  submitted_at,  synced_at)
                 VALUES
                    (:id, :discord_id, :problem_id, :contest_id, :result,
                     :point, :language, :submitted_at, :synced_at)
                 ON CONFLICT (id) DO NOTHING",
            )?;

            for submission in submissions {
                inserted += stmt.execute(rusqlite::named_params! {
                    ":id": submission.id,
                    ":discord_id": submission.discord_id,
                    ":problem_id": submission.problem_id,
                    ":contest_id": submission.contest_id,
                    ":result": submission.result,
                    ":point": submission.point,
                    ":language": submission.language,
                    ":submitted_at": submission.submitted_at.timestamp(),
                    ":synced_at": submission.synced_at.timestamp(),
                })?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    pub fn query_submission(&self, id: i64) -> DBResult<Option<models::Submission>> {
        self.lock()
            .prepare("SELECT * FROM Submissions WHERE id = :id")?
            .query(rusqlite::named_params! { ":id": id })?
            .next()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// The identity's sync cursor: `max(submitted_at)` over its stored
    /// submissions. `None` means nothing has been synced yet, so the next
    /// fetch runs in bounded full-history mode.
    pub fn latest_submission_time(&self, discord_id: &str) -> DBResult<Option<DateTime<Utc>>> {
        let latest: Option<i64> = self.lock().query_row(
            "SELECT MAX(submitted_at) FROM Submissions WHERE discord_id = :discord_id",
            rusqlite::named_params! { ":discord_id": discord_id },
            |row| row.get(0),
        )?;

        Ok(latest.map(datetime_from_epoch))
    }

    /// Distinct-problem AC counts per registered identity inside
    /// `[start, end)`, ranked descending.
    pub fn weekly_ac_counts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DBResult<Vec<models::WeeklyStanding>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT s.discord_id, u.handle, COUNT(DISTINCT s.problem_id) AS ac_count
             FROM Submissions s
             JOIN Users u ON u.discord_id = s.discord_id
             WHERE s.result = :accepted
               AND s.submitted_at >= :start
               AND s.submitted_at < :end
             GROUP BY s.discord_id, u.handle
             ORDER BY ac_count DESC",
        )?;

        let standings = stmt
            .query_map(
                rusqlite::named_params! {
                    ":accepted": ACCEPTED,
                    ":start": start.timestamp(),
                    ":end": end.timestamp(),
                },
                |row| {
                    Ok(models::WeeklyStanding {
                        discord_id: row.get("discord_id")?,
                        handle: row.get("handle")?,
                        ac_count: row.get("ac_count")?,
                        by_color: BTreeMap::new(),
                        unknown: 0,
                    })
                },
            )?
            .collect::<DBResult<Vec<models::WeeklyStanding>>>()?;

        Ok(standings)
    }

    /// Distinct-problem AC counts for one identity inside `[start, end)`,
    /// grouped by the problem's raw difficulty (NULL when unrated).
    pub fn ac_count_by_difficulty(
        &self,
        discord_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DBResult<Vec<(Option<i64>, i64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT p.difficulty, COUNT(DISTINCT s.problem_id) AS ac_count
             FROM Submissions s
             LEFT JOIN Problems p ON p.problem_id = s.problem_id
             WHERE s.discord_id = :discord_id
               AND s.result = :accepted
               AND s.submitted_at >= :start
               AND s.submitted_at < :end
             GROUP BY p.difficulty",
        )?;

        let rows = stmt
            .query_map(
                rusqlite::named_params! {
                    ":discord_id": discord_id,
                    ":accepted": ACCEPTED,
                    ":start": start.timestamp(),
                    ":end": end.timestamp(),
                },
                |row| Ok((row.get("difficulty")?, row.get("ac_count")?)),
            )?
            .collect::<DBResult<Vec<(Option<i64>, i64)>>>()?;

        Ok(rows)
    }

    /// All-time distinct-problem AC counts for one identity, grouped by raw
    /// difficulty. Backs the stats command.
    pub fn solved_by_difficulty(&self, discord_id: &str) -> DBResult<Vec<(Option<i64>, i64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT p.difficulty, COUNT(DISTINCT s.problem_id) AS ac_count
             FROM Submissions s
             LEFT JOIN Problems p ON p.problem_id = s.problem_id
             WHERE s.discord_id = :discord_id
               AND s.result = :accepted
             GROUP BY p.difficulty",
        )?;

        let rows = stmt
            .query_map(
                rusqlite::named_params! {
                    ":discord_id": discord_id,
                    ":accepted": ACCEPTED,
                },
                |row| Ok((row.get("difficulty")?, row.get("ac_count")?)),
            )?
            .collect::<DBResult<Vec<(Option<i64>, i64)>>>()?;

        Ok(rows)
    }
}
