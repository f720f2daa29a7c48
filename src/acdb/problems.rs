use crate::acdb::{DBResult, Db};
use crate::models;

/////*============== PROBLEM QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Problem {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            problem_id: row.get("problem_id")?,
            contest_id: row.get("contest_id")?,
            title: row.get("title")?,
            difficulty: row.get("difficulty")?,
        })
    }
}

impl Db {
    /// Bulk-upserts the catalog, keyed by problem id. Re-running with
    /// identical data is a no-op in effect; later syncs may refine
    /// `difficulty` once rating data exists.
    pub fn upsert_problems(&self, problems: &[models::Problem]) -> DBResult<usize> {
        if problems.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO Problems ( problem_id,  contest_id,  title,  difficulty)
                 VALUES               (:problem_id, :contest_id, :title, :difficulty)
                 ON CONFLICT (problem_id) DO UPDATE SET
                     contest_id = excluded.contest_id,
                     title = excluded.title,
                     difficulty = excluded.difficulty",
            )?;

            for problem in problems {
                stmt.execute(rusqlite::named_params! {
                    ":problem_id": problem.problem_id,
                    ":contest_id": problem.contest_id,
                    ":title": problem.title,
                    ":difficulty": problem.difficulty,
                })?;
            }
        }
        tx.commit()?;

        Ok(problems.len())
    }

    pub fn query_problem(&self, problem_id: &str) -> DBResult<Option<models::Problem>> {
        self.lock()
            .prepare("SELECT * FROM Problems WHERE problem_id = :problem_id")?
            .query(rusqlite::named_params! { ":problem_id": problem_id })?
            .next()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Problems whose difficulty lies in `[min, max]` inclusive. Unrated
    /// problems never qualify.
    pub fn problems_in_difficulty_range(
        &self,
        min: i64,
        max: i64,
    ) -> DBResult<Vec<models::Problem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM Problems
             WHERE difficulty >= :min AND difficulty <= :max",
        )?;

        let problems = stmt
            .query_map(
                rusqlite::named_params! { ":min": min, ":max": max },
                |row| models::Problem::try_from(row),
            )?
            .collect::<DBResult<Vec<models::Problem>>>()?;

        Ok(problems)
    }
}
