use chrono::Utc;

use crate::acdb::{DBResult, Db, datetime_from_epoch};
use crate::models;

/////*============== USER QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::User {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            discord_id: row.get("discord_id")?,
            handle: row.get("handle")?,
            created_at: datetime_from_epoch(row.get("created_at")?),
            updated_at: datetime_from_epoch(row.get("updated_at")?),
        })
    }
}

impl Db {
    /// Creates the user, or overwrites the handle if the Discord id is
    /// already registered. At most one handle per identity.
    pub fn upsert_user(&self, discord_id: &str, handle: &str) -> DBResult<()> {
        log::trace!("[upsert_user] Registering {discord_id} as {handle}...");
        let now = Utc::now().timestamp();

        self.lock()
            .prepare(
                "INSERT INTO Users ( discord_id,  handle,  created_at,  updated_at)
                 VALUES            (:discord_id, :handle, :created_at, :updated_at)
                 ON CONFLICT (discord_id) DO UPDATE SET
                     handle = excluded.handle,
                     updated_at = excluded.updated_at",
            )?
            .execute(rusqlite::named_params! {
                ":discord_id": discord_id,
                ":handle": handle,
                ":created_at": now,
                ":updated_at": now,
            })?;

        Ok(())
    }

    /// Returns the registered user for `discord_id`, if any.
    pub fn query_user(&self, discord_id: &str) -> DBResult<Option<models::User>> {
        self.lock()
            .prepare("SELECT * FROM Users WHERE discord_id = :discord_id")?
            .query(rusqlite::named_params! { ":discord_id": discord_id })?
            .next()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Gathers every registered user.
    pub fn query_all_users(&self) -> DBResult<Vec<models::User>> {
        log::trace!("[query_all_users] Querying all registered users.");

        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM Users ORDER BY created_at DESC")?;

        let users = stmt
            .query_map([], |row| models::User::try_from(row))?
            .collect::<DBResult<Vec<models::User>>>()?;

        Ok(users)
    }
}
