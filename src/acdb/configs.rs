use crate::acdb::{DBResult, Db};
use crate::models;

/////*============== NOTIFICATION CONFIG QUERIES ==============*/
//
// Each config is a singleton per guild: saving overwrites the existing row,
// it never duplicates.

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ContestNotifyConfig {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            guild_id: row.get::<_, i64>("guild_id")? as u64,
            channel_id: row.get::<_, i64>("channel_id")? as u64,
            reminder_dm: row.get("reminder_dm")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::DailyProblemConfig {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            guild_id: row.get::<_, i64>("guild_id")? as u64,
            channel_id: row.get::<_, i64>("channel_id")? as u64,
            difficulty_min: row.get("difficulty_min")?,
            difficulty_max: row.get("difficulty_max")?,
            enabled: row.get("enabled")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::WeeklyReportConfig {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            guild_id: row.get::<_, i64>("guild_id")? as u64,
            channel_id: row.get::<_, i64>("channel_id")? as u64,
            enabled: row.get("enabled")?,
            post_day: row.get::<_, i64>("post_day")? as u8,
        })
    }
}

impl Db {
    pub fn save_contest_notify_config(
        &self,
        config: &models::ContestNotifyConfig,
    ) -> DBResult<()> {
        log::trace!(
            "[save_contest_notify_config] Saving config for guild {}...",
            config.guild_id
        );

        self.lock()
            .prepare(
                "INSERT INTO ContestNotifyConfigs ( guild_id,  channel_id,  reminder_dm)
                 VALUES                           (:guild_id, :channel_id, :reminder_dm)
                 ON CONFLICT (guild_id) DO UPDATE SET
                     channel_id = excluded.channel_id,
                     reminder_dm = excluded.reminder_dm",
            )?
            .execute(rusqlite::named_params! {
                ":guild_id": config.guild_id as i64,
                ":channel_id": config.channel_id as i64,
                ":reminder_dm": config.reminder_dm,
            })?;

        Ok(())
    }

    pub fn query_contest_notify_configs(&self) -> DBResult<Vec<models::ContestNotifyConfig>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM ContestNotifyConfigs")?;

        let configs = stmt
            .query_map([], |row| models::ContestNotifyConfig::try_from(row))?
            .collect::<DBResult<Vec<models::ContestNotifyConfig>>>()?;

        Ok(configs)
    }

    pub fn save_daily_problem_config(&self, config: &models::DailyProblemConfig) -> DBResult<()> {
        log::trace!(
            "[save_daily_problem_config] Saving config for guild {}...",
            config.guild_id
        );

        self.lock()
            .prepare(
                "INSERT INTO DailyProblemConfigs
                    ( guild_id,  channel_id,  difficulty_min,  difficulty_max,  enabled)
                 VALUES
                    (:guild_id, :channel_id, :difficulty_min, :difficulty_max, :enabled)
                 ON CONFLICT (guild_id) DO UPDATE SET
                     channel_id = excluded.channel_id,
                     difficulty_min = excluded.difficulty_min,
                     difficulty_max = excluded.difficulty_max,
                     enabled = excluded.enabled",
            )?
            .execute(rusqlite::named_params! {
                ":guild_id": config.guild_id as i64,
                ":channel_id": config.channel_id as i64,
                ":difficulty_min": config.difficulty_min,
                ":difficulty_max": config.difficulty_max,
                ":enabled": config.enabled,
            })?;

        Ok(())
    }

    /// The dispatcher only ever reads enabled rows; disabling is a
    /// management action that happens through `save_daily_problem_config`.
    pub fn enabled_daily_problem_configs(&self) -> DBResult<Vec<models::DailyProblemConfig>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM DailyProblemConfigs WHERE enabled = 1")?;

        let configs = stmt
            .query_map([], |row| models::DailyProblemConfig::try_from(row))?
            .collect::<DBResult<Vec<models::DailyProblemConfig>>>()?;

        Ok(configs)
    }

    pub fn save_weekly_report_config(&self, config: &models::WeeklyReportConfig) -> DBResult<()> {
        log::trace!(
            "[save_weekly_report_config] Saving config for guild {}...",
            config.guild_id
        );

        self.lock()
            .prepare(
                "INSERT INTO WeeklyReportConfigs ( guild_id,  channel_id,  enabled,  post_day)
                 VALUES                          (:guild_id, :channel_id, :enabled, :post_day)
                 ON CONFLICT (guild_id) DO UPDATE SET
                     channel_id = excluded.channel_id,
                     enabled = excluded.enabled,
                     post_day = excluded.post_day",
            )?
            .execute(rusqlite::named_params! {
                ":guild_id": config.guild_id as i64,
                ":channel_id": config.channel_id as i64,
                ":enabled": config.enabled,
                ":post_day": config.post_day as i64,
            })?;

        Ok(())
    }

    pub fn enabled_weekly_report_configs(&self) -> DBResult<Vec<models::WeeklyReportConfig>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM WeeklyReportConfigs WHERE enabled = 1")?;

        let configs = stmt
            .query_map([], |row| models::WeeklyReportConfig::try_from(row))?
            .collect::<DBResult<Vec<models::WeeklyReportConfig>>>()?;

        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use crate::acdb::Db;
    use crate::models::{DailyProblemConfig, WeeklyReportConfig};

    fn test_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn config_save_overwrites_instead_of_duplicating() {
        let db = test_db();

        db.save_daily_problem_config(&DailyProblemConfig {
            guild_id: 42,
            channel_id: 1,
            difficulty_min: 0,
            difficulty_max: 800,
            enabled: true,
        })
        .unwrap();
        db.save_daily_problem_config(&DailyProblemConfig {
            guild_id: 42,
            channel_id: 2,
            difficulty_min: 400,
            difficulty_max: 1200,
            enabled: true,
        })
        .unwrap();

        let configs = db.enabled_daily_problem_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].channel_id, 2);
        assert_eq!(configs[0].difficulty_min, 400);
    }

    #[test]
    fn disabled_configs_are_not_visible_to_the_dispatcher() {
        let db = test_db();

        db.save_weekly_report_config(&WeeklyReportConfig {
            guild_id: 7,
            channel_id: 1,
            enabled: true,
            post_day: 1,
        })
        .unwrap();
        db.save_weekly_report_config(&WeeklyReportConfig {
            guild_id: 8,
            channel_id: 2,
            enabled: false,
            post_day: 1,
        })
        .unwrap();

        let configs = db.enabled_weekly_report_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].guild_id, 7);
    }
}
