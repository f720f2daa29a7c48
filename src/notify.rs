use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use itertools::Itertools;
use rand::seq::IndexedRandom;

use crate::acapi::JudgeApi;
use crate::acdb::Db;
use crate::error::BotError;
use crate::models::{
    Contest, DailyProblemConfig, DifficultyColor, Problem, WeeklyStanding, format_difficulty,
};

pub mod sink;
pub use sink::{DiscordSink, Embed, EmbedField, MessageSink};

/// Contests starting within this many hours get announced.
pub const CONTEST_LOOKAHEAD_HOURS: i64 = 24;

/// How many identities the weekly leaderboard shows.
const REPORT_TOP_N: usize = 10;

const REMINDER_EMOJI: &str = "👍";

const DAILY_EMBED_COLOR: u32 = 0x3498db;
const REPORT_EMBED_COLOR: u32 = 0x00ff00;

/// Decides what, if anything, must be sent for contests, daily problems,
/// and weekly reports. Read-only over the store; the sole trigger of
/// outbound messages.
pub struct NotificationDispatcher<C, S> {
    client: Arc<C>,
    db: Db,
    sink: S,
}

impl<C: JudgeApi, S: MessageSink> NotificationDispatcher<C, S> {
    pub fn new(client: Arc<C>, db: Db, sink: S) -> Self {
        Self { client, db, sink }
    }

    /// Announces contests starting within the lookahead window to every
    /// guild with a contest-notify config.
    ///
    /// Level-triggered: a contest still inside the window on the next run
    /// is announced again.
    /// TODO: deduplicate with a persisted (guild, contest) marker so each
    /// contest is announced once per guild.
    pub async fn announce_contests(&self) -> Result<(), BotError> {
        let upcoming = self.client.fetch_upcoming_contests().await?;
        let soon = contests_starting_within(
            &upcoming,
            Utc::now(),
            TimeDelta::hours(CONTEST_LOOKAHEAD_HOURS),
        );
        if soon.is_empty() {
            return Ok(());
        }

        let configs = self.db.query_contest_notify_configs()?;
        for config in &configs {
            for contest in &soon {
                let message_id = match self
                    .sink
                    .send_text(config.channel_id, &contest.to_string())
                    .await
                {
                    Ok(id) => id,
                    Err(err) => {
                        log::error!(
                            "[announce_contests] Send failed for guild {}: {err}",
                            config.guild_id
                        );
                        continue;
                    }
                };

                // The reaction is the hand-off point for DM reminders; the
                // emoji-reaction handler takes it from here.
                if config.reminder_dm {
                    if let Err(err) = self
                        .sink
                        .add_reaction(config.channel_id, message_id, REMINDER_EMOJI)
                        .await
                    {
                        log::error!(
                            "[announce_contests] Reaction failed for guild {}: {err}",
                            config.guild_id
                        );
                    }
                }

                log::info!(
                    "[announce_contests] Announced {} to guild {}.",
                    contest.title,
                    config.guild_id
                );
            }
        }

        Ok(())
    }

    /// Posts one uniformly random problem from each enabled config's
    /// difficulty range. No memory of previous picks; repeats happen.
    pub async fn post_daily_problems(&self) -> Result<(), BotError> {
        let configs = self.db.enabled_daily_problem_configs()?;

        for config in &configs {
            if let Err(err) = self.post_daily_problem(config).await {
                log::error!(
                    "[post_daily_problems] Failed for guild {}: {err}",
                    config.guild_id
                );
            }
        }

        Ok(())
    }

    async fn post_daily_problem(&self, config: &DailyProblemConfig) -> Result<(), BotError> {
        let candidates = self
            .db
            .problems_in_difficulty_range(config.difficulty_min, config.difficulty_max)?;

        let Some(problem) = candidates.choose(&mut rand::rng()) else {
            log::warn!(
                "[post_daily_problems] No problems rated {}..={} for guild {}.",
                config.difficulty_min,
                config.difficulty_max,
                config.guild_id
            );
            return Ok(());
        };

        self.sink
            .send_embed(config.channel_id, &daily_problem_embed(problem))
            .await?;
        log::info!(
            "[post_daily_problems] Sent {} to guild {}.",
            problem.problem_id,
            config.guild_id
        );
        Ok(())
    }

    /// Posts the leaderboard for the most recently completed Monday-Monday
    /// week to every enabled guild. A week with zero submissions still
    /// produces a report; it is never skipped.
    pub async fn post_weekly_reports(&self) -> Result<(), BotError> {
        let configs = self.db.enabled_weekly_report_configs()?;
        if configs.is_empty() {
            return Ok(());
        }

        let (start, end) = weekly_window(Utc::now());
        let mut standings = self.db.weekly_ac_counts(start, end)?;
        for standing in &mut standings {
            match self
                .db
                .ac_count_by_difficulty(&standing.discord_id, start, end)
            {
                Ok(rows) => apply_breakdown(standing, &rows),
                Err(err) => log::error!(
                    "[post_weekly_reports] Breakdown failed for {}: {err}",
                    standing.handle
                ),
            }
        }

        let embed = weekly_report_embed(&standings, start, end);
        for config in &configs {
            if let Err(err) = self.sink.send_embed(config.channel_id, &embed).await {
                log::error!(
                    "[post_weekly_reports] Send failed for guild {}: {err}",
                    config.guild_id
                );
                continue;
            }
            log::info!("[post_weekly_reports] Sent report to guild {}.", config.guild_id);
        }

        Ok(())
    }
}

/// The most recently completed Monday 00:00 → Monday 00:00 UTC window
/// relative to `now`. Start inclusive, end exclusive.
pub fn weekly_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let days_into_week = now.weekday().num_days_from_monday() as i64;
    let end = (now.date_naive() - TimeDelta::days(days_into_week))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();

    (end - TimeDelta::days(7), end)
}

/// Contests starting strictly after `now` and strictly inside the window.
/// Already-started contests never qualify.
pub fn contests_starting_within(
    contests: &[Contest],
    now: DateTime<Utc>,
    window: TimeDelta,
) -> Vec<&Contest> {
    let deadline = now + window;
    contests
        .iter()
        .filter(|c| c.start_time > now && c.start_time < deadline)
        .collect()
}

/// Folds raw (difficulty, count) rows into per-color buckets. Rows without
/// a rating land in the unknown bucket, never in a numeric one.
fn apply_breakdown(standing: &mut WeeklyStanding, rows: &[(Option<i64>, i64)]) {
    let mut by_color: BTreeMap<DifficultyColor, i64> = BTreeMap::new();
    let mut unknown = 0;

    for &(difficulty, count) in rows {
        match difficulty {
            Some(rating) => {
                *by_color.entry(DifficultyColor::from_rating(rating)).or_default() += count;
            }
            None => unknown += count,
        }
    }

    standing.by_color = by_color;
    standing.unknown = unknown;
}

fn daily_problem_embed(problem: &Problem) -> Embed {
    Embed {
        title: String::from("📝 Daily problem"),
        description: String::from("Today's pick. Good luck!"),
        color: DAILY_EMBED_COLOR,
        fields: vec![
            EmbedField {
                name: String::from("Problem"),
                value: problem.title.clone(),
                inline: false,
            },
            EmbedField {
                name: String::from("Difficulty"),
                value: format_difficulty(problem.difficulty),
                inline: true,
            },
            EmbedField {
                name: String::from("Link"),
                value: problem.url(),
                inline: true,
            },
        ],
    }
}

fn weekly_report_embed(
    standings: &[WeeklyStanding],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Embed {
    let mut embed = Embed {
        title: String::from("📊 Weekly practice report"),
        description: format!(
            "{} – {}",
            start.format("%m/%d"),
            (end - TimeDelta::days(1)).format("%m/%d")
        ),
        color: REPORT_EMBED_COLOR,
        fields: Vec::new(),
    };

    if standings.is_empty() {
        embed.description += "\n\nNo submissions this week.";
        return embed;
    }

    let mut ranking = String::new();
    for (i, standing) in standings.iter().take(REPORT_TOP_N).enumerate() {
        let rank = i + 1;
        let medal = match rank {
            1 => "🥇",
            2 => "🥈",
            3 => "🥉",
            _ => "🏅",
        };
        ranking += &format!(
            "{medal} **#{rank}** {}: {} AC\n",
            standing.handle, standing.ac_count
        );

        let breakdown = standing
            .by_color
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(color, count)| format!("{color}:{count}"))
            .chain((standing.unknown > 0).then(|| format!("Unknown:{}", standing.unknown)))
            .join(", ");
        if !breakdown.is_empty() {
            ranking += &format!("　({breakdown})\n");
        }
    }

    embed.fields.push(EmbedField {
        name: String::from("Ranking"),
        value: ranking,
        inline: false,
    });

    embed
}
