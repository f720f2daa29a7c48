use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serenity::model::channel::Message;

use crate::acapi::JudgeApi;
use crate::acbot::Handler;
use crate::models::{
    ContestNotifyConfig, DailyProblemConfig, DifficultyColor, WeeklyReportConfig,
};

const MAX_CMD_LENGTH: usize = 16;

struct CommandInstance<'a> {
    handler: &'a Handler,
    msg: &'a Message,
    ctx: &'a serenity::client::Context,
    parameters: &'a [&'a str],
}

pub struct Commands;
impl Commands {
    pub async fn run_command(
        handler: &Handler,
        ctx: &serenity::client::Context,
        msg: &Message,
    ) -> Result<String> {
        // Split the message's content (on whitespace) into:
        // - The command (first token)
        // - Its parameters (all tokens afterwards)

        // Skip the first letter for the command: it's the call token
        let input = String::from(&msg.content[1..]);
        let split_tokens = input.split_whitespace().collect::<Vec<_>>();
        let (&[command], parameters) = split_tokens.split_at(1) else {
            return Err(anyhow!("Empty command, see {}help.", call_token()));
        };

        let cmd = CommandInstance {
            handler,
            msg,
            ctx,
            parameters,
        };

        // Execute the command
        let result: String = match command {
                 "register" => cmd.register().await?,
                    "stats" => cmd.stats().await?,
                 "contests" => cmd.contests().await?,
            "contestnotify" => cmd.contest_notify().await?,
                    "daily" => cmd.daily().await?,
                   "weekly" => cmd.weekly().await?,
                     "help" => Self::get_help(),
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!(
                        "No such command found: {}, see {}help for commands.",
                        command,
                        call_token()
                    ));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

impl CommandInstance<'_> {
    /// Pairs the caller's Discord account with an AtCoder handle, then
    /// kicks off the initial history sync in the background.
    async fn register(&self) -> Result<String> {
        let handle = self
            .parameters
            .first()
            .context("Expected an AtCoder handle, got none.")?
            .to_string();

        // Verify the handle against the judge before storing anything. This
        // is the synchronous part of registration; its failure is the
        // user-visible one.
        self.handler
            .api
            .fetch_submissions(&handle, None)
            .await
            .map_err(|err| anyhow!("Could not look up AtCoder user {handle}: {err}"))?;

        let discord_id = self.msg.author.id.get().to_string();
        self.handler.db.upsert_user(&discord_id, &handle)?;
        log::info!("[register] Registered {discord_id} as {handle}.");

        // Fire-and-forget: the history sync may take a while and nobody
        // awaits it. Outcome goes to the log only. It shares nothing with
        // the periodic sync beyond the store's own idempotent inserts, so
        // racing the 15-minute job for the same identity is fine.
        let engine = Arc::clone(&self.handler.engine);
        let task_handle = handle.clone();
        tokio::spawn(async move {
            match engine.sync_user(&discord_id, &task_handle).await {
                Ok(count) => {
                    log::info!("[register] Initial sync for {task_handle}: {count} submissions.")
                }
                Err(err) => log::error!("[register] Initial sync for {task_handle} failed: {err}"),
            }
        });

        Ok(format!(
            "Registered `{handle}`. Submission history is syncing in the background."
        ))
    }

    async fn stats(&self) -> Result<String> {
        let discord_id = self.msg.author.id.get().to_string();
        let user = self
            .handler
            .db
            .query_user(&discord_id)?
            .with_context(|| format!("You are not registered. Use `{}register <handle>`.", call_token()))?;

        let rows = self.handler.db.solved_by_difficulty(&discord_id)?;
        let total: i64 = rows.iter().map(|(_, count)| count).sum();

        let mut by_color: BTreeMap<DifficultyColor, i64> = BTreeMap::new();
        let mut unknown = 0;
        for (difficulty, count) in rows {
            match difficulty {
                Some(rating) => {
                    *by_color.entry(DifficultyColor::from_rating(rating)).or_default() += count;
                }
                None => unknown += count,
            }
        }

        let mut output = format!(
            "**Stats for {}:**\n\tTotal solved: {total}\n",
            user.handle
        );
        for (color, count) in &by_color {
            output += &format!("\t{color}: {count}\n");
        }
        if unknown > 0 {
            output += &format!("\tUnknown: {unknown}\n");
        }

        Ok(output)
    }

    async fn contests(&self) -> Result<String> {
        let contests = self.handler.api.fetch_upcoming_contests().await?;
        if contests.is_empty() {
            return Ok(String::from("No contests scheduled in the next 7 days."));
        }

        let mut output = String::from("**Upcoming contests:**");
        for contest in &contests {
            output += &format!(
                "\n\t**{}** — {} (UTC)\n\t{}",
                contest.title,
                contest.start_time.format("%Y/%m/%d %H:%M"),
                contest.url()
            );
        }

        Ok(output)
    }

    /// Points contest reminders at the current channel. `contestnotify dm`
    /// additionally attaches the reminder reaction to announcements.
    async fn contest_notify(&self) -> Result<String> {
        let guild_id = self
            .msg
            .guild_id
            .context("This command only works in a server channel.")?
            .get();

        let config = ContestNotifyConfig {
            guild_id,
            channel_id: self.msg.channel_id.get(),
            reminder_dm: self.parameters.first().is_some_and(|p| *p == "dm"),
        };
        self.handler.db.save_contest_notify_config(&config)?;

        self.react_ok().await
    }

    async fn daily(&self) -> Result<String> {
        let get_usage = || format!("Expected usage: `{}daily <min> <max>`", call_token());

        let guild_id = self
            .msg
            .guild_id
            .context("This command only works in a server channel.")?
            .get();

        let min: i64 = self
            .parameters
            .first()
            .with_context(get_usage)?
            .parse()
            .with_context(get_usage)?;
        let max: i64 = self
            .parameters
            .get(1)
            .with_context(get_usage)?
            .parse()
            .with_context(get_usage)?;

        let config = DailyProblemConfig {
            guild_id,
            channel_id: self.msg.channel_id.get(),
            difficulty_min: min,
            difficulty_max: max,
            enabled: true,
        };
        // Range errors are caught before the database sees anything.
        config.validate()?;
        self.handler.db.save_daily_problem_config(&config)?;

        self.react_ok().await
    }

    async fn weekly(&self) -> Result<String> {
        let get_usage = || format!("Expected usage: `{}weekly <on|off>`", call_token());

        let guild_id = self
            .msg
            .guild_id
            .context("This command only works in a server channel.")?
            .get();

        let enabled = match *self.parameters.first().with_context(get_usage)? {
            "on" => true,
            "off" => false,
            _ => return Err(anyhow!(get_usage())),
        };

        let config = WeeklyReportConfig {
            guild_id,
            channel_id: self.msg.channel_id.get(),
            enabled,
            post_day: 1,
        };
        self.handler.db.save_weekly_report_config(&config)?;

        self.react_ok().await
    }

    async fn react_ok(&self) -> Result<String> {
        self.msg
            .react(
                &self.ctx.http,
                serenity::all::ReactionType::Unicode(String::from("✅")),
            )
            .await?;

        Ok(String::from(""))
    }
}

/// Non-async helpers
impl Commands {
    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH
            && regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$")
                .unwrap()
                .is_match(s)
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        let t = call_token();
        format!(
            r#"
**Command List:**
`{t}register <atcoder handle>`:  Pair your Discord account with an AtCoder handle and start syncing.
`{t}stats`:  Show your solved-problem counts by difficulty color.
`{t}contests`:  List contests scheduled in the next 7 days.
`{t}contestnotify [dm]`:  Announce upcoming contests in this channel; `dm` adds the reminder reaction.
`{t}daily <min> <max>`:  Post a daily practice problem in this channel, rated between min and max.
`{t}weekly <on|off>`:  Toggle the weekly leaderboard for this channel.
`{t}help`:  Get information on supported commands
"#,
        )
    }
}

/// Get the call token from the environment (.env file), defaulting to '!'.
pub fn call_token() -> char {
    std::env::var("BOT_CALL_TOKEN")
        .ok()
        .and_then(|token| token.chars().next())
        .unwrap_or('!')
}
