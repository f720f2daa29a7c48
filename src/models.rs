use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::BotError;

/// Submission result string AtCoder uses for an accepted solution.
pub const ACCEPTED: &str = "AC";

/// A Discord account paired with its AtCoder handle.
/// At most one active handle per Discord id; re-registering overwrites it.
#[derive(Debug, Clone)]
pub struct User {
    pub discord_id: String,
    pub handle: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable submission fact. `id` is assigned by the judge and globally
/// unique, which makes it the natural idempotency key for inserts.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub discord_id: String,
    pub problem_id: String,
    pub contest_id: Option<String>,

    pub result: String,
    pub point: f64,
    pub language: String,

    pub submitted_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

/// A catalog problem. `difficulty` stays absent until the rating data knows
/// about it; later catalog syncs may fill it in.
#[derive(Debug, Clone)]
pub struct Problem {
    pub problem_id: String,
    pub contest_id: Option<String>,
    pub title: String,
    pub difficulty: Option<i64>,
}

impl Problem {
    pub fn url(&self) -> String {
        format!(
            "https://atcoder.jp/contests/{}/tasks/{}",
            self.contest_id.as_deref().unwrap_or(&self.problem_id),
            self.problem_id
        )
    }
}

/// An upcoming contest. Fetched fresh on every poll, never persisted.
#[derive(Debug, Clone)]
pub struct Contest {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration: TimeDelta,
    pub rated_range: String,
}

impl Contest {
    pub fn url(&self) -> String {
        format!("https://atcoder.jp/contests/{}", self.id)
    }
}

impl std::fmt::Display for Contest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "**{}**\n\
             Start: {} (UTC)\n\
             Duration: {} min\n\
             Rated: {}\n\
             Link: {}\n\
             \n\
             React with 👍 to get a DM reminder before the contest starts.",
            self.title,
            self.start_time.format("%Y/%m/%d %H:%M"),
            self.duration.num_minutes(),
            self.rated_range,
            self.url()
        )
    }
}

/// Contest reminder settings. One row per guild; saving overwrites.
#[derive(Debug, Clone)]
pub struct ContestNotifyConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub reminder_dm: bool,
}

/// Daily problem settings. One row per guild; saving overwrites.
#[derive(Debug, Clone)]
pub struct DailyProblemConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub difficulty_min: i64,
    pub difficulty_max: i64,
    pub enabled: bool,
}

impl DailyProblemConfig {
    /// Rejects malformed ranges before anything touches the database.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.difficulty_min < 0 {
            return Err(BotError::Configuration(format!(
                "difficulty minimum must be non-negative, got {}",
                self.difficulty_min
            )));
        }
        if self.difficulty_min > self.difficulty_max {
            return Err(BotError::Configuration(format!(
                "difficulty range is empty: {} > {}",
                self.difficulty_min, self.difficulty_max
            )));
        }
        Ok(())
    }
}

/// Weekly report settings. One row per guild; saving overwrites.
#[derive(Debug, Clone)]
pub struct WeeklyReportConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub enabled: bool,
    pub post_day: u8,
}

/// One identity's row in the weekly leaderboard.
#[derive(Debug, Clone)]
pub struct WeeklyStanding {
    pub discord_id: String,
    pub handle: String,
    pub ac_count: i64,

    pub by_color: BTreeMap<DifficultyColor, i64>,
    pub unknown: i64,
}

/// The eight AtCoder rating colors, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DifficultyColor {
    Grey,
    Brown,
    Green,
    Cyan,
    Blue,
    Yellow,
    Orange,
    Red,
}

impl DifficultyColor {
    /// Bucket boundaries sit at 400-point steps up to 2800; everything at
    /// or above 2800 is Red.
    pub fn from_rating(rating: i64) -> Self {
        if rating < 400 {
            DifficultyColor::Grey
        } else if rating < 800 {
            DifficultyColor::Brown
        } else if rating < 1200 {
            DifficultyColor::Green
        } else if rating < 1600 {
            DifficultyColor::Cyan
        } else if rating < 2000 {
            DifficultyColor::Blue
        } else if rating < 2400 {
            DifficultyColor::Yellow
        } else if rating < 2800 {
            DifficultyColor::Orange
        } else {
            DifficultyColor::Red
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DifficultyColor::Grey => "Grey",
            DifficultyColor::Brown => "Brown",
            DifficultyColor::Green => "Green",
            DifficultyColor::Cyan => "Cyan",
            DifficultyColor::Blue => "Blue",
            DifficultyColor::Yellow => "Yellow",
            DifficultyColor::Orange => "Orange",
            DifficultyColor::Red => "Red",
        }
    }
}

impl std::fmt::Display for DifficultyColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Renders an optional rating as `Color (rating)`. A missing or
/// experimental rating is "Unknown", never a numeric bucket.
pub fn format_difficulty(rating: Option<i64>) -> String {
    match rating {
        Some(r) => format!("{} ({})", DifficultyColor::from_rating(r), r),
        None => String::from("Unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries_step_at_400_points() {
        assert_eq!(DifficultyColor::from_rating(399), DifficultyColor::Grey);
        assert_eq!(DifficultyColor::from_rating(400), DifficultyColor::Brown);
        assert_eq!(DifficultyColor::from_rating(799), DifficultyColor::Brown);
        assert_eq!(DifficultyColor::from_rating(800), DifficultyColor::Green);
        assert_eq!(DifficultyColor::from_rating(1200), DifficultyColor::Cyan);
        assert_eq!(DifficultyColor::from_rating(1600), DifficultyColor::Blue);
        assert_eq!(DifficultyColor::from_rating(2000), DifficultyColor::Yellow);
        assert_eq!(DifficultyColor::from_rating(2400), DifficultyColor::Orange);
        assert_eq!(DifficultyColor::from_rating(2799), DifficultyColor::Orange);
        assert_eq!(DifficultyColor::from_rating(2800), DifficultyColor::Red);
        assert_eq!(DifficultyColor::from_rating(4000), DifficultyColor::Red);
    }

    #[test]
    fn missing_rating_formats_as_unknown() {
        assert_eq!(format_difficulty(None), "Unknown");
        assert_eq!(format_difficulty(Some(950)), "Green (950)");
    }

    #[test]
    fn daily_config_rejects_empty_range() {
        let config = DailyProblemConfig {
            guild_id: 1,
            channel_id: 2,
            difficulty_min: 1200,
            difficulty_max: 800,
            enabled: true,
        };
        assert!(matches!(config.validate(), Err(BotError::Configuration(_))));

        let config = DailyProblemConfig {
            difficulty_min: 800,
            difficulty_max: 1200,
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
