pub const USERS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Users (
        discord_id     TEXT        PRIMARY KEY,
        handle         TEXT        NOT NULL,

        created_at     INTEGER     NOT NULL,
        updated_at     INTEGER     NOT NULL
    )";

pub const SUBMISSIONS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Submissions (
        id             INTEGER     PRIMARY KEY,

        discord_id     TEXT        NOT NULL    REFERENCES Users(discord_id),
        problem_id     TEXT        NOT NULL,
        contest_id     TEXT,

        result         TEXT        NOT NULL,
        point          REAL        NOT NULL,
        language       TEXT        NOT NULL,

        submitted_at   INTEGER     NOT NULL,
        synced_at      INTEGER     NOT NULL
    )";

pub const PROBLEMS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Problems (
        problem_id     TEXT        PRIMARY KEY,
        contest_id     TEXT,
        title          TEXT        NOT NULL,
        difficulty     INTEGER
    )";

pub const CONTEST_NOTIFY_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS ContestNotifyConfigs (
        guild_id       INTEGER     PRIMARY KEY,
        channel_id     INTEGER     NOT NULL,
        reminder_dm    BOOLEAN     NOT NULL
    )";

pub const DAILY_PROBLEM_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS DailyProblemConfigs (
        guild_id        INTEGER     PRIMARY KEY,
        channel_id      INTEGER     NOT NULL,
        difficulty_min  INTEGER     NOT NULL,
        difficulty_max  INTEGER     NOT NULL,
        enabled         BOOLEAN     NOT NULL
    )";

pub const WEEKLY_REPORT_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS WeeklyReportConfigs (
        guild_id       INTEGER     PRIMARY KEY,
        channel_id     INTEGER     NOT NULL,
        enabled        BOOLEAN     NOT NULL,
        post_day       INTEGER     NOT NULL
    )";

pub const ALL: [(&str, &str); 6] = [
    ("Users", USERS_SCHEMA),
    ("Submissions", SUBMISSIONS_SCHEMA),
    ("Problems", PROBLEMS_SCHEMA),
    ("ContestNotifyConfigs", CONTEST_NOTIFY_SCHEMA),
    ("DailyProblemConfigs", DAILY_PROBLEM_SCHEMA),
    ("WeeklyReportConfigs", WEEKLY_REPORT_SCHEMA),
];
