use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc, Weekday};
use tokio::task::JoinHandle;

use crate::acapi::JudgeApi;
use crate::error::BotError;
use crate::notify::{MessageSink, NotificationDispatcher};
use crate::sync::SyncEngine;

/// When a job fires, relative to the wall clock (UTC).
#[derive(Debug, Clone, Copy)]
pub enum Cadence {
    /// On every wall-clock multiple of `step` minutes, like a `*/step`
    /// cron field.
    EveryMinutes(u32),
    DailyAt { hour: u32, minute: u32 },
    WeeklyAt { weekday: Weekday, hour: u32, minute: u32 },
}

impl Cadence {
    /// The next fire instant strictly after `now`.
    pub fn next_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Cadence::EveryMinutes(step) => {
                let step = i64::from(step);
                let floor = now
                    .with_second(0)
                    .and_then(|t| t.with_nanosecond(0))
                    .expect("zeroing seconds cannot fail");
                let past = i64::from(floor.minute()) % step;
                floor + TimeDelta::minutes(step - past)
            }
            Cadence::DailyAt { hour, minute } => {
                let today = now
                    .date_naive()
                    .and_hms_opt(hour, minute, 0)
                    .expect("job table uses valid times")
                    .and_utc();
                if today > now {
                    today
                } else {
                    today + TimeDelta::days(1)
                }
            }
            Cadence::WeeklyAt {
                weekday,
                hour,
                minute,
            } => {
                let days_ahead = i64::from(
                    (weekday.num_days_from_monday() + 7 - now.weekday().num_days_from_monday()) % 7,
                );
                let candidate = (now.date_naive() + TimeDelta::days(days_ahead))
                    .and_hms_opt(hour, minute, 0)
                    .expect("job table uses valid times")
                    .and_utc();
                if candidate > now {
                    candidate
                } else {
                    candidate + TimeDelta::days(7)
                }
            }
        }
    }
}

/// The fixed table of recurring jobs. Each job runs on its own task with no
/// shared scheduling state, so one job's latency never couples to another's.
pub struct Scheduler<C, S> {
    engine: Arc<SyncEngine<C>>,
    dispatcher: Arc<NotificationDispatcher<C, S>>,
}

impl<C, S> Scheduler<C, S>
where
    C: JudgeApi + 'static,
    S: MessageSink + 'static,
{
    pub fn new(engine: Arc<SyncEngine<C>>, dispatcher: Arc<NotificationDispatcher<C, S>>) -> Self {
        Self { engine, dispatcher }
    }

    /// Spawns every job. Handles are returned for callers that want to keep
    /// them; dropping them leaves the tasks running detached.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        log::info!("[scheduler] Starting jobs...");

        let engine = Arc::clone(&self.engine);
        let submission_sync = spawn_job("submission sync", Cadence::EveryMinutes(15), move || {
            let engine = Arc::clone(&engine);
            async move {
                let outcome = engine.sync_all_users().await?;
                log::info!(
                    "[submission sync] {} users, {} new submissions, {} failed.",
                    outcome.users,
                    outcome.inserted,
                    outcome.failed
                );
                Ok(())
            }
        });

        let dispatcher = Arc::clone(&self.dispatcher);
        let contest_check = spawn_job("contest check", Cadence::EveryMinutes(15), move || {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.announce_contests().await }
        });

        let dispatcher = Arc::clone(&self.dispatcher);
        let weekly_report = spawn_job(
            "weekly report",
            Cadence::WeeklyAt {
                weekday: Weekday::Mon,
                hour: 7,
                minute: 0,
            },
            move || {
                let dispatcher = Arc::clone(&dispatcher);
                async move { dispatcher.post_weekly_reports().await }
            },
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let daily_problem = spawn_job(
            "daily problem",
            Cadence::DailyAt { hour: 7, minute: 0 },
            move || {
                let dispatcher = Arc::clone(&dispatcher);
                async move { dispatcher.post_daily_problems().await }
            },
        );

        let engine = Arc::clone(&self.engine);
        let catalog_sync = spawn_job(
            "catalog sync",
            Cadence::DailyAt { hour: 3, minute: 0 },
            move || {
                let engine = Arc::clone(&engine);
                async move {
                    engine.sync_catalog().await?;
                    Ok(())
                }
            },
        );

        vec![
            submission_sync,
            contest_check,
            weekly_report,
            daily_problem,
            catalog_sync,
        ]
    }
}

/// Runs one job on its own cadence forever. The body is awaited before the
/// next fire time is computed, so a job never overlaps itself; an overrun
/// only delays that job's own next firing. A failing run is logged and the
/// job stays scheduled.
fn spawn_job<F, Fut>(name: &'static str, cadence: Cadence, body: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = cadence.next_fire(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            log::info!("[scheduler] Running {name}...");
            if let Err(err) = body().await {
                log::error!("[scheduler] {name} failed: {err}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn every_minutes_aligns_to_wall_clock_multiples() {
        let cadence = Cadence::EveryMinutes(15);

        let mid = Utc.with_ymd_and_hms(2024, 5, 15, 12, 7, 30).unwrap();
        assert_eq!(
            cadence.next_fire(mid),
            Utc.with_ymd_and_hms(2024, 5, 15, 12, 15, 0).unwrap()
        );

        // Exactly on a boundary: the next multiple, never "now".
        let on_boundary = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(on_boundary),
            Utc.with_ymd_and_hms(2024, 5, 15, 12, 15, 0).unwrap()
        );

        // Hour rollover.
        let late = Utc.with_ymd_and_hms(2024, 5, 15, 12, 50, 0).unwrap();
        assert_eq!(
            cadence.next_fire(late),
            Utc.with_ymd_and_hms(2024, 5, 15, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn daily_at_picks_today_or_tomorrow() {
        let cadence = Cadence::DailyAt { hour: 7, minute: 0 };

        let early = Utc.with_ymd_and_hms(2024, 5, 15, 3, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(early),
            Utc.with_ymd_and_hms(2024, 5, 15, 7, 0, 0).unwrap()
        );

        let late = Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(late),
            Utc.with_ymd_and_hms(2024, 5, 16, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekly_at_wraps_to_the_next_week() {
        let cadence = Cadence::WeeklyAt {
            weekday: Weekday::Mon,
            hour: 7,
            minute: 0,
        };

        // Wednesday: the following Monday.
        let wednesday = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(wednesday),
            Utc.with_ymd_and_hms(2024, 5, 20, 7, 0, 0).unwrap()
        );

        // Monday before the slot: same day.
        let monday_early = Utc.with_ymd_and_hms(2024, 5, 13, 6, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(monday_early),
            Utc.with_ymd_and_hms(2024, 5, 13, 7, 0, 0).unwrap()
        );

        // Monday after the slot: a full week out.
        let monday_late = Utc.with_ymd_and_hms(2024, 5, 13, 8, 0, 0).unwrap();
        assert_eq!(
            cadence.next_fire(monday_late),
            Utc.with_ymd_and_hms(2024, 5, 20, 7, 0, 0).unwrap()
        );
    }
}
