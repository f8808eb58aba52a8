use crate::ports;
use crate::push::{Delivery, SEND_DEADLINE, deliver};
use crate::store::Store;
use crate::types::push::{ReminderSchedule, TickSummary};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::StreamExt;
use futures_util::stream;
use std::time::Duration;
use time::OffsetDateTime;

/// Wall-clock minute in a subscriber's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalMinute {
    pub(crate) date: String,
    pub(crate) time: String,
}

impl LocalMinute {
    /// The `YYYY-MM-DD HH:MM` idempotency key stored as `last_sent_local`.
    pub(crate) fn key(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}

/// Converts `now` into the civil date and time-of-day of an IANA zone.
/// Returns `None` for unknown zones.
pub(crate) fn local_minute(now: OffsetDateTime, timezone: &str) -> Option<LocalMinute> {
    let tz: Tz = timezone.trim().parse().ok()?;
    let utc: DateTime<Utc> = DateTime::from_timestamp(now.unix_timestamp(), 0)?;
    let local = utc.with_timezone(&tz);
    Some(LocalMinute {
        date: local.format("%Y-%m-%d").to_string(),
        time: local.format("%H:%M").to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    NotDue,
    Skipped,
    Delivered(Delivery),
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler<T, S> {
    time: T,
    sender: S,
    store: Store,
    concurrency: usize,
    send_deadline: Duration,
}

impl<T, S> ReminderScheduler<T, S>
where
    T: ports::TimeProvider,
    S: ports::PushSender,
{
    pub fn new(time: T, sender: S, store: Store, concurrency: usize) -> Self {
        Self {
            time,
            sender,
            store,
            concurrency: concurrency.max(1),
            send_deadline: SEND_DEADLINE,
        }
    }

    pub fn with_send_deadline(mut self, deadline: Duration) -> Self {
        self.send_deadline = deadline;
        self
    }

    /// Fires every enabled reminder whose local time is the current minute and
    /// that has not fired in this minute yet. Safe to call repeatedly within
    /// one minute; never fails as a whole.
    pub async fn tick(&self) -> TickSummary {
        let now = self.time.now();
        let schedules = match self.store.list_enabled_schedules().await {
            Ok(schedules) => schedules,
            Err(err) => {
                tracing::error!(error = %err, "failed to load reminder schedules");
                let summary = TickSummary::default();
                log_summary(&summary);
                return summary;
            }
        };

        let mut summary = TickSummary {
            scanned: schedules.len(),
            ..TickSummary::default()
        };
        let outcomes: Vec<Outcome> = stream::iter(schedules)
            .map(|schedule| self.process(schedule, now))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::NotDue => {}
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Delivered(Delivery::Sent) => summary.sent += 1,
                Outcome::Delivered(Delivery::Failed) => summary.failed += 1,
                Outcome::Delivered(Delivery::Deleted) => summary.deleted += 1,
            }
        }
        log_summary(&summary);
        summary
    }

    async fn process(&self, schedule: ReminderSchedule, now: OffsetDateTime) -> Outcome {
        let Some(local) = local_minute(now, &schedule.timezone) else {
            tracing::warn!(
                schedule = %schedule.id,
                timezone = %schedule.timezone,
                "skipping reminder with unknown timezone"
            );
            return Outcome::Skipped;
        };
        if local.time != schedule.time {
            return Outcome::NotDue;
        }

        let local_key = local.key();
        let previous = schedule.last_sent_local.as_deref();
        if previous == Some(local_key.as_str()) {
            return Outcome::Skipped;
        }

        // The marker read above may be stale if another tick is running.
        match self.store.claim_minute(&schedule.id, &local_key).await {
            Ok(true) => {}
            Ok(false) => return Outcome::Skipped,
            Err(err) => {
                tracing::error!(schedule = %schedule.id, error = %err, "failed to claim reminder minute");
                return Outcome::Delivered(Delivery::Failed);
            }
        }

        let delivery = deliver(
            &self.sender,
            &self.store,
            &schedule.endpoint,
            self.send_deadline,
        )
        .await;
        if delivery == Delivery::Failed
            && let Err(err) = self
                .store
                .release_minute(&schedule.id, &local_key, previous)
                .await
        {
            tracing::error!(
                schedule = %schedule.id,
                error = %err,
                "failed to release reminder minute after failed send"
            );
        }
        Outcome::Delivered(delivery)
    }
}

fn log_summary(summary: &TickSummary) {
    tracing::info!(
        kind = "cron_reminder",
        scanned = summary.scanned,
        sent = summary.sent,
        failed = summary.failed,
        deleted = summary.deleted,
        skipped = summary.skipped,
        "reminder tick finished"
    );
}

/// Time until the start of the next wall-clock minute.
fn delay_until_next_minute(now: OffsetDateTime) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond()));
    Duration::from_secs(60).saturating_sub(into_minute)
}

/// Starts one tick at the start of every minute, forever. Ticks run as their
/// own tasks, so a slow tick never holds back the next minute.
pub async fn run_ticker<T, S>(time: T, scheduler: ReminderScheduler<T, S>)
where
    T: ports::TimeProvider,
    S: ports::PushSender,
{
    loop {
        let delay = delay_until_next_minute(time.now());
        time.sleep(delay).await;
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler.tick().await;
        });
    }
}
