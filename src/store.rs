//! Persistence for push subscriptions and reminder schedules.
//!
//! Writes are scoped to single rows or to one `(endpoint, plan_id)` group, so
//! concurrent requests and scheduler ticks need no in-process coordination.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::types::push::{ReminderInput, ReminderSchedule, Subscription};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database and applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `:memory:` is a separate database.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO push_subscriptions (endpoint, p256dh, auth, created_at, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
             ON CONFLICT(endpoint) DO UPDATE SET
               p256dh = excluded.p256dh,
               auth = excluded.auth,
               updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&subscription.endpoint)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes the subscription together with all of its schedules.
    pub async fn delete_subscription(&self, endpoint: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reminder_schedules WHERE endpoint = ?1")
            .bind(endpoint)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?1")
            .bind(endpoint)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Replaces the whole schedule set of one plan on one endpoint. Every new
    /// row starts without a last-sent marker. An empty `reminders` clears the plan.
    pub async fn replace_schedules(
        &self,
        endpoint: &str,
        plan_id: &str,
        timezone: &str,
        reminders: &[ReminderInput],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reminder_schedules WHERE endpoint = ?1 AND plan_id = ?2")
            .bind(endpoint)
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        for reminder in reminders {
            sqlx::query(
                "INSERT INTO reminder_schedules
                   (id, endpoint, plan_id, timezone, time, enabled, last_sent_local, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(endpoint)
            .bind(plan_id)
            .bind(timezone)
            .bind(&reminder.time)
            .bind(reminder.enabled)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(reminders.len())
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<ReminderSchedule>, StoreError> {
        let schedules = sqlx::query_as::<_, ReminderSchedule>(
            "SELECT id, endpoint, plan_id, timezone, time, enabled, last_sent_local
             FROM reminder_schedules
             WHERE enabled = 1
             ORDER BY endpoint, plan_id, time",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(schedules)
    }

    /// Claims the local minute `local_key` for a schedule. Returns `false` when
    /// the marker already holds that minute, so only one of any number of
    /// concurrent ticks gets to send.
    pub async fn claim_minute(&self, id: &str, local_key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE reminder_schedules
             SET last_sent_local = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2 AND (last_sent_local IS NULL OR last_sent_local <> ?1)",
        )
        .bind(local_key)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Undoes [`Store::claim_minute`] after a failed send, restoring `previous`
    /// unless someone else has moved the marker on since.
    pub async fn release_minute(
        &self,
        id: &str,
        local_key: &str,
        previous: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE reminder_schedules
             SET last_sent_local = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2 AND last_sent_local = ?3",
        )
        .bind(previous)
        .bind(id)
        .bind(local_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_subscription(&self, endpoint: &str) -> Result<Option<Subscription>, StoreError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT endpoint, p256dh, auth FROM push_subscriptions WHERE endpoint = ?1",
        )
        .bind(endpoint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT endpoint, p256dh, auth FROM push_subscriptions ORDER BY endpoint",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }
}
