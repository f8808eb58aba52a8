use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

/// A browser push subscription. The endpoint is the identity; the keys are
/// stored as received and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSchedule {
    pub id: String,
    pub endpoint: String,
    pub plan_id: String,
    pub timezone: String,
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    pub enabled: bool,
    /// `YYYY-MM-DD HH:MM` in the schedule's timezone of the last fired minute.
    pub last_sent_local: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderInput {
    pub time: String,
    pub enabled: bool,
}

/// Status and body of a push service response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    pub status: u16,
    pub body: String,
}

impl std::fmt::Display for PushResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.status, self.body)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    pub deleted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairCheck {
    pub pair_valid: bool,
    pub public_key_length: usize,
    pub private_key_length: usize,
}
