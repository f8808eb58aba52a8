use super::subscriptions::present;
use super::{ApiError, api_error, internal_error};
use crate::ports::PushSender;
use crate::state;
use crate::types::push::ReminderInput;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReminderSyncRequest {
    endpoint: Option<String>,
    plan_id: Option<String>,
    timezone: Option<String>,
    reminders: Option<Vec<ReminderPayload>>,
}

#[derive(Deserialize)]
struct ReminderPayload {
    time: Option<String>,
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct ReminderSync {
    endpoint: String,
    plan_id: String,
    timezone: String,
    reminders: Vec<ReminderInput>,
}

#[derive(Serialize)]
pub(crate) struct ReminderSyncResponse {
    ok: bool,
    count: usize,
}

pub(crate) async fn sync<S: PushSender>(
    State(state): State<state::AppState<S>>,
    payload: Result<Json<ReminderSyncRequest>, JsonRejection>,
) -> Result<Json<ReminderSyncResponse>, ApiError> {
    let request = payload
        .ok()
        .and_then(|Json(request)| validate(request))
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid_reminder_payload"))?;

    let count = state
        .store
        .replace_schedules(
            &request.endpoint,
            &request.plan_id,
            &request.timezone,
            &request.reminders,
        )
        .await
        .map_err(internal_error)?;
    tracing::debug!(
        endpoint = %request.endpoint,
        plan_id = %request.plan_id,
        count,
        "synced reminder schedules"
    );
    Ok(Json(ReminderSyncResponse { ok: true, count }))
}

/// All-or-nothing: one bad entry rejects the whole request.
fn validate(request: ReminderSyncRequest) -> Option<ReminderSync> {
    let reminders = request
        .reminders?
        .into_iter()
        .map(|reminder| {
            let time = reminder.time?;
            is_valid_time(&time).then_some(ReminderInput {
                time,
                enabled: reminder.enabled,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ReminderSync {
        endpoint: present(request.endpoint)?,
        plan_id: present(request.plan_id)?,
        timezone: present(request.timezone)?,
        reminders,
    })
}

/// `HH:MM`, 24h, zero-padded.
fn is_valid_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hour < 24 && minute < 60
}
