use super::{ApiError, OkResponse, api_error, internal_error};
use crate::ports::PushSender;
use crate::state;
use crate::types::push::Subscription;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Deserialize)]
pub(crate) struct SubscribeRequest {
    subscription: Option<SubscriptionPayload>,
}

/// A browser `PushSubscription` as serialized by `toJSON()`.
#[derive(Deserialize)]
pub(crate) struct SubscriptionPayload {
    endpoint: Option<String>,
    keys: Option<SubscriptionKeys>,
}

#[derive(Deserialize)]
struct SubscriptionKeys {
    p256dh: Option<String>,
    auth: Option<String>,
}

impl SubscriptionPayload {
    /// Returns `None` unless endpoint, `p256dh` and `auth` are all present.
    pub(crate) fn into_subscription(self) -> Option<Subscription> {
        let keys = self.keys?;
        Some(Subscription {
            endpoint: present(self.endpoint)?,
            p256dh: present(keys.p256dh)?,
            auth: present(keys.auth)?,
        })
    }
}

pub(crate) fn present(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) async fn subscribe<S: PushSender>(
    State(state): State<state::AppState<S>>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let subscription = payload
        .ok()
        .and_then(|Json(request)| request.subscription)
        .and_then(SubscriptionPayload::into_subscription)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid_subscription_payload"))?;

    state
        .store
        .upsert_subscription(&subscription)
        .await
        .map_err(internal_error)?;
    tracing::debug!(endpoint = %subscription.endpoint, "stored push subscription");
    Ok(OkResponse::ok())
}

#[derive(Deserialize)]
pub(crate) struct UnsubscribeRequest {
    endpoint: Option<String>,
}

pub(crate) async fn unsubscribe<S: PushSender>(
    State(state): State<state::AppState<S>>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let endpoint = payload
        .ok()
        .and_then(|Json(request)| present(request.endpoint))
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "endpoint_required"))?;

    state
        .store
        .delete_subscription(&endpoint)
        .await
        .map_err(internal_error)?;
    Ok(OkResponse::ok())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn payload(value: serde_json::Value) -> SubscriptionPayload {
        serde_json::from_value(value).expect("payload")
    }

    #[test]
    fn into_subscription__should_trim_and_keep_keys_opaque() {
        // Given
        let payload = payload(serde_json::json!({
            "endpoint": " https://push.example/abc ",
            "keys": {"p256dh": "not-even-base64!", "auth": "a"}
        }));

        // When
        let subscription = payload.into_subscription();

        // Then
        assert_eq!(
            subscription,
            Some(Subscription {
                endpoint: "https://push.example/abc".to_string(),
                p256dh: "not-even-base64!".to_string(),
                auth: "a".to_string(),
            })
        );
    }

    #[test]
    fn into_subscription__should_reject_blank_auth() {
        // Given
        let payload = payload(serde_json::json!({
            "endpoint": "https://push.example/abc",
            "keys": {"p256dh": "x", "auth": "   "}
        }));

        // Then
        assert_eq!(payload.into_subscription(), None);
    }
}
