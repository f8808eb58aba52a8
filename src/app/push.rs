use super::subscriptions::{SubscriptionPayload, present};
use super::{ApiError, api_error, internal_error};
use crate::ports::PushSender;
use crate::push as push_service;
use crate::state;
use crate::types::push::{KeyPairCheck, PushResult};

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublicKeyResponse {
    ok: bool,
    public_key: String,
}

pub(crate) async fn public_key<S: PushSender>(
    State(state): State<state::AppState<S>>,
) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        ok: true,
        public_key: state.signer.public_key().to_string(),
    })
}

/// Either a stored endpoint or a full subscription object.
#[derive(Deserialize)]
pub(crate) struct TestPushRequest {
    endpoint: Option<String>,
    subscription: Option<SubscriptionPayload>,
}

#[derive(Serialize)]
pub(crate) struct TestPushResponse {
    ok: bool,
    push: PushResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestPushFailure {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
    vapid_check: KeyPairCheck,
}

pub(crate) async fn push_test<S: PushSender>(
    State(state): State<state::AppState<S>>,
    payload: Result<Json<TestPushRequest>, JsonRejection>,
) -> Response {
    let endpoint = match resolve_endpoint(&state, payload).await {
        Ok(endpoint) => endpoint,
        Err(err) => return err.into_response(),
    };

    let sent =
        tokio::time::timeout(push_service::SEND_DEADLINE, state.sender.send(&endpoint)).await;
    let expired = matches!(&sent, Ok(Err(err)) if err.is_expired());
    let err = match sent {
        Ok(Ok(push)) => return Json(TestPushResponse { ok: true, push }).into_response(),
        Ok(Err(err)) => err.to_string(),
        Err(_) => "push_send_timeout".to_string(),
    };

    let vapid_check = state.signer.check_key_pair();
    if expired {
        if let Err(store_err) = state.store.delete_subscription(&endpoint).await {
            return internal_error(store_err).into_response();
        }
        tracing::info!(endpoint = %endpoint, "deleted expired push subscription");
        return (
            StatusCode::GONE,
            Json(TestPushFailure {
                ok: false,
                error: err,
                deleted: Some(true),
                vapid_check,
            }),
        )
            .into_response();
    }

    tracing::warn!(endpoint = %endpoint, error = %err, "test push failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(TestPushFailure {
            ok: false,
            error: err,
            deleted: None,
            vapid_check,
        }),
    )
        .into_response()
}

async fn resolve_endpoint<S: PushSender>(
    state: &state::AppState<S>,
    payload: Result<Json<TestPushRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, "subscription_not_found");
    let Json(request) =
        payload.map_err(|_| api_error(StatusCode::BAD_REQUEST, "invalid_test_payload"))?;

    if let Some(endpoint) = present(request.endpoint) {
        return match state
            .store
            .get_subscription(&endpoint)
            .await
            .map_err(internal_error)?
        {
            Some(subscription) => Ok(subscription.endpoint),
            None => Err(not_found()),
        };
    }

    request
        .subscription
        .and_then(SubscriptionPayload::into_subscription)
        .map(|subscription| subscription.endpoint)
        .ok_or_else(not_found)
}

#[derive(Serialize)]
pub(crate) struct BroadcastResponse {
    ok: bool,
    sent: usize,
    failed: usize,
    deleted: usize,
}

pub(crate) async fn push_broadcast<S: PushSender>(
    State(state): State<state::AppState<S>>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let summary = push_service::broadcast(&state.sender, &state.store)
        .await
        .map_err(internal_error)?;
    Ok(Json(BroadcastResponse {
        ok: true,
        sent: summary.sent,
        failed: summary.failed,
        deleted: summary.deleted,
    }))
}
