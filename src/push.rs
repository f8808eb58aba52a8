use crate::ports::PushSender;
use crate::store::{Store, StoreError};
use crate::types::push::{BroadcastSummary, PushResult};

mod scheduler;
pub(crate) mod vapid;

pub use scheduler::{ReminderScheduler, run_ticker};
pub use vapid::{VapidError, VapidSigner, generate_vapid_credentials};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};

use futures_util::future::join_all;
use std::time::Duration;

/// Upper bound for one send, covering both authorization attempts.
pub(crate) const SEND_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error(transparent)]
    Vapid(#[from] VapidError),
    #[error("push_request_failed:{0}")]
    Transport(#[from] reqwest::Error),
    /// The push service reported the endpoint as gone (404 or 410).
    #[error("push_subscription_expired:modern:{modern};legacy:{legacy}")]
    Expired { modern: PushResult, legacy: PushResult },
    #[error("push_send_failed:modern:{modern};legacy:{legacy}")]
    Rejected { modern: PushResult, legacy: PushResult },
}

impl PushError {
    pub fn is_expired(&self) -> bool {
        matches!(self, PushError::Expired { .. })
    }

    /// Classifies two failed attempts. A 404 or 410 from either one means the
    /// endpoint is permanently invalid.
    pub(crate) fn from_attempts(modern: PushResult, legacy: PushResult) -> Self {
        if is_gone(modern.status) || is_gone(legacy.status) {
            PushError::Expired { modern, legacy }
        } else {
            PushError::Rejected { modern, legacy }
        }
    }
}

fn is_gone(status: u16) -> bool {
    status == 404 || status == 410
}

/// What became of a single send once expired endpoints have been cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    Failed,
    Deleted,
}

/// Sends to `endpoint` and deletes the subscription if the push service
/// reports it gone. A send still pending after `deadline` counts as failed.
pub(crate) async fn deliver<S: PushSender>(
    sender: &S,
    store: &Store,
    endpoint: &str,
    deadline: Duration,
) -> Delivery {
    let Ok(result) = tokio::time::timeout(deadline, sender.send(endpoint)).await else {
        tracing::warn!(endpoint, ?deadline, "push delivery timed out");
        return Delivery::Failed;
    };
    match result {
        Ok(_) => Delivery::Sent,
        Err(err) if err.is_expired() => match store.delete_subscription(endpoint).await {
            Ok(()) => {
                tracing::info!(endpoint, "deleted expired push subscription");
                Delivery::Deleted
            }
            Err(store_err) => {
                tracing::error!(endpoint, error = %store_err, "failed to delete expired subscription");
                Delivery::Failed
            }
        },
        Err(err) => {
            tracing::warn!(endpoint, error = %err, "push delivery failed");
            Delivery::Failed
        }
    }
}

/// Sends to every stored subscription concurrently. Individual failures only
/// show up in the tally.
pub async fn broadcast<S: PushSender>(
    sender: &S,
    store: &Store,
) -> Result<BroadcastSummary, StoreError> {
    broadcast_within(sender, store, SEND_DEADLINE).await
}

pub(crate) async fn broadcast_within<S: PushSender>(
    sender: &S,
    store: &Store,
    deadline: Duration,
) -> Result<BroadcastSummary, StoreError> {
    let subscriptions = store.list_subscriptions().await?;
    let deliveries = join_all(subscriptions.into_iter().map(|subscription| async move {
        deliver(sender, store, &subscription.endpoint, deadline).await
    }))
    .await;

    let mut summary = BroadcastSummary::default();
    for delivery in deliveries {
        match delivery {
            Delivery::Sent => summary.sent += 1,
            Delivery::Failed => summary.failed += 1,
            Delivery::Deleted => summary.deleted += 1,
        }
    }
    tracing::info!(
        sent = summary.sent,
        failed = summary.failed,
        deleted = summary.deleted,
        "push broadcast finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSender, memory_store, subscription};

    fn result(status: u16) -> PushResult {
        PushResult {
            status,
            body: format!("body-{status}"),
        }
    }

    #[test]
    fn from_attempts__should_classify_gone_statuses_as_expired() {
        // Then
        assert!(PushError::from_attempts(result(410), result(410)).is_expired());
        assert!(PushError::from_attempts(result(404), result(400)).is_expired());
        assert!(PushError::from_attempts(result(401), result(410)).is_expired());
        assert!(!PushError::from_attempts(result(500), result(403)).is_expired());
    }

    #[test]
    fn push_error__should_describe_both_attempts() {
        // When
        let err = PushError::from_attempts(result(500), result(403));

        // Then
        assert_eq!(
            err.to_string(),
            "push_send_failed:modern:500:body-500;legacy:403:body-403"
        );
    }

    #[tokio::test]
    async fn broadcast__should_tally_and_delete_expired_endpoints() {
        // Given
        let store = memory_store().await;
        for endpoint in ["https://push.example/ok", "https://push.example/gone", "https://push.example/down"] {
            store
                .upsert_subscription(&subscription(endpoint))
                .await
                .expect("upsert");
        }
        let sender = RecordingSender::default()
            .expire("https://push.example/gone")
            .reject("https://push.example/down", 500);

        // When
        let summary = broadcast(&sender, &store).await.expect("broadcast");

        // Then
        assert_eq!(
            summary,
            BroadcastSummary {
                sent: 1,
                failed: 1,
                deleted: 1,
            }
        );
        assert_eq!(sender.sent_endpoints().len(), 3);
        let remaining = store.list_subscriptions().await.expect("list");
        assert_eq!(remaining.len(), 2);
        assert!(
            store
                .get_subscription("https://push.example/gone")
                .await
                .expect("get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn broadcast_within__should_report_hanging_endpoint_as_failed() {
        // Given
        let store = memory_store().await;
        for endpoint in ["https://push.example/a", "https://push.example/stuck", "https://push.example/b"] {
            store
                .upsert_subscription(&subscription(endpoint))
                .await
                .expect("upsert");
        }
        let sender = RecordingSender::default().hang("https://push.example/stuck");

        // When
        let summary = broadcast_within(&sender, &store, Duration::from_millis(50))
            .await
            .expect("broadcast");

        // Then
        assert_eq!(
            summary,
            BroadcastSummary {
                sent: 2,
                failed: 1,
                deleted: 0,
            }
        );
        assert!(
            store
                .get_subscription("https://push.example/stuck")
                .await
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn broadcast__should_report_zero_when_no_subscriptions() {
        // Given
        let store = memory_store().await;
        let sender = RecordingSender::default();

        // When
        let summary = broadcast(&sender, &store).await.expect("broadcast");

        // Then
        assert_eq!(summary, BroadcastSummary::default());
        assert!(sender.sent_endpoints().is_empty());
    }
}
