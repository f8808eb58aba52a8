use std::pin::Pin;
use std::time::Duration;

use time::OffsetDateTime;

use crate::ports;
use crate::push::{PushError, VapidSigner};
use crate::types::push::PushResult;

const PUSH_TTL_SECONDS: &str = "60";
const PUSH_URGENCY: &str = "high";
/// Per attempt; a send makes at most two.
const PUSH_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

/// Web Push sender for payload-less "wake up" messages.
///
/// Tries the RFC 8292 `vapid t=, k=` authorization first and falls back once to
/// the draft `WebPush` + `Crypto-Key` header pair some push services still expect.
#[derive(Clone)]
pub struct WebPushSender {
    signer: VapidSigner,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebPushSender {
    pub fn new(signer: VapidSigner) -> Self {
        Self {
            signer,
            client: reqwest::Client::new(),
            timeout: PUSH_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(
        &self,
        endpoint: &str,
        headers: &[(&'static str, String)],
    ) -> Result<(bool, PushResult), reqwest::Error> {
        let mut request = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .header("TTL", PUSH_TTL_SECONDS)
            .header("Urgency", PUSH_URGENCY)
            .header(reqwest::header::CONTENT_LENGTH, "0");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((
            status.is_success(),
            PushResult {
                status: status.as_u16(),
                body,
            },
        ))
    }

    async fn send_with_fallback(&self, endpoint: &str) -> Result<PushResult, PushError> {
        let jwt = self.signer.build_jwt(endpoint)?;
        let public_key = self.signer.public_key();

        let modern = [(
            "Authorization",
            format!("vapid t={jwt}, k={public_key}"),
        )];
        let (ok, modern) = self.post(endpoint, &modern).await?;
        if ok {
            return Ok(modern);
        }
        tracing::debug!(
            endpoint,
            status = modern.status,
            "push service rejected vapid authorization, retrying with legacy headers"
        );

        let legacy = [
            ("Authorization", format!("WebPush {jwt}")),
            ("Crypto-Key", format!("p256ecdsa={public_key}")),
        ];
        let (ok, legacy) = self.post(endpoint, &legacy).await?;
        if ok {
            return Ok(legacy);
        }

        Err(PushError::from_attempts(modern, legacy))
    }
}

impl ports::PushSender for WebPushSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<PushResult, PushError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, endpoint: &'a str) -> Self::Fut<'a> {
        Box::pin(self.send_with_fallback(endpoint))
    }
}
