//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::ports;
use crate::push::PushError;
use crate::store::Store;
use crate::types::push::{PushResult, ReminderInput, Subscription};

pub(crate) fn at(rfc3339: &str) -> OffsetDateTime {
    OffsetDateTime::parse(rfc3339, &Rfc3339).expect("parse timestamp")
}

pub(crate) async fn memory_store() -> Store {
    Store::connect("sqlite::memory:")
        .await
        .expect("in-memory store")
}

pub(crate) fn subscription(endpoint: &str) -> Subscription {
    Subscription {
        endpoint: endpoint.to_string(),
        p256dh: "BOvp256dh".to_string(),
        auth: "k3nauth".to_string(),
    }
}

pub(crate) fn reminder(time: &str, enabled: bool) -> ReminderInput {
    ReminderInput {
        time: time.to_string(),
        enabled,
    }
}

#[derive(Clone)]
pub(crate) struct FixedTime {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl FixedTime {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub(crate) fn set(&self, now: OffsetDateTime) {
        *self.now.lock().expect("time lock") = now;
    }
}

impl ports::TimeProvider for FixedTime {
    type Sleep<'a>
        = std::future::Ready<()>
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("time lock")
    }

    fn sleep<'a>(&'a self, _duration: Duration) -> Self::Sleep<'a> {
        std::future::ready(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Response {
    Expired,
    Rejected(u16),
    Hang,
}

/// Records every endpoint it is asked to send to. Endpoints succeed unless
/// configured with [`RecordingSender::expire`], [`RecordingSender::reject`]
/// or [`RecordingSender::hang`].
#[derive(Clone, Default)]
pub(crate) struct RecordingSender {
    sent: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<HashMap<String, Response>>>,
}

impl RecordingSender {
    pub(crate) fn expire(self, endpoint: &str) -> Self {
        self.respond(endpoint, Response::Expired)
    }

    pub(crate) fn reject(self, endpoint: &str, status: u16) -> Self {
        self.respond(endpoint, Response::Rejected(status))
    }

    /// The send never completes.
    pub(crate) fn hang(self, endpoint: &str) -> Self {
        self.respond(endpoint, Response::Hang)
    }

    fn respond(self, endpoint: &str, response: Response) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(endpoint.to_string(), response);
        self
    }

    pub(crate) fn sent_endpoints(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl ports::PushSender for RecordingSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<PushResult, PushError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, endpoint: &'a str) -> Self::Fut<'a> {
        self.sent
            .lock()
            .expect("sent lock")
            .push(endpoint.to_string());
        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .get(endpoint)
            .copied();
        let result = match response {
            None => Ok(PushResult {
                status: 201,
                body: String::new(),
            }),
            Some(Response::Expired) => Err(PushError::from_attempts(
                PushResult {
                    status: 410,
                    body: "gone".to_string(),
                },
                PushResult {
                    status: 410,
                    body: "gone".to_string(),
                },
            )),
            Some(Response::Hang) => return Box::pin(std::future::pending()),
            Some(Response::Rejected(status)) => Err(PushError::from_attempts(
                PushResult {
                    status,
                    body: "rejected".to_string(),
                },
                PushResult {
                    status,
                    body: "rejected".to_string(),
                },
            )),
        };
        Box::pin(std::future::ready(result))
    }
}
