use crate::push::PushError;
use crate::types::push::PushResult;

/// Delivers one empty push message to a subscription endpoint.
pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<PushResult, PushError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, endpoint: &'a str) -> Self::Fut<'a>;
}
