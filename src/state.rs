use crate::push::VapidSigner;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState<S> {
    pub store: Store,
    pub sender: S,
    pub signer: VapidSigner,
    pub admin_token: Option<String>,
}
