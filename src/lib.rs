pub mod adapters;
mod app;
pub mod config;
pub mod ports;
pub mod push;
mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use app::app;
pub use push::vapid::VapidCredentials;
pub use push::{generate_vapid_credentials, run_ticker};
pub use state::AppState;

use crate::adapters::{TokioTimeProvider, WebPushSender};
use crate::push::{ReminderScheduler, VapidConfigStatus, VapidSigner, load_vapid_config};
use crate::store::{Store, StoreError};
use crate::types::push::{TickSummary, VapidConfig};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("VAPID keys are not configured; run `push-reminders init` to generate a pair")]
    VapidMissing,
    #[error("VAPID configuration is incomplete; private key, public key and subject are all required")]
    VapidIncomplete,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn require_vapid(config: &config::AppConfig) -> Result<VapidConfig, StartupError> {
    match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => Ok(vapid),
        VapidConfigStatus::Missing => Err(StartupError::VapidMissing),
        VapidConfigStatus::Incomplete => Err(StartupError::VapidIncomplete),
    }
}

pub async fn serve(config: config::AppConfig) -> Result<(), StartupError> {
    let vapid = require_vapid(&config)?;
    let store = Store::connect(&config.database_url).await?;
    let signer = VapidSigner::new(&vapid);
    let sender = WebPushSender::new(signer.clone());

    if config.admin_token.is_none() {
        tracing::warn!("no admin token configured; admin routes are open to anyone");
    }

    if config.ticker {
        let scheduler = ReminderScheduler::new(
            TokioTimeProvider,
            sender.clone(),
            store.clone(),
            config.send_concurrency,
        );
        tokio::spawn(run_ticker(TokioTimeProvider, scheduler));
    } else {
        tracing::info!("in-process ticker disabled");
    }

    let state = AppState {
        store,
        sender,
        signer,
        admin_token: config.admin_token.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Runs a single scheduler pass, for deployments driven by an external cron.
pub async fn run_tick(config: config::AppConfig) -> Result<TickSummary, StartupError> {
    let vapid = require_vapid(&config)?;
    let store = Store::connect(&config.database_url).await?;
    let sender = WebPushSender::new(VapidSigner::new(&vapid));
    let scheduler =
        ReminderScheduler::new(TokioTimeProvider, sender, store, config.send_concurrency);
    Ok(scheduler.tick().await)
}
