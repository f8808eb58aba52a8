mod cli;

use push_reminders::StartupError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let code = match cli::run() {
        cli::RunOutcome::Serve(config) => match push_reminders::serve(config).await {
            Ok(()) => 0,
            Err(err) => startup_failed(err),
        },
        cli::RunOutcome::Tick(config) => match push_reminders::run_tick(config).await {
            Ok(summary) => {
                println!(
                    "scanned={} sent={} failed={} deleted={} skipped={}",
                    summary.scanned, summary.sent, summary.failed, summary.deleted, summary.skipped
                );
                0
            }
            Err(err) => startup_failed(err),
        },
        cli::RunOutcome::Broadcast(args) => cli::run_broadcast(args).await,
        cli::RunOutcome::Exit(code) => code,
    };
    std::process::exit(code);
}

fn startup_failed(err: StartupError) -> i32 {
    tracing::error!(error = %err, "startup failed");
    match err {
        StartupError::VapidMissing | StartupError::VapidIncomplete => 2,
        StartupError::Store(_) | StartupError::Io(_) => 1,
    }
}
