use clap::{Args, Parser, Subcommand};
use push_reminders::config::{
    AppConfig, DEFAULT_BIND_ADDR, DEFAULT_DATABASE_URL, DEFAULT_SEND_CONCURRENCY,
};
use serde::Deserialize;
use std::net::SocketAddr;

const BROADCAST_PATH: &str = "/api/push/broadcast";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig),
    Tick(AppConfig),
    Broadcast(BroadcastArgs),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    outcome(cli)
}

fn outcome(cli: Cli) -> RunOutcome {
    let command = cli.command.clone();
    match command {
        Some(Command::Init(args)) => RunOutcome::Exit(run_init(args)),
        Some(Command::Broadcast(args)) => RunOutcome::Broadcast(args),
        Some(Command::Tick) => match resolve_config(&cli) {
            Ok(config) => RunOutcome::Tick(config),
            Err(err) => config_error(err),
        },
        Some(Command::Serve) | None => match resolve_config(&cli) {
            Ok(config) => RunOutcome::Serve(config),
            Err(err) => config_error(err),
        },
    }
}

fn config_error(err: String) -> RunOutcome {
    eprintln!("error: {err}");
    RunOutcome::Exit(2)
}

#[derive(Parser, Debug)]
#[command(
    name = "push-reminders",
    version,
    about = "Web Push reminder delivery service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
    #[arg(long, global = true, env = "PUSH_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind: SocketAddr,
    #[arg(long, global = true, env = "VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, global = true, env = "VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, global = true, env = "VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, global = true, env = "PUSH_ADMIN_TOKEN")]
    admin_token: Option<String>,
    /// Do not run the in-process minute ticker.
    #[arg(long, global = true, env = "PUSH_DISABLE_TICKER")]
    no_ticker: bool,
    #[arg(long, global = true, env = "PUSH_SEND_CONCURRENCY", default_value_t = DEFAULT_SEND_CONCURRENCY)]
    send_concurrency: usize,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Generate a VAPID key pair and print it as environment variables.
    Init(InitArgs),
    /// Run the HTTP server (default).
    Serve,
    /// Run one reminder tick and exit.
    Tick,
    /// Ask a running server to push to every subscription.
    Broadcast(BroadcastArgs),
}

#[derive(Args, Debug, Clone)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct BroadcastArgs {
    /// Base URL of the running server, e.g. `https://push.example.com`.
    #[arg(long, env = "PUSH_API_BASE_URL")]
    base: String,
    #[arg(long, env = "PUSH_ADMIN_TOKEN")]
    token: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, String> {
    if cli.database_url.trim().is_empty() {
        return Err("database url cannot be empty".to_string());
    }
    if cli.send_concurrency == 0 {
        return Err("send concurrency must be greater than 0".to_string());
    }
    let admin_token = cli
        .admin_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(AppConfig {
        database_url: cli.database_url.trim().to_string(),
        bind: cli.bind,
        vapid_private_key: cli.vapid_private_key.clone(),
        vapid_public_key: cli.vapid_public_key.clone(),
        vapid_subject: cli.vapid_subject.clone(),
        admin_token,
        ticker: !cli.no_ticker,
        send_concurrency: cli.send_concurrency,
    })
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = push_reminders::generate_vapid_credentials();
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!(
        "--vapid-private-key \"{}\" --vapid-public-key \"{}\" --vapid-subject \"{subject}\"",
        credentials.private_key, credentials.public_key
    );
    0
}

#[derive(Deserialize, Debug)]
struct BroadcastReply {
    ok: bool,
    #[serde(default)]
    sent: usize,
    #[serde(default)]
    failed: usize,
    #[serde(default)]
    deleted: usize,
    error: Option<String>,
}

fn broadcast_url(base: &str) -> String {
    format!("{}{BROADCAST_PATH}", base.trim().trim_end_matches('/'))
}

pub(crate) async fn run_broadcast(args: BroadcastArgs) -> i32 {
    let mut request = reqwest::Client::new().post(broadcast_url(&args.base));
    if let Some(token) = args.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        request = request.header("x-admin-token", token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            eprintln!("broadcast request failed: {err}");
            return 1;
        }
    };
    let status = response.status();
    let reply: BroadcastReply = match response.json().await {
        Ok(reply) => reply,
        Err(err) => {
            eprintln!("broadcast failed with status {status}: {err}");
            return 1;
        }
    };

    if !status.is_success() || !reply.ok {
        let error = reply.error.as_deref().unwrap_or("unknown_error");
        eprintln!("broadcast failed with status {status}: {error}");
        return 1;
    }
    println!(
        "sent={} failed={} deleted={}",
        reply.sent, reply.failed, reply.deleted
    );
    0
}
