use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://push-reminders.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_SEND_CONCURRENCY: usize = 8;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind: SocketAddr,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    /// Shared secret for admin routes. `None` leaves them open.
    pub admin_token: Option<String>,
    pub ticker: bool,
    pub send_concurrency: usize,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            admin_token: None,
            ticker: false,
            send_concurrency: DEFAULT_SEND_CONCURRENCY,
        }
    }
}
