use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub session_path: PathBuf,
    pub screenshot_dir: PathBuf,
    pub results_dir: PathBuf,
    pub batch_size: usize,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// Poll index from which a third-party hostname counts as a wrong redirect.
    pub fail_after_attempt: u32,
    pub navigation_timeout_secs: u64,
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,
    /// Hostname of the affiliate network that issues the tracking links.
    pub tracking_domain: String,
    pub login_url: String,
    pub login_wait_secs: u64,
    pub source_name: String,
    pub ebstask: String,
    pub user_agent: String,
    pub chrome_no_sandbox: bool,
    pub chrome_path: Option<PathBuf>,
    /// Bearer tokens accepted by the HTTP server. Empty disables auth in
    /// development and refuses startup elsewhere.
    pub api_keys: Vec<String>,
}
