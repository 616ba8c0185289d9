use crate::extract::BackoffPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for an extraction run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub login: LoginConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Target groupware server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Root URL of the groupware CGI endpoint, e.g.
    /// `http://192.168.220.14/scripts/cbag/ag.exe`
    #[serde(rename = "base-url")]
    pub base_url: String,
}

/// Login identity; the password itself never appears in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Division name as shown on the division selection page
    pub division: String,

    /// User display name as shown on the login page
    pub name: String,

    /// Name of the environment variable holding the password
    #[serde(rename = "password-env")]
    pub password_env: String,
}

/// Extraction behaviour knobs
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Retry budget per page fetch for retryable errors
    #[serde(rename = "max-retries-per-fetch", default = "default_max_retries")]
    pub max_retries_per_fetch: u32,

    /// First backoff delay in milliseconds
    #[serde(rename = "backoff-initial-ms", default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Maximum re-authentications per window before the window is failed
    #[serde(rename = "max-reauth-per-window", default = "default_max_reauth")]
    pub max_reauth_per_window: u32,

    /// Records per page the view is expected to show
    #[serde(rename = "page-size-hint", default = "default_page_size")]
    pub page_size_hint: u32,

    /// Transport-level timeout per fetch attempt, in seconds
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Bound on concurrently processed windows
    #[serde(rename = "max-concurrent-windows", default = "default_concurrency")]
    pub max_concurrent_windows: u32,
}

/// Output sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path for the JSON-lines record file; absent or "-" means stdout
    #[serde(rename = "records-path")]
    pub records_path: Option<String>,
}

impl ExtractorConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.backoff_initial_ms),
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_retries_per_fetch: default_max_retries(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
            max_reauth_per_window: default_max_reauth(),
            page_size_hint: default_page_size(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_concurrent_windows: default_concurrency(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_initial() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    15_000
}

fn default_max_reauth() -> u32 {
    2
}

fn default_page_size() -> u32 {
    50
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_concurrency() -> u32 {
    4
}
