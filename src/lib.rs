//! Koyomi: schedule extraction from Cybozu-style groupware
//!
//! This crate extracts structured schedule records from a groupware that only
//! exposes session-authenticated, server-rendered HTML views. It drives a
//! login session, walks the monthly schedule views page by page, parses the
//! markup into typed records, and merges overlapping observations into one
//! deduplicated, date-ordered result set.

pub mod config;
pub mod extract;
pub mod merge;
pub mod model;
pub mod output;
pub mod session;

use thiserror::Error;

/// Main error type for extraction runs
///
/// Configuration and output errors stay in their own enums; the binary
/// reports them directly instead of funnelling them through here.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Authentication errors raised by the session manager
///
/// Only `BadCredentials`, `DivisionNotFound` and `UserNotFound` are fatal for
/// the whole run. `LoginUnreachable` is returned after the manager's own
/// bounded retries and is handled as a window failure by the walker.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login rejected: credentials refused by the server")]
    BadCredentials,

    #[error("Division '{division}' not found on the division selection page")]
    DivisionNotFound { division: String },

    #[error("User '{name}' not found on the login page")]
    UserNotFound { name: String },

    #[error("Login page unreachable: {message}")]
    LoginUnreachable { message: String },
}

impl AuthError {
    /// Returns true if this error must abort the entire run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::LoginUnreachable { .. })
    }
}

/// Errors raised by a single page fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("Server indicated the session is no longer valid")]
    SessionExpired,
}

impl FetchError {
    /// Returns true if the same request may be retried after a backoff delay
    ///
    /// 401/403 never reach this check; they are mapped to `SessionExpired`
    /// and handled through re-authentication instead of the retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout => true,
            Self::Status { status } => *status == 429 || (500..600).contains(status),
            Self::SessionExpired => false,
        }
    }
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{Pipeline, RangeWalker};
pub use model::{DateWindow, RunResult, RunSummary, ScheduleRecord};
pub use session::{Credentials, Session, SessionManager};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(FetchError::Status { status: 429 }.is_retryable());
        assert!(FetchError::Status { status: 500 }.is_retryable());
        assert!(FetchError::Status { status: 503 }.is_retryable());
        assert!(!FetchError::Status { status: 404 }.is_retryable());
        assert!(!FetchError::Status { status: 400 }.is_retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Transport {
            message: "connection refused".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_session_expiry_is_not_a_retry() {
        assert!(!FetchError::SessionExpired.is_retryable());
    }

    #[test]
    fn test_fatal_auth_errors() {
        assert!(AuthError::BadCredentials.is_fatal());
        assert!(AuthError::DivisionNotFound {
            division: "Sales".to_string()
        }
        .is_fatal());
        assert!(AuthError::UserNotFound {
            name: "Yamada".to_string()
        }
        .is_fatal());
        assert!(!AuthError::LoginUnreachable {
            message: "connect timeout".to_string()
        }
        .is_fatal());
    }
}
