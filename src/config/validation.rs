use crate::config::types::{Config, ExtractorConfig, LoginConfig, ServerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_server_config(&config.server)?;
    validate_login_config(&config.login)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates the server configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(
            "base-url must include a host".to_string(),
        ));
    }

    Ok(())
}

/// Validates the login configuration
fn validate_login_config(config: &LoginConfig) -> Result<(), ConfigError> {
    if config.division.trim().is_empty() {
        return Err(ConfigError::Validation(
            "login.division cannot be empty".to_string(),
        ));
    }

    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "login.name cannot be empty".to_string(),
        ));
    }

    if config.password_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "login.password-env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the extractor configuration
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    if config.max_retries_per_fetch > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries-per-fetch must be <= 10, got {}",
            config.max_retries_per_fetch
        )));
    }

    if config.backoff_initial_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff-initial-ms must be >= 1".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_initial_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-max-ms ({}) must be >= backoff-initial-ms ({})",
            config.backoff_max_ms, config.backoff_initial_ms
        )));
    }

    if config.max_reauth_per_window < 1 || config.max_reauth_per_window > 10 {
        return Err(ConfigError::Validation(format!(
            "max-reauth-per-window must be between 1 and 10, got {}",
            config.max_reauth_per_window
        )));
    }

    if config.page_size_hint < 1 || config.page_size_hint > 500 {
        return Err(ConfigError::Validation(format!(
            "page-size-hint must be between 1 and 500, got {}",
            config.page_size_hint
        )));
    }

    if config.fetch_timeout_secs < 1 || config.fetch_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "fetch-timeout-secs must be between 1 and 300, got {}",
            config.fetch_timeout_secs
        )));
    }

    if config.max_concurrent_windows < 1 || config.max_concurrent_windows > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-windows must be between 1 and 32, got {}",
            config.max_concurrent_windows
        )));
    }

    Ok(())
}
