//! Page fetcher
//!
//! Issues one HTTP request for a specific view + parameters and returns raw
//! markup or a typed failure. Never parses, never mutates state; retry and
//! re-auth decisions belong to the walker.

use crate::model::DateWindow;
use crate::session::Session;
use crate::FetchError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// One page-fetch unit: the monthly view at a pagination offset
///
/// Immutable once issued; advancing the cursor produces a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub window: DateWindow,

    /// Start position within the window's record sequence
    pub offset: u32,
}

impl FetchRequest {
    /// The first request for a window
    pub fn first(window: DateWindow) -> Self {
        Self { window, offset: 0 }
    }

    /// A new request with the cursor advanced to `next_offset`
    pub fn advance(&self, next_offset: u32) -> Self {
        Self {
            window: self.window,
            offset: next_offset,
        }
    }

    /// Renders the request as a monthly-view URL for the given user
    ///
    /// `SP` (start position) is only appended past the first page; the
    /// server treats its absence as offset zero.
    pub fn to_url(&self, base: &Url, user_id: &str) -> Url {
        let date = format!("da.{:04}.{:02}.01", self.window.year, self.window.month);
        let mut url = base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .clear()
                .append_pair("page", "ScheduleUserMonth")
                .append_pair("UID", user_id)
                .append_pair("Date", &date);
            if self.offset > 0 {
                pairs.append_pair("SP", &self.offset.to_string());
            }
        }
        url
    }

    /// Diagnostic label, e.g. `2024-05@40`
    pub fn label(&self) -> String {
        format!("{}@{}", self.window, self.offset)
    }
}

/// Builds the HTTP client shared by the session manager and the fetcher
///
/// The cookie store is what carries the session; both login and view
/// requests must go through the same client.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one view page, returning raw markup or a typed failure
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | markup |
/// | 401 / 403 | `SessionExpired` (caller re-authenticates) |
/// | 429 / 5xx | `Status` (retryable) |
/// | other 4xx | `Status` (non-retryable) |
/// | timeout | `Timeout` (retryable) |
/// | connect/DNS failure | `Transport` (retryable) |
pub async fn fetch_page(
    client: &Client,
    base: &Url,
    session: &Session,
    request: &FetchRequest,
) -> Result<String, FetchError> {
    let url = request.to_url(base, &session.user_id);
    tracing::trace!(page = %request.label(), "fetching");

    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::SessionExpired);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(classify_error)
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://192.168.220.14/scripts/cbag/ag.exe").unwrap()
    }

    #[test]
    fn test_first_request_url() {
        let request = FetchRequest::first(DateWindow { year: 2024, month: 5 });
        let url = request.to_url(&base(), "42");
        assert_eq!(
            url.as_str(),
            "http://192.168.220.14/scripts/cbag/ag.exe?page=ScheduleUserMonth&UID=42&Date=da.2024.05.01"
        );
    }

    #[test]
    fn test_advanced_request_carries_offset() {
        let request = FetchRequest::first(DateWindow { year: 2024, month: 5 }).advance(50);
        let url = request.to_url(&base(), "42");
        assert!(url.as_str().ends_with("&SP=50"));
        assert_eq!(request.offset, 50);
    }

    #[test]
    fn test_advance_does_not_mutate() {
        let first = FetchRequest::first(DateWindow { year: 2024, month: 1 });
        let _second = first.advance(10);
        assert_eq!(first.offset, 0);
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(Duration::from_secs(30)).is_ok());
    }
}
