//! Session manager: the only component allowed to log in
//!
//! The groupware keeps its session in cookies, so the cookie jar of the
//! shared HTTP client carries authentication between requests. What this
//! module owns is the login choreography and the expiry bookkeeping:
//!
//! 1. `page=LoginGroup` lists the divisions; the configured division name is
//!    resolved to its division code from the `select` options.
//! 2. `gid={code}&Group={code}` shows the login form for that division; the
//!    configured user name is resolved to its user id the same way.
//! 3. The credentials are POSTed to the same URL. A login form still present
//!    in the response means the server refused the credentials.
//!
//! `acquire`/`invalidate` are serialized behind one async mutex so that
//! concurrent expiry detections collapse into a single re-login.

use crate::extract::{login_form_present, BackoffPolicy};
use crate::AuthError;
use reqwest::Client;
use scraper::{Html, Selector};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Login credentials; `Debug` redacts the password
#[derive(Clone)]
pub struct Credentials {
    /// Division name shown on the division selection page
    pub division: String,

    /// User display name shown on the login page
    pub name: String,

    password: String,
}

impl Credentials {
    pub fn new(division: String, name: String, password: String) -> Self {
        Self {
            division,
            name,
            password,
        }
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("division", &self.division)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session
///
/// Read-only once acquired; the cookie jar holds the actual token. The
/// generation number lets the manager tell a stale invalidation apart from a
/// current one.
#[derive(Debug, Clone)]
pub struct Session {
    /// User id resolved during login, required by every schedule view URL
    pub user_id: String,

    /// Division code resolved from the division selection page
    pub division_code: String,

    generation: u64,
}

struct SessionState {
    current: Option<Arc<Session>>,
    generation: u64,
}

/// Owns authentication state; all login and invalidation goes through here
pub struct SessionManager {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    state: Mutex<SessionState>,
    max_login_attempts: u32,
    backoff: BackoffPolicy,
}

impl SessionManager {
    /// Creates a manager; no network activity happens until `acquire`
    ///
    /// The client must be the same cookie-enabled client the fetcher uses,
    /// otherwise the session cookie never reaches the schedule views.
    pub fn new(
        client: Client,
        base_url: Url,
        credentials: Credentials,
        max_login_attempts: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            client,
            base_url,
            credentials,
            state: Mutex::new(SessionState {
                current: None,
                generation: 0,
            }),
            max_login_attempts,
            backoff,
        }
    }

    /// Returns a valid session, logging in if none is held
    ///
    /// Transport failures reaching the login page are retried up to the
    /// bounded attempt count; credential rejection is returned immediately.
    /// At most one login is in flight at a time: callers queue on the
    /// internal lock and reuse the session the first one establishes.
    pub async fn acquire(&self) -> Result<Arc<Session>, AuthError> {
        let mut state = self.state.lock().await;
        if let Some(session) = &state.current {
            return Ok(session.clone());
        }

        let next_generation = state.generation + 1;
        let session = Arc::new(self.login(next_generation).await?);
        state.generation = next_generation;
        state.current = Some(session.clone());
        tracing::info!(
            generation = next_generation,
            user_id = %session.user_id,
            "login succeeded"
        );
        Ok(session)
    }

    /// Marks the given session expired, forcing the next `acquire` to re-login
    ///
    /// A stale handle (already superseded by a re-login) is ignored, so N
    /// workers discovering expiry of the same session trigger one re-auth.
    pub async fn invalidate(&self, stale: &Session) {
        let mut state = self.state.lock().await;
        let held = state.current.as_ref().map(|s| s.generation);
        if held == Some(stale.generation) {
            tracing::info!(generation = stale.generation, "session invalidated");
            state.current = None;
        } else {
            tracing::debug!(
                generation = stale.generation,
                "ignoring invalidation of superseded session"
            );
        }
    }

    /// Best-effort logout; failures are logged, never propagated
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if state.current.take().is_none() {
            return;
        }
        drop(state);

        let url = self.page_url(&[("page", "LogOut")]);
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("logged out");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "logout request refused");
            }
            Err(e) => {
                tracing::warn!(error = %e, "logout request failed");
            }
        }
    }

    /// Bounded-retry wrapper around one login attempt
    async fn login(&self, generation: u64) -> Result<Session, AuthError> {
        let mut attempt = 0;
        loop {
            match self.try_login(generation).await {
                Ok(session) => return Ok(session),
                Err(e @ AuthError::LoginUnreachable { .. }) if attempt + 1 < self.max_login_attempts => {
                    let delay = self.backoff.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "login page unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Performs the three-step login exchange once
    async fn try_login(&self, generation: u64) -> Result<Session, AuthError> {
        // Step 1: division selection page
        let markup = self.get_html(&[("page", "LoginGroup")]).await?;
        let division_code = select_option_value(
            &markup,
            "select.select-gid[name='Group'] option",
            &self.credentials.division,
        )
        .ok_or_else(|| AuthError::DivisionNotFound {
            division: self.credentials.division.clone(),
        })?;

        // Step 2: login form for the division
        let login_query = [
            ("gid", division_code.as_str()),
            ("Group", division_code.as_str()),
        ];
        let markup = self.get_html(&login_query).await?;
        let user_id = select_option_value(
            &markup,
            "td.loginmain select.vr_loginForm[name='_ID'] option",
            &self.credentials.name,
        )
        .ok_or_else(|| AuthError::UserNotFound {
            name: self.credentials.name.clone(),
        })?;

        // Step 3: POST credentials to the same URL
        let url = self.page_url(&login_query);
        let form = [
            ("csrf_ticket", ""),
            ("_System", "login"),
            ("_Login", "1"),
            ("LoginMethod", "1"),
            ("_ID", user_id.as_str()),
            ("Password", self.credentials.password()),
        ];
        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(unreachable_error)?;
        if !response.status().is_success() {
            return Err(AuthError::LoginUnreachable {
                message: format!("login POST returned HTTP {}", response.status().as_u16()),
            });
        }
        let body = response.text().await.map_err(unreachable_error)?;

        // The server answers a rejected login with the form again
        if login_form_present(&body) {
            return Err(AuthError::BadCredentials);
        }

        Ok(Session {
            user_id,
            division_code,
            generation,
        })
    }

    async fn get_html(&self, query: &[(&str, &str)]) -> Result<String, AuthError> {
        let url = self.page_url(query);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(unreachable_error)?;
        if !response.status().is_success() {
            return Err(AuthError::LoginUnreachable {
                message: format!("HTTP {}", response.status().as_u16()),
            });
        }
        response.text().await.map_err(unreachable_error)
    }

    fn page_url(&self, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().extend_pairs(query);
        url
    }
}

fn unreachable_error(e: reqwest::Error) -> AuthError {
    AuthError::LoginUnreachable {
        message: e.to_string(),
    }
}

/// Finds the option whose display text equals `text` and returns its value
///
/// Kept synchronous so the parsed document never crosses an await point.
fn select_option_value(markup: &str, selector: &str, text: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find(|option| option.text().collect::<String>().trim() == text)
        .and_then(|option| option.value().attr("value"))
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new(
            "Engineering".to_string(),
            "Yamada".to_string(),
            "hunter2".to_string(),
        );
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("Yamada"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_select_option_value_matches_text() {
        let markup = r#"
            <select class="select-gid" name="Group">
                <option value="3">Sales</option>
                <option value="7"> Engineering </option>
            </select>
        "#;
        let value = select_option_value(markup, "select.select-gid[name='Group'] option", "Engineering");
        assert_eq!(value.as_deref(), Some("7"));
    }

    #[test]
    fn test_select_option_value_no_match() {
        let markup = r#"<select class="select-gid" name="Group"><option value="3">Sales</option></select>"#;
        let value = select_option_value(markup, "select.select-gid[name='Group'] option", "Engineering");
        assert_eq!(value, None);
    }
}
