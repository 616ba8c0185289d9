//! Range walker: drives fetch→parse across one window's pagination space
//!
//! One walker instance processes one date window end to end. Per window it
//! runs an explicit state machine:
//!
//! ```text
//! Start → Fetching → Parsed → (Continuing → Fetching | Failed | Done)
//! ```
//!
//! Session expiry re-issues the *same* request after re-authenticating,
//! bounded by `max-reauth-per-window`. Retryable fetch errors consume the
//! per-fetch retry budget with backoff in between. Exhausting either budget
//! fails the window while keeping its partial pages; only a fatal
//! authentication error propagates out and aborts the run.

use crate::config::ExtractorConfig;
use crate::extract::cancel::CancelToken;
use crate::extract::fetcher::{fetch_page, FetchRequest};
use crate::extract::parser::{parse_schedule_page, Freshness, PageResult, ParseContext};
use crate::model::DateWindow;
use crate::session::{Session, SessionManager};
use crate::{AuthError, FetchError};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Hard ceiling on records one window may claim before pagination is
/// declared runaway. A month view has no business growing past this.
const MAX_WINDOW_RECORDS: u32 = 2000;

/// Everything one window produced, kept even when the window failed
#[derive(Debug)]
pub struct WindowReport {
    pub window: DateWindow,

    /// Successfully parsed pages in cursor order
    pub pages: Vec<PageResult>,

    /// True when traversal was abandoned before the window was exhausted
    pub failed: bool,

    pub pages_fetched: u32,
    pub pages_failed: u32,
}

impl WindowReport {
    fn new(window: DateWindow) -> Self {
        Self {
            window,
            pages: Vec::new(),
            failed: false,
            pages_fetched: 0,
            pages_failed: 0,
        }
    }
}

enum WalkState {
    Start,
    Fetching(FetchRequest),
    Parsed(FetchRequest, PageResult),
    Failed,
    Done,
}

enum FetchFailure {
    /// Fatal authentication failure; aborts the whole run
    Fatal(AuthError),

    /// Run-level cancellation observed
    Cancelled,

    /// Retry or re-auth budget exhausted; the window is skipped
    Exhausted,
}

/// Walks one date window's pagination sequence
///
/// Cheap to clone per worker: the client is handle-like and the rest is
/// shared behind `Arc`s.
#[derive(Clone)]
pub struct RangeWalker {
    client: Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    settings: ExtractorConfig,
    cancel: CancelToken,
    seq: Arc<AtomicU64>,
}

impl RangeWalker {
    pub fn new(
        client: Client,
        base_url: Url,
        sessions: Arc<SessionManager>,
        settings: ExtractorConfig,
        cancel: CancelToken,
        seq: Arc<AtomicU64>,
    ) -> Self {
        Self {
            client,
            base_url,
            sessions,
            settings,
            cancel,
            seq,
        }
    }

    /// Processes one window end to end
    ///
    /// `Err` is returned only for fatal authentication failures. Everything
    /// else, including cancellation, lands in the report: partial pages are
    /// kept and `failed` marks an abandoned traversal.
    pub async fn walk_window(&self, window: DateWindow) -> Result<WindowReport, AuthError> {
        let mut report = WindowReport::new(window);

        if self.cancel.is_cancelled() {
            report.failed = true;
            return Ok(report);
        }

        let mut session = match self.sessions.acquire().await {
            Ok(session) => session,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(%window, error = %e, "window failed before first fetch");
                report.failed = true;
                return Ok(report);
            }
        };

        let mut reauths = 0u32;
        let max_pages = MAX_WINDOW_RECORDS / self.settings.page_size_hint.max(1) + 1;
        let mut state = WalkState::Start;

        loop {
            state = match state {
                WalkState::Start => WalkState::Fetching(FetchRequest::first(window)),

                WalkState::Fetching(request) => {
                    match self
                        .fetch_with_retry(&mut session, &request, &mut reauths)
                        .await
                    {
                        Ok(markup) => {
                            let ctx = ParseContext {
                                window,
                                offset: request.offset,
                                page_size_hint: self.settings.page_size_hint,
                                source_page: request.label(),
                            };
                            WalkState::Parsed(request, parse_schedule_page(&markup, &ctx))
                        }
                        Err(FetchFailure::Fatal(e)) => return Err(e),
                        Err(FetchFailure::Cancelled) => {
                            tracing::info!(%window, "window cancelled, keeping partial pages");
                            report.failed = true;
                            WalkState::Done
                        }
                        Err(FetchFailure::Exhausted) => {
                            report.pages_failed += 1;
                            WalkState::Failed
                        }
                    }
                }

                WalkState::Parsed(request, mut page) => match page.freshness {
                    Freshness::Expired => {
                        // Data from an expired page is never accepted; the
                        // same request is re-issued with a fresh session.
                        if reauths >= self.settings.max_reauth_per_window {
                            tracing::warn!(%window, "re-auth budget exhausted");
                            report.pages_failed += 1;
                            WalkState::Failed
                        } else {
                            reauths += 1;
                            self.sessions.invalidate(&session).await;
                            match self.sessions.acquire().await {
                                Ok(fresh) => {
                                    session = fresh;
                                    WalkState::Fetching(request)
                                }
                                Err(e) if e.is_fatal() => return Err(e),
                                Err(e) => {
                                    tracing::warn!(%window, error = %e, "re-login failed");
                                    report.pages_failed += 1;
                                    WalkState::Failed
                                }
                            }
                        }
                    }

                    Freshness::PossiblyExpired => {
                        // No grid, no login marker: a genuinely empty page.
                        tracing::debug!(page = %request.label(), "unrecognized page without login marker, treating as empty");
                        report.pages_fetched += 1;
                        WalkState::Done
                    }

                    Freshness::Fresh => {
                        page.seq = self.seq.fetch_add(1, Ordering::SeqCst);
                        report.pages_fetched += 1;
                        let continuation = page.continuation;
                        report.pages.push(page);

                        match continuation {
                            Some(next) if next > request.offset => {
                                if report.pages.len() as u32 >= max_pages {
                                    tracing::warn!(
                                        %window,
                                        pages = report.pages.len(),
                                        "pagination sanity cap hit, abandoning window"
                                    );
                                    report.failed = true;
                                    WalkState::Done
                                } else {
                                    WalkState::Fetching(request.advance(next))
                                }
                            }
                            Some(stuck) => {
                                tracing::warn!(
                                    %window,
                                    offset = stuck,
                                    "continuation cursor did not advance, abandoning window"
                                );
                                report.failed = true;
                                WalkState::Done
                            }
                            None => WalkState::Done,
                        }
                    }
                },

                WalkState::Failed => {
                    report.failed = true;
                    WalkState::Done
                }

                WalkState::Done => break,
            };
        }

        Ok(report)
    }

    /// Fetches one request, spending the retry budget on retryable errors
    /// and the re-auth budget on 401/403 responses
    async fn fetch_with_retry(
        &self,
        session: &mut Arc<Session>,
        request: &FetchRequest,
        reauths: &mut u32,
    ) -> Result<String, FetchFailure> {
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchFailure::Cancelled);
            }

            match fetch_page(&self.client, &self.base_url, session, request).await {
                Ok(markup) => return Ok(markup),

                Err(FetchError::SessionExpired) => {
                    if *reauths >= self.settings.max_reauth_per_window {
                        tracing::warn!(page = %request.label(), "re-auth budget exhausted");
                        return Err(FetchFailure::Exhausted);
                    }
                    *reauths += 1;
                    self.sessions.invalidate(session).await;
                    match self.sessions.acquire().await {
                        Ok(fresh) => *session = fresh,
                        Err(e) if e.is_fatal() => return Err(FetchFailure::Fatal(e)),
                        Err(e) => {
                            tracing::warn!(page = %request.label(), error = %e, "re-login failed");
                            return Err(FetchFailure::Exhausted);
                        }
                    }
                    // Same request, cursor unchanged
                }

                Err(e) if e.is_retryable() && attempt < self.settings.max_retries_per_fetch => {
                    let delay = self.settings.backoff_policy().delay_for(attempt);
                    tracing::warn!(
                        page = %request.label(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "fetch failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(FetchFailure::Cancelled),
                    }
                    attempt += 1;
                }

                Err(e) => {
                    tracing::warn!(page = %request.label(), error = %e, "fetch abandoned");
                    return Err(FetchFailure::Exhausted);
                }
            }
        }
    }
}
