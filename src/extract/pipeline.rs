//! Pipeline orchestrator
//!
//! Wires session manager, walkers and merger into one run. Windows are
//! processed by a bounded pool of workers; one shared session manager
//! serves them all, so concurrent expiry detections collapse into a single
//! re-login. Window failures are contained; only a fatal authentication
//! error aborts the run.

use crate::config::Config;
use crate::extract::cancel::CancelToken;
use crate::extract::fetcher::build_http_client;
use crate::extract::walker::{RangeWalker, WindowReport};
use crate::merge::merge_pages;
use crate::model::{month_windows, RunResult, RunSummary};
use crate::session::{Credentials, SessionManager};
use crate::ExtractError;
use chrono::NaiveDate;
use reqwest::Client;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// The single entry point external callers use
pub struct Pipeline {
    client: Client,
    base_url: Url,
    sessions: Arc<SessionManager>,
    config: Config,
    cancel: CancelToken,
}

impl Pipeline {
    /// Builds a pipeline from configuration and credentials
    ///
    /// One cookie-enabled HTTP client is shared between the session manager
    /// and every fetch; credentials go to the session manager and are never
    /// persisted anywhere else.
    pub fn new(config: Config, credentials: Credentials) -> Result<Self, ExtractError> {
        let base_url = Url::parse(&config.server.base_url)?;
        let client = build_http_client(config.extractor.fetch_timeout())?;
        let sessions = Arc::new(SessionManager::new(
            client.clone(),
            base_url.clone(),
            credentials,
            config.extractor.max_retries_per_fetch.max(1),
            config.extractor.backoff_policy(),
        ));

        Ok(Self {
            client,
            base_url,
            sessions,
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Token callers can use to cancel the run (e.g. on a deadline or ^C)
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs extraction over the inclusive date range
    ///
    /// Returns the merged, ordered record set plus the run summary. A
    /// cancelled run still returns its accumulated partial results; only
    /// fatal authentication failure produces an error.
    pub async fn run(&self, from: NaiveDate, to: NaiveDate) -> Result<RunResult, ExtractError> {
        let windows = month_windows(from, to).map_err(ExtractError::InvalidRange)?;
        tracing::info!(
            %from,
            %to,
            windows = windows.len(),
            "starting extraction run"
        );

        let semaphore = Arc::new(Semaphore::new(
            self.config.extractor.max_concurrent_windows as usize,
        ));
        let seq = Arc::new(AtomicU64::new(0));

        let mut tasks: JoinSet<Result<WindowReport, crate::AuthError>> = JoinSet::new();
        for window in windows {
            let walker = RangeWalker::new(
                self.client.clone(),
                self.base_url.clone(),
                self.sessions.clone(),
                self.config.extractor.clone(),
                self.cancel.clone(),
                seq.clone(),
            );
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                // Closed only when the run is being torn down
                let _permit = semaphore.acquire_owned().await;
                walker.walk_window(window).await
            });
        }

        let mut reports: Vec<WindowReport> = Vec::new();
        let mut fatal: Option<crate::AuthError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(auth)) => {
                    // Fatal auth failure: stop everything, drain the pool
                    tracing::error!(error = %auth, "aborting run");
                    self.cancel.cancel();
                    fatal.get_or_insert(auth);
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "window task panicked");
                    self.cancel.cancel();
                }
            }
        }

        self.sessions.logout().await;

        if let Some(auth) = fatal {
            return Err(ExtractError::Auth(auth));
        }

        Ok(assemble_result(reports, from, to))
    }
}

/// Merges all window reports and clamps records to the requested range
fn assemble_result(mut reports: Vec<WindowReport>, from: NaiveDate, to: NaiveDate) -> RunResult {
    reports.sort_by_key(|report| report.window);

    let mut summary = RunSummary::default();
    let mut pages = Vec::new();

    for report in reports {
        summary.pages_fetched += report.pages_fetched;
        summary.pages_failed += report.pages_failed;
        if report.failed {
            summary.failed_windows.push(report.window);
        }
        pages.extend(report.pages);
    }

    let outcome = merge_pages(pages);
    summary.records_discarded = outcome.discarded;

    // Monthly grids spill into neighbouring months; the caller asked for
    // [from, to] only.
    let records = outcome
        .records
        .into_iter()
        .filter(|record| record.date >= from && record.date <= to)
        .collect();

    let result = RunResult { records, summary };
    tracing::info!(
        records = result.records.len(),
        pages_fetched = result.summary.pages_fetched,
        pages_failed = result.summary.pages_failed,
        records_discarded = result.summary.records_discarded,
        failed_windows = result.summary.failed_windows.len(),
        "extraction run finished"
    );
    result
}
