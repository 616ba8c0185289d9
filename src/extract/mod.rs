//! Extraction pipeline: fetcher, parser, walker, orchestrator
//!
//! # Components
//!
//! - `fetcher`: one HTTP request per view page, typed failures, no parsing
//! - `parser`: markup → typed `PageResult` with a continuation signal
//! - `backoff`: exponential-with-jitter retry delays
//! - `walker`: per-window state machine over fetch→parse with re-auth
//! - `pipeline`: bounded worker pool, failure budgets, the run entry point

mod backoff;
mod cancel;
mod fetcher;
mod parser;
mod pipeline;
mod walker;

pub use backoff::BackoffPolicy;
pub use cancel::CancelToken;
pub use fetcher::{build_http_client, fetch_page, FetchRequest};
pub use parser::{login_form_present, parse_schedule_page, Freshness, PageResult, ParseContext};
pub use pipeline::Pipeline;
pub use walker::{RangeWalker, WindowReport};
