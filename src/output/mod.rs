//! Output sinks for extracted records
//!
//! The pipeline itself mandates no wire format; this module provides the
//! JSON-lines sink the binary hands records to, plus the human-readable
//! listing formatter for the console.

mod jsonl;

pub use jsonl::{format_listing, write_records};

use thiserror::Error;

/// Errors raised while writing extracted records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;
