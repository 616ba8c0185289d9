//! Configuration module
//!
//! Handles loading, parsing, and validating TOML configuration files.
//! Credentials are not part of the file: the config names an environment
//! variable and the binary resolves the password from it at startup.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, ExtractorConfig, LoginConfig, OutputConfig, ServerConfig};
