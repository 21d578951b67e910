//! Configuration module for cbz-stream
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; a missing file section falls back to its defaults.
//!
//! # Example
//!
//! ```no_run
//! use cbz_stream::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("cbz-stream.toml")).unwrap();
//! println!("Downloading with {} workers", config.pipeline.download_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, HttpConfig, PipelineConfig, SandboxConfig, ServerConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
