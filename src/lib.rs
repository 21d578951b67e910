//! cbz-stream: a streaming series archiver
//!
//! This crate fetches a multi-chapter series from a remote site, downloads every
//! chapter's images and repackages them as a nested archive (one inner archive per
//! chapter inside one outer archive for the series). The outer archive is streamed to
//! the caller while it is being built, and every intermediate file lives in a
//! per-request sandbox directory that is removed once the request has unwound.

pub mod config;
pub mod extract;
pub mod pipeline;
pub mod sandbox;
pub mod server;
pub mod url;

use thiserror::Error;

/// Main error type for cbz-stream operations
#[derive(Debug, Error)]
pub enum CbzError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Markup error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] UrlError),

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Size error for {url}: {message}")]
    Size { url: String, message: String },

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] sandbox::SandboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] async_zip::error::ZipError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// The error buckets a request can fail with
///
/// Every [`CbzError`] falls into exactly one of these. The HTTP layer maps them to
/// response statuses and tests use them to assert on the class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input URL or markup token
    Parse,
    /// Wrong path shape, zero chapters, zero images, filename pattern mismatch
    Validation,
    /// Non-success status or network failure
    Transport,
    /// Missing length header, oversized or empty body
    Size,
    /// Sandbox, archive or other filesystem failure
    Filesystem,
    /// The request was cancelled
    Cancellation,
}

impl CbzError {
    /// Returns the error bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) | Self::UrlParse(_) | Self::Extract(_) => ErrorKind::Parse,
            Self::Config(_) | Self::Validation(_) | Self::Url(_) => ErrorKind::Validation,
            Self::Status { .. } | Self::Http { .. } => ErrorKind::Transport,
            Self::Size { .. } => ErrorKind::Size,
            Self::Sandbox(_) | Self::Io(_) | Self::Archive(_) => ErrorKind::Filesystem,
            Self::Cancelled => ErrorKind::Cancellation,
        }
    }

    /// Returns true if this error only reports that the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
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

    #[error("Invalid address in config: {0}")]
    InvalidAddress(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("expected a path of the form /{{namespace}}/{{id}}, got {0:?}")]
    PathShape(String),

    #[error("expected an image name of the form <chapter>-<image>.<ext>, got {0:?}")]
    ImageName(String),

    #[error("URL has no file name: {0}")]
    MissingFileName(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result type alias for cbz-stream operations
pub type Result<T> = std::result::Result<T, CbzError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{Pipeline, SeriesStream};
pub use sandbox::Sandbox;
