use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for cbz-stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    #[serde(rename = "bind-address", default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every upstream request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total timeout for a single upstream request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout for upstream requests (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Concurrency and buffering knobs of the acquisition pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of images downloaded at the same time across all chapters
    #[serde(rename = "download-concurrency", default = "one")]
    pub download_concurrency: usize,

    /// Number of chapters assembled at the same time
    #[serde(rename = "chapter-concurrency", default = "one")]
    pub chapter_concurrency: usize,

    /// Ceiling on concurrently running top-level stages
    #[serde(rename = "stage-limit", default = "default_stage_limit")]
    pub stage_limit: usize,

    /// Capacity of every inter-stage channel
    #[serde(rename = "channel-capacity", default = "one")]
    pub channel_capacity: usize,

    /// Bytes buffered between the archive writer and the response body
    #[serde(rename = "stream-buffer-size", default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    /// Prepend the series cover (from the series feed) to the output archive
    #[serde(rename = "include-cover", default)]
    pub include_cover: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 1,
            chapter_concurrency: 1,
            stage_limit: default_stage_limit(),
            channel_capacity: 1,
            stream_buffer_size: default_stream_buffer_size(),
            include_cover: false,
        }
    }
}

/// Temporary file configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxConfig {
    /// Directory under which per-request sandboxes are created
    #[serde(rename = "temp-root", default)]
    pub temp_root: Option<PathBuf>,
}

impl SandboxConfig {
    /// Returns the configured temp root, or the OS temp directory
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_user_agent() -> String {
    format!("cbz-stream/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_stage_limit() -> usize {
    5
}

fn default_stream_buffer_size() -> usize {
    64 * 1024
}

fn one() -> usize {
    1
}
