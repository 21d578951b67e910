//! Series acquisition pipeline
//!
//! This module turns a series URL into a streamed archive of chapter archives:
//! - Discovering chapters from the series' chapter list
//! - Discovering and downloading every chapter's images
//! - Assembling one archive per chapter inside the request's sandbox
//! - Streaming the series archive while later chapters are still in flight
//!
//! Every request runs in its own cancellation scope. The first failure anywhere
//! cancels the whole request and the sandbox is removed once every task is done.

mod aggregate;
mod archive;
mod chapter;
mod context;
mod discovery;
mod download;
mod fetcher;
mod group;
mod orchestrator;
mod stream;

pub use fetcher::{build_http_client, fetch_page, fetch_to_sandbox};
pub use stream::SeriesStream;

use crate::config::{Config, PipelineConfig};
use crate::{ConfigError, Result};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Entry point for series requests
///
/// Cheap to clone; one instance is shared by every request a server handles.
#[derive(Clone)]
pub struct Pipeline {
    client: Client,
    config: Arc<PipelineConfig>,
    temp_root: PathBuf,
}

impl Pipeline {
    /// Builds a pipeline from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The full configuration; the HTTP, pipeline and sandbox sections
    ///   are used
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to serve requests
    /// * `Err(CbzError::Config)` - The HTTP client could not be built
    pub fn new(config: &Config) -> Result<Self> {
        let client = build_http_client(&config.http).map_err(|e| {
            ConfigError::Validation(format!("cannot build HTTP client: {}", e))
        })?;

        Ok(Self::with_client(client, config))
    }

    /// Builds a pipeline that uses an existing HTTP client
    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            config: Arc::new(config.pipeline.clone()),
            temp_root: config.sandbox.temp_root(),
        }
    }

    /// Starts archiving `series` and returns the archive's byte stream
    ///
    /// `series` must already have the `/{namespace}/{id}` path shape. The returned
    /// stream yields archive bytes as they are produced; if the request fails after
    /// the first bytes, the failure is the stream's last item. Dropping the stream
    /// cancels the request.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cbz_stream::{Config, Pipeline};
    /// use futures::StreamExt;
    ///
    /// # async fn run() -> cbz_stream::Result<()> {
    /// let pipeline = Pipeline::new(&Config::default())?;
    /// let series = cbz_stream::url::parse_series_url("https://example.com/series/42")?;
    ///
    /// let mut stream = pipeline.stream(series).await?;
    /// while let Some(chunk) = stream.next().await {
    ///     let bytes = chunk?;
    ///     println!("{} bytes", bytes.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn stream(&self, series: Url) -> Result<SeriesStream> {
        orchestrator::start(
            self.client.clone(),
            self.config.clone(),
            self.temp_root.clone(),
            series,
        )
        .await
    }
}
