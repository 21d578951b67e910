//! Per-request pipeline orchestration
//!
//! One request owns one sandbox, one cancellation scope and four sibling stages
//! connected by bounded channels:
//!
//! ```text
//! discovery --chapters--> chapter builders --images--> downloads
//!                               ^                          |
//!                               +--------- replies --------+
//!                               |
//!                               +--names--> aggregator --> SeriesStream
//! ```

use super::aggregate::aggregate;
use super::chapter::dispatch_chapters;
use super::context::PipelineContext;
use super::discovery::discover_chapters;
use super::download::run_downloads;
use super::group::TaskGroup;
use super::stream::SeriesStream;
use crate::config::PipelineConfig;
use crate::sandbox::Sandbox;
use crate::Result;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

/// Starts building the archive of `series` and returns its byte stream
///
/// The sandbox is created before this returns. The stages run on their own
/// tasks; the sandbox is destroyed once all of them have finished, and only
/// then is the outcome delivered to the stream.
pub(crate) async fn start(
    client: Client,
    config: Arc<PipelineConfig>,
    temp_root: PathBuf,
    series: Url,
) -> Result<SeriesStream> {
    let sandbox = Arc::new(Sandbox::new(temp_root).await?);
    let token = CancellationToken::new();
    let (sink, source) = tokio::io::duplex(config.stream_buffer_size);
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let ctx = PipelineContext {
        client,
        sandbox: sandbox.clone(),
        config,
        token: token.clone(),
    };

    let span = tracing::info_span!("series", url = %series);
    tokio::spawn(
        async move {
            tracing::info!("Starting series request");

            let result = run(ctx, series, sink).await;
            let cleanup = sandbox.destroy().await;
            let result = result.and(cleanup.map_err(Into::into));

            match &result {
                Ok(()) => tracing::info!("Series request completed"),
                Err(e) if e.is_cancelled() => tracing::info!("Series request cancelled"),
                Err(e) => tracing::error!("Series request failed: {}", e),
            }

            // The receiver is gone if the client disconnected
            let _ = outcome_tx.send(result);
        }
        .instrument(span),
    );

    Ok(SeriesStream::new(source, outcome_rx, token.drop_guard()))
}

/// Runs the four stages and returns the first failure
async fn run(ctx: PipelineContext, series: Url, sink: DuplexStream) -> Result<()> {
    let capacity = ctx.config.channel_capacity;
    let (chapters_tx, chapters_rx) = mpsc::channel(capacity);
    let (images_tx, images_rx) = mpsc::channel(capacity);
    let (names_tx, names_rx) = mpsc::channel(capacity);

    let mut stages = TaskGroup::new(ctx.token.clone(), ctx.config.stage_limit);

    let started = stages
        .spawn(discover_chapters(ctx.clone(), series.clone(), chapters_tx))
        .await
        && stages
            .spawn(dispatch_chapters(ctx.clone(), chapters_rx, images_tx, names_tx))
            .await
        && stages.spawn(run_downloads(ctx.clone(), images_rx)).await
        && stages
            .spawn(aggregate(ctx.clone(), series, names_rx, sink))
            .await;
    if !started {
        tracing::debug!("Cancelled before every stage was started");
    }

    stages.wait().await
}
