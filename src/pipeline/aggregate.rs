//! Series aggregator
//!
//! Writes finished chapter archives, in the order they finish, into the series
//! archive. The series archive is written straight into the response pipe, so the
//! client receives the first chapter while later ones are still being built.

use super::archive::ArchiveWriter;
use super::context::PipelineContext;
use super::fetcher::{fetch_page, fetch_to_sandbox};
use crate::extract::{extract, LinkSelector};
use crate::url::{file_name, join_segment};
use crate::{CbzError, Result};
use std::path::Path;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use url::Url;

/// Streams the series archive into `sink`
///
/// Dropping `sink`, on success or failure, ends the stream the client reads.
pub(crate) async fn aggregate(
    ctx: PipelineContext,
    series: Url,
    mut names: mpsc::Receiver<String>,
    sink: DuplexStream,
) -> Result<()> {
    let result = stream_archive(&ctx, &series, &mut names, sink).await;
    ctx.escalate(result)
}

async fn stream_archive(
    ctx: &PipelineContext,
    series: &Url,
    names: &mut mpsc::Receiver<String>,
    sink: DuplexStream,
) -> Result<()> {
    let mut output = ArchiveWriter::new(sink);
    let mut chapters = 0usize;

    while let Some(name) = ctx.recv(names).await? {
        // The cover waits for the first chapter so a series without chapters never
        // touches the sandbox.
        if chapters == 0 && ctx.config.include_cover {
            let cover = ctx.cancellable(fetch_cover(ctx, series)).await?;
            ctx.cancellable(output.append(&ctx.sandbox, &cover)).await?;
        }

        ctx.cancellable(output.append(&ctx.sandbox, &name)).await?;
        chapters += 1;
        tracing::info!("Streamed {}", name);
    }

    let mut sink = ctx.cancellable(output.finish()).await?;
    ctx.cancellable(async { sink.shutdown().await.map_err(CbzError::from) })
        .await?;

    tracing::info!("Finished series archive with {} chapters", chapters);
    Ok(())
}

/// Downloads the series cover into the sandbox and returns its file name
async fn fetch_cover(ctx: &PipelineContext, series: &Url) -> Result<String> {
    let feed = join_segment(series, "rss")?;
    let body = fetch_page(&ctx.client, &feed).await?;

    let url = extract(&body, &feed, LinkSelector::NestedText)
        .next()
        .transpose()?
        .ok_or_else(|| CbzError::Validation(format!("no cover found in {}", feed)))?;

    let name = cover_name(file_name(&url)?);
    fetch_to_sandbox(&ctx.client, &url, &ctx.sandbox, &name).await?;

    tracing::debug!("Fetched cover {}", url);
    Ok(name)
}

/// Names the cover file after the extension of the remote file
fn cover_name(remote: &str) -> String {
    match Path::new(remote).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("cover.{}", ext),
        _ => "cover".to_string(),
    }
}
