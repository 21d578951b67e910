//! Download coordinator
//!
//! A single worker pool drains the image requests submitted by every chapter's
//! image discoverer. Each finished download is reported back to the chapter that
//! asked for it on that chapter's reply channel.

use super::context::PipelineContext;
use super::fetcher::fetch_to_sandbox;
use super::group::TaskGroup;
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Submission bookkeeping for one chapter
#[derive(Debug, Default)]
pub(crate) struct ChapterProgress {
    submitted: AtomicUsize,
    completed: AtomicUsize,
}

impl ChapterProgress {
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Images submitted but not yet downloaded
    pub fn outstanding(&self) -> usize {
        self.submitted().saturating_sub(self.completed())
    }
}

/// One image to download on behalf of a chapter
///
/// The request holds a sender of its chapter's reply channel. The channel closes
/// once the chapter's discoverer is done and every request it submitted has been
/// completed or dropped.
#[derive(Debug)]
pub(crate) struct ImageRequest {
    /// Where to download the image from
    pub url: Url,

    /// Sandbox file name the image is stored under
    pub name: String,

    reply: mpsc::Sender<String>,
    progress: Arc<ChapterProgress>,
}

impl ImageRequest {
    /// Creates a request and counts it as submitted for its chapter
    pub fn submit(
        url: Url,
        name: String,
        reply: mpsc::Sender<String>,
        progress: Arc<ChapterProgress>,
    ) -> Self {
        progress.submitted.fetch_add(1, Ordering::SeqCst);
        Self {
            url,
            name,
            reply,
            progress,
        }
    }

    /// Reports the downloaded file to the owning chapter
    async fn complete(&self, ctx: &PipelineContext) -> Result<()> {
        ctx.send(&self.reply, self.name.clone()).await?;
        self.progress.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Runs downloads from `images` until every discoverer is done
///
/// At most `download-concurrency` downloads run at once. Any failed download cancels
/// the request.
pub(crate) async fn run_downloads(
    ctx: PipelineContext,
    mut images: mpsc::Receiver<ImageRequest>,
) -> Result<()> {
    let mut workers = TaskGroup::new(ctx.token.clone(), ctx.config.download_concurrency);

    while let Ok(Some(request)) = ctx.recv(&mut images).await {
        if !workers.spawn(download(ctx.clone(), request)).await {
            break;
        }
    }

    let result = workers.wait().await;
    ctx.escalate(result)
}

async fn download(ctx: PipelineContext, request: ImageRequest) -> Result<()> {
    let result = fetch_and_reply(&ctx, &request).await;
    ctx.escalate(result)
}

async fn fetch_and_reply(ctx: &PipelineContext, request: &ImageRequest) -> Result<()> {
    let size = ctx
        .cancellable(fetch_to_sandbox(
            &ctx.client,
            &request.url,
            &ctx.sandbox,
            &request.name,
        ))
        .await?;

    tracing::debug!("Downloaded {} ({} bytes)", request.url, size);
    request.complete(ctx).await
}
