//! Chapter discovery
//!
//! Fetches the series' chapter list and publishes every chapter link, in page
//! order, onto the chapter channel.

use super::context::PipelineContext;
use super::fetcher::fetch_page;
use crate::extract::{extract, LinkSelector};
use crate::url::{join_segment, validate_path_shape};
use crate::{CbzError, Result};
use tokio::sync::mpsc;
use url::Url;

/// Publishes the chapters of `series`, closing the channel when done
///
/// Fails with a validation error if a chapter link has the wrong path shape or if
/// the list holds no chapters at all.
pub(crate) async fn discover_chapters(
    ctx: PipelineContext,
    series: Url,
    chapters: mpsc::Sender<Url>,
) -> Result<()> {
    let result = publish_chapters(&ctx, &series, &chapters).await;
    ctx.escalate(result)
}

async fn publish_chapters(
    ctx: &PipelineContext,
    series: &Url,
    chapters: &mpsc::Sender<Url>,
) -> Result<()> {
    let list = join_segment(series, "full-chapter-list")?;
    let body = ctx.cancellable(fetch_page(&ctx.client, &list)).await?;

    let mut published = 0usize;
    for link in extract(&body, &list, LinkSelector::Anchors) {
        let chapter = link?;
        validate_path_shape(&chapter)?;

        tracing::debug!("Discovered chapter {}", chapter);
        ctx.send(chapters, chapter).await?;
        published += 1;
    }

    if published == 0 {
        return Err(CbzError::Validation("no chapters found".to_string()));
    }

    tracing::info!("Discovered {} chapters", published);
    Ok(())
}
