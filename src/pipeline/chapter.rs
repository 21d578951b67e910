//! Chapter archive builder
//!
//! Every chapter runs two tasks side by side:
//!
//! - the image discoverer fetches the chapter's image list and submits one
//!   [`ImageRequest`] per image to the download coordinator
//! - the archive writer takes downloaded files off the chapter's reply channel, in
//!   the order the downloads finish, and appends each to the chapter archive
//!
//! When the reply channel closes the archive is finalized and its name is handed to
//! the series aggregator.

use super::archive::ArchiveWriter;
use super::context::PipelineContext;
use super::download::{ChapterProgress, ImageRequest};
use super::fetcher::fetch_page;
use super::group::TaskGroup;
use crate::extract::{extract, LinkSelector};
use crate::url::{chapter_archive_name, file_name, join_segment, ImageName};
use crate::{CbzError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs::File;
use tokio::sync::mpsc;
use url::Url;

/// Starts one builder per chapter, in discovery order
///
/// At most `chapter-concurrency` builders run at once. The image and name channels
/// are closed once every builder has finished. A chapter listed twice under the
/// same URL is built once; two different chapter URLs that end in the same
/// segment would overwrite each other's archive and fail the request.
pub(crate) async fn dispatch_chapters(
    ctx: PipelineContext,
    mut chapters: mpsc::Receiver<Url>,
    images: mpsc::Sender<ImageRequest>,
    names: mpsc::Sender<String>,
) -> Result<()> {
    let mut builders = TaskGroup::new(ctx.token.clone(), ctx.config.chapter_concurrency);
    let mut claimed = HashMap::new();
    let mut failure = None;

    while let Ok(Some(chapter)) = ctx.recv(&mut chapters).await {
        let archive_name = match claim_archive_name(&mut claimed, &chapter) {
            Ok(Some(name)) => name,
            Ok(None) => {
                tracing::debug!("Skipping repeated chapter {}", chapter);
                continue;
            }
            Err(e) => {
                failure = ctx.escalate::<()>(Err(e)).err();
                break;
            }
        };

        let builder = build_chapter(
            ctx.clone(),
            chapter,
            archive_name,
            images.clone(),
            names.clone(),
        );
        if !builders.spawn(builder).await {
            break;
        }
    }

    let result = builders.wait().await;
    match failure {
        Some(e) => Err(e),
        None => ctx.escalate(result),
    }
}

/// Reserves the archive name of `chapter`
///
/// # Returns
///
/// * `Ok(Some(name))` - The name was free and now belongs to `chapter`
/// * `Ok(None)` - `chapter` itself already holds the name
/// * `Err(_)` - Another chapter holds the name, or `chapter` has none
fn claim_archive_name(
    claimed: &mut HashMap<String, Url>,
    chapter: &Url,
) -> Result<Option<String>> {
    let name = chapter_archive_name(chapter)?;
    match claimed.get(&name) {
        Some(owner) if owner == chapter => Ok(None),
        Some(owner) => Err(CbzError::Validation(format!(
            "chapters {} and {} both map to {}",
            owner, chapter, name
        ))),
        None => {
            claimed.insert(name.clone(), chapter.clone());
            Ok(Some(name))
        }
    }
}

/// Builds the archive of one chapter
#[tracing::instrument(skip_all, fields(chapter = %chapter))]
async fn build_chapter(
    ctx: PipelineContext,
    chapter: Url,
    archive_name: String,
    images: mpsc::Sender<ImageRequest>,
    names: mpsc::Sender<String>,
) -> Result<()> {
    let progress = Arc::new(ChapterProgress::default());
/// Submits every image of `chapter` to the download coordinator
///
/// The discoverer's own reply sender is dropped when it returns, so the reply
/// channel closes as soon as the last submitted download has reported back.
async fn discover_images(
    ctx: PipelineContext,
    chapter: Url,
    images: mpsc::Sender<ImageRequest>,
    reply: mpsc::Sender<String>,
    progress: Arc<ChapterProgress>,
) -> Result<()> {
    let result = submit_images(&ctx, &chapter, &images, &reply, &progress).await;
    ctx.escalate(result)
}

async fn submit_images(
    ctx: &PipelineContext,
    chapter: &Url,
    images: &mpsc::Sender<ImageRequest>,
    reply: &mpsc::Sender<String>,
    progress: &Arc<ChapterProgress>,
) -> Result<()> {
    let list = join_segment(chapter, "images")?;
    let body = ctx.cancellable(fetch_page(&ctx.client, &list)).await?;

    let mut submitted = 0usize;
    for link in extract(&body, &list, LinkSelector::Images) {
        let url = link?;
        ImageName::from_url(&url)?;
        let name = file_name(&url)?.to_string();

        let request = ImageRequest::submit(url, name, reply.clone(), progress.clone());
        ctx.send(images, request).await?;
        submitted += 1;
    }

    if submitted == 0 {
        return Err(CbzError::Validation(format!(
            "no images found for chapter {}",
            chapter
        )));
    }

    tracing::debug!("Submitted {} images", submitted);
    Ok(())
}

/// Folds downloaded images into the chapter archive and forwards its name
async fn write_chapter(
    ctx: PipelineContext,
    archive_name: String,
    mut reply: mpsc::Receiver<String>,
    names: mpsc::Sender<String>,
    progress: Arc<ChapterProgress>,
) -> Result<()> {
    let result = assemble(&ctx, &archive_name, &mut reply, &progress).await;
    let result = match result {
        Ok(()) => ctx.send(&names, archive_name).await,
        Err(e) => Err(e),
    };
    ctx.escalate(result)
}

async fn assemble(
    ctx: &PipelineContext,
    archive_name: &str,
    reply: &mut mpsc::Receiver<String>,
    progress: &ChapterProgress,
) -> Result<()> {
    let mut archive: Option<ArchiveWriter<File>> = None;

    while let Some(image) = ctx.recv(reply).await? {
        if archive.is_none() {
            let create = async { ctx.sandbox.create(archive_name).await.map_err(CbzError::from) };
            let file = ctx.cancellable(create).await?;
            archive = Some(ArchiveWriter::new(file));
        }
        if let Some(writer) = archive.as_mut() {
            ctx.cancellable(writer.append(&ctx.sandbox, &image)).await?;
        }
    }

    let Some(writer) = archive else {
        return Err(CbzError::Validation(format!(
            "no images found for {}",
            archive_name
        )));
    };

    let written = writer.entries();
    if written != progress.submitted() || progress.outstanding() != 0 {
        return Err(CbzError::Validation(format!(
            "{} holds {} images but {} were submitted",
            archive_name,
            written,
            progress.submitted()
        )));
    }

    let mut file = ctx.cancellable(writer.finish()).await?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;

    tracing::info!("Built {} with {} images", archive_name, written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn chapter(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_claim_archive_name() {
        let mut claimed = HashMap::new();

        let first = claim_archive_name(&mut claimed, &chapter("http://site/chapters/1"));
        let second = claim_archive_name(&mut claimed, &chapter("http://site/chapters/2"));

        assert_eq!(first.unwrap().as_deref(), Some("1.cbz"));
        assert_eq!(second.unwrap().as_deref(), Some("2.cbz"));
    }

    #[test]
    fn test_repeated_chapter_is_claimed_once() {
        let mut claimed = HashMap::new();
        let url = chapter("http://site/chapters/1");

        assert!(claim_archive_name(&mut claimed, &url).unwrap().is_some());
        assert!(claim_archive_name(&mut claimed, &url).unwrap().is_none());
    }

    #[test]
    fn test_colliding_chapter_names_are_rejected() {
        let mut claimed = HashMap::new();

        claim_archive_name(&mut claimed, &chapter("http://site/a/1")).unwrap();
        let err = claim_archive_name(&mut claimed, &chapter("http://site/b/1")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("1.cbz"));
    }
}
