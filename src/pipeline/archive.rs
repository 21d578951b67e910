//! Streaming archive writer
//!
//! Both the per-chapter archives and the series archive are written entry by entry
//! without seeking back, using data descriptors. Each entry is copied from a sandbox
//! file that is removed once the entry is complete.

use crate::sandbox::Sandbox;
use crate::Result;
use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use tokio::io::AsyncWrite;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

/// An archive being written to `W`, one deflate entry per sandbox file
pub(crate) struct ArchiveWriter<W>
where
    W: AsyncWrite + Unpin,
{
    zip: ZipFileWriter<Compat<W>>,
    entries: usize,
}

impl<W> ArchiveWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipFileWriter::new(inner.compat_write()),
            entries: 0,
        }
    }

    /// Number of entries written so far
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Copies the sandbox file `name` into a new entry of the same name, then
    /// removes the file
    ///
    /// # Returns
    ///
    /// The uncompressed size of the entry
    pub async fn append(&mut self, sandbox: &Sandbox, name: &str) -> Result<u64> {
        let file = sandbox.open(name).await?;

        let builder = ZipEntryBuilder::new(name.to_string().into(), Compression::Deflate);
        let mut entry = self.zip.write_entry_stream(builder).await?;
        let size = futures::io::copy(file.compat(), &mut entry).await?;
        entry.close().await?;

        sandbox.remove(name).await?;
        self.entries += 1;

        tracing::debug!("Archived {} ({} bytes)", name, size);
        Ok(size)
    }

    /// Writes the central directory and returns the underlying writer
    pub async fn finish(self) -> Result<W> {
        let inner = self.zip.close().await?;
        Ok(inner.into_inner())
    }
}
