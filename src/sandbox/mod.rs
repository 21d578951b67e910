//! Per-request sandbox directory
//!
//! Every intermediate artifact of a request (downloaded images, chapter archives)
//! lives in one temporary directory. Callers address files by bare name only; any
//! name that could resolve outside the directory is rejected before it touches the
//! filesystem.

use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};

/// Errors that can occur during sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("invalid sandbox file name: {0:?}")]
    InvalidName(String),

    #[error("{0:?} resolves outside the sandbox")]
    Escape(String),

    #[error("sandbox has already been destroyed")]
    Destroyed,

    #[error("{op} {name:?} failed: {source}")]
    Io {
        op: &'static str,
        name: String,
        source: std::io::Error,
    },
}

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// A temporary directory that only hands out files directly inside it
#[derive(Debug)]
pub struct Sandbox {
    /// Canonical path of the directory
    root: PathBuf,

    /// Owning handle; `None` once destroyed
    dir: Mutex<Option<TempDir>>,
}

impl Sandbox {
    /// Creates a fresh sandbox directory under `parent`
    pub fn create_in(parent: &Path) -> SandboxResult<Self> {
        let io_err = |source: std::io::Error| SandboxError::Io {
            op: "create sandbox in",
            name: parent.display().to_string(),
            source,
        };

        let dir = tempfile::Builder::new()
            .prefix("cbz-")
            .tempdir_in(parent)
            .map_err(io_err)?;
        let root = dir.path().canonicalize().map_err(io_err)?;

        tracing::debug!("Created sandbox {}", root.display());

        Ok(Self {
            root,
            dir: Mutex::new(Some(dir)),
        })
    }

    /// Creates a fresh sandbox directory under `parent` without blocking the runtime
    pub async fn new(parent: PathBuf) -> SandboxResult<Self> {
        let display = parent.display().to_string();
        tokio::task::spawn_blocking(move || Self::create_in(&parent))
            .await
            .map_err(|e| SandboxError::Io {
                op: "create sandbox in",
                name: display,
                source: std::io::Error::other(e),
            })?
    }

    /// Returns the sandbox directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns true once [`Sandbox::destroy`] has run
    pub fn is_destroyed(&self) -> bool {
        self.handle().is_none()
    }

    /// Maps a bare file name onto a path inside the sandbox
    ///
    /// The name must be exactly one normal path component: no separators, no `.`
    /// or `..`, no root or drive prefix.
    pub fn resolve(&self, name: &str) -> SandboxResult<PathBuf> {
        if self.is_destroyed() {
            return Err(SandboxError::Destroyed);
        }

        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(SandboxError::InvalidName(name.to_string()));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(SandboxError::InvalidName(name.to_string())),
        }
    }

    /// Creates a new file for writing
    ///
    /// Fails if the name is already taken; every entity in a request has its own name.
    pub async fn create(&self, name: &str) -> SandboxResult<File> {
        let path = self.resolve(name)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| io_error("create", name, source))
    }

    /// Opens an existing file for reading
    pub async fn open(&self, name: &str) -> SandboxResult<File> {
        let path = self.contained(name).await?;
        File::open(&path)
            .await
            .map_err(|source| io_error("open", name, source))
    }

    /// Removes a file
    pub async fn remove(&self, name: &str) -> SandboxResult<()> {
        // The link itself is what gets removed, so a symlink pointing outside is
        // harmless here and only the name is checked.
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| io_error("remove", name, source))
    }

    /// Removes the sandbox directory with everything left in it
    ///
    /// Calling this more than once is a no-op.
    pub async fn destroy(&self) -> SandboxResult<()> {
        let Some(dir) = self.handle().take() else {
            return Ok(());
        };

        let root = self.root.display().to_string();
        let io_err = |source: std::io::Error| SandboxError::Io {
            op: "destroy",
            name: root.clone(),
            source,
        };

        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| io_err(std::io::Error::other(e)))?
            .map_err(io_err)?;

        tracing::debug!("Removed sandbox {}", root);
        Ok(())
    }

    /// Resolves a name and checks that the existing file it points to (following
    /// symlinks) is still inside the sandbox
    async fn contained(&self, name: &str) -> SandboxResult<PathBuf> {
        let path = self.resolve(name)?;
        let real = tokio::fs::canonicalize(&path)
            .await
            .map_err(|source| io_error("open", name, source))?;

        if !real.starts_with(&self.root) {
            return Err(SandboxError::Escape(name.to_string()));
        }
        Ok(real)
    }

    fn handle(&self) -> MutexGuard<'_, Option<TempDir>> {
        self.dir.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn io_error(op: &'static str, name: &str, source: std::io::Error) -> SandboxError {
    SandboxError::Io {
        op,
        name: name.to_string(),
        source,
    }
}
