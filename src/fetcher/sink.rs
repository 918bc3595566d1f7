//! Artifact persistence

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// Destination for downloaded artifact bytes
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Creates a directory and its parents; an existing directory is not an error
    async fn ensure_dir(&self, dir: &Path) -> io::Result<()>;

    /// Writes the full artifact to `path`, replacing any previous content
    async fn write_artifact(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Local filesystem sink
///
/// Bytes are written to a `.part` sibling first and renamed into place, so a
/// reader never observes a truncated artifact at its final path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactSink;

impl FsArtifactSink {
    pub fn new() -> Self {
        Self
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        match tokio::fs::create_dir_all(dir).await {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
            other => other,
        }
    }

    async fn write_artifact(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let part = part_path(path);

        let written = async {
            tokio::fs::write(&part, bytes).await?;
            tokio::fs::rename(&part, path).await
        }
        .await;

        if written.is_err() {
            let _ = tokio::fs::remove_file(&part).await;
        }
        written
    }
}
