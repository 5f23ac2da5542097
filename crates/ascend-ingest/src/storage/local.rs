use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument};

use super::{CopySource, DirectoryEndpoint, LogObjectStore};

/// Directory endpoint rooted at a local path (`file://` connections)
#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    root: PathBuf,
}

impl LocalEndpoint {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl DirectoryEndpoint for LocalEndpoint {
    #[instrument(skip(self))]
    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.resolve(dir);
        let mut entries = tokio::fs::read_dir(&dir_path)
            .await
            .with_context(|| format!("Failed to list directory: {}", dir_path.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        // read_dir order is unspecified; match object-store listings
        names.sort();

        debug!("Listed {} files under {}", names.len(), dir_path.display());
        Ok(names)
    }

    async fn size(&self, path: &str) -> Result<u64> {
        let metadata = tokio::fs::metadata(self.resolve(path))
            .await
            .with_context(|| format!("Failed to stat {}", path))?;
        Ok(metadata.len())
    }

    async fn read_range(&self, path: &str, start: u64, len: u64) -> Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(self.resolve(path))
            .await
            .with_context(|| format!("Failed to open {}", path))?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buffer = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.resolve(path))
            .await
            .with_context(|| format!("Failed to read {}", path))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    fn copy_source(&self, path: &str) -> CopySource {
        CopySource::File(self.resolve(path))
    }

    #[instrument(skip(self))]
    async fn copy_from(&self, source: &CopySource, dest_path: &str) -> Result<()> {
        let CopySource::File(source_path) = source else {
            bail!("Local endpoint cannot copy from {:?}", source);
        };

        let target = self.resolve(dest_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source_path, &target).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source_path.display(),
                target.display()
            )
        })?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(self.resolve(path))
            .await
            .with_context(|| format!("Failed to delete {}", path))
    }
}

/// Central log kept in a local text file
#[derive(Debug, Clone)]
pub struct LocalLogObject {
    path: PathBuf,
}

impl LocalLogObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogObjectStore for LocalLogObject {
    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn read_text(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))
    }

    async fn write_text(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
