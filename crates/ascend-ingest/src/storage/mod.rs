//! Storage endpoints
//!
//! The pipeline talks to two kinds of remote resources: directory endpoints
//! (source and destination shares) and the single object holding the central
//! audit log. Both are traits so the pipeline can run against S3-compatible
//! object storage in production and the local filesystem in tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{is_local, EndpointConfig, LogLocation, StorageCredentials};

pub mod local;
pub mod s3;

pub use local::{LocalEndpoint, LocalLogObject};
pub use s3::{S3Endpoint, S3LogObject};

/// Reference to an existing file that a destination can copy from
/// without the bytes passing through this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    Object { bucket: String, key: String },
    File(PathBuf),
}

/// A directory-style endpoint addressed by share and relative path
#[async_trait]
pub trait DirectoryEndpoint: Send + Sync {
    /// File names directly under `dir`, in the provider's listing order
    async fn list_files(&self, dir: &str) -> Result<Vec<String>>;

    async fn size(&self, path: &str) -> Result<u64>;

    async fn read_range(&self, path: &str, start: u64, len: u64) -> Result<Vec<u8>>;

    async fn read_all(&self, path: &str) -> Result<Vec<u8>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    fn copy_source(&self, path: &str) -> CopySource;

    /// Server-side copy of `source` to `dest_path` on this endpoint
    async fn copy_from(&self, source: &CopySource, dest_path: &str) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Read the final `window` bytes, or the whole file when it is smaller
    async fn read_tail(&self, path: &str, window: u64) -> Result<Vec<u8>> {
        let size = self.size(path).await?;
        if size == 0 {
            return Ok(Vec::new());
        }
        let start = size.saturating_sub(window);
        self.read_range(path, start, size - start).await
    }
}

/// The single text object backing the central log
#[async_trait]
pub trait LogObjectStore: Send + Sync {
    async fn exists(&self) -> Result<bool>;

    async fn read_text(&self) -> Result<String>;

    /// Overwrite the whole object
    async fn write_text(&self, contents: &str) -> Result<()>;
}

/// `dir/name`, tolerating an empty or slash-terminated directory
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn local_root(connection: &str, bucket: &str) -> PathBuf {
    PathBuf::from(connection.trim_start_matches("file://")).join(bucket)
}

/// Open the directory endpoint described by `config`
pub fn open_endpoint(
    config: &EndpointConfig,
    credentials: Option<&StorageCredentials>,
) -> Result<Arc<dyn DirectoryEndpoint>> {
    if is_local(&config.connection) {
        return Ok(Arc::new(LocalEndpoint::new(local_root(
            &config.connection,
            &config.bucket,
        ))));
    }
    let Some(credentials) = credentials else {
        bail!("Storage credentials required for {}", config.connection);
    };
    Ok(Arc::new(S3Endpoint::new(
        &config.connection,
        &config.bucket,
        credentials,
    )))
}

/// Open the object holding the central log
pub fn open_log_object(
    location: &LogLocation,
    credentials: Option<&StorageCredentials>,
) -> Result<Arc<dyn LogObjectStore>> {
    if is_local(&location.connection) {
        return Ok(Arc::new(LocalLogObject::new(
            local_root(&location.connection, &location.container).join(&location.name),
        )));
    }
    let Some(credentials) = credentials else {
        bail!("Storage credentials required for {}", location.connection);
    };
    Ok(Arc::new(S3LogObject::new(
        S3Endpoint::new(&location.connection, &location.container, credentials),
        location.name.clone(),
    )))
}
