use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

use super::{CopySource, DirectoryEndpoint, LogObjectStore};
use crate::config::StorageCredentials;

/// Directory endpoint over an S3-compatible bucket
///
/// Directories are key prefixes; a "file" is an object directly under the
/// prefix. Copies are issued as `CopyObject`, so bytes never leave the
/// storage service.
#[derive(Clone)]
pub struct S3Endpoint {
    client: Client,
    bucket: String,
}

impl S3Endpoint {
    pub fn new(endpoint: &str, bucket: &str, credentials: &StorageCredentials) -> Self {
        let creds = Credentials::new(
            &credentials.access_key,
            &credentials.secret_key,
            None,
            None,
            "ascend-storage",
        );

        let config = aws_sdk_s3::Config::builder()
            .credentials_provider(creds)
            .region(Region::new(credentials.region.clone()))
            .force_path_style(credentials.path_style)
            .endpoint_url(endpoint)
            .build();

        info!("Storage client initialized for bucket: {}", bucket);

        Self {
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", data.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to upload to S3: {}", key))?;

        Ok(())
    }

    async fn get(&self, key: &str, range: Option<String>) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .with_context(|| format!("Failed to download from S3: {}", key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(data)
    }
}

/// Prefix used to list the direct children of `dir`
fn list_prefix(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    }
}

/// HTTP byte range header for `len` bytes starting at `start`
fn byte_range(start: u64, len: u64) -> String {
    format!("bytes={}-{}", start, start + len - 1)
}

/// `x-amz-copy-source` value; each key segment is percent-encoded
fn copy_source_header(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", bucket, encoded)
}

#[async_trait]
impl DirectoryEndpoint for S3Endpoint {
    #[instrument(skip(self))]
    async fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = list_prefix(dir);
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("Failed to list s3://{}/{}", self.bucket, prefix))?;

            names.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .filter_map(|key| key.strip_prefix(prefix.as_str()))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        debug!("Listed {} files under s3://{}/{}", names.len(), self.bucket, prefix);
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn size(&self, path: &str) -> Result<u64> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .with_context(|| format!("Failed to get metadata from S3: {}", path))?;

        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    #[instrument(skip(self))]
    async fn read_range(&self, path: &str, start: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        self.get(path, Some(byte_range(start, len))).await
    }

    #[instrument(skip(self))]
    async fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path, None).await
    }

    #[instrument(skip(self))]
    async fn exists(&self, path: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!("Failed to check S3 object existence: {}", service_error))
                }
            },
        }
    }

    fn copy_source(&self, path: &str) -> CopySource {
        CopySource::Object {
            bucket: self.bucket.clone(),
            key: path.to_string(),
        }
    }

    #[instrument(skip(self))]
    async fn copy_from(&self, source: &CopySource, dest_path: &str) -> Result<()> {
        let CopySource::Object { bucket, key } = source else {
            bail!("S3 endpoint cannot copy from {:?}", source);
        };

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source_header(bucket, key))
            .key(dest_path)
            .send()
            .await
            .context("Failed to copy S3 object")?;

        info!(
            "Copied s3://{}/{} to s3://{}/{}",
            bucket, key, self.bucket, dest_path
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .with_context(|| format!("Failed to delete from S3: {}", path))?;

        info!("Deleted s3://{}/{}", self.bucket, path);
        Ok(())
    }
}

/// Central log stored as a single S3 object
pub struct S3LogObject {
    endpoint: S3Endpoint,
    key: String,
}

impl S3LogObject {
    pub fn new(endpoint: S3Endpoint, key: String) -> Self {
        Self { endpoint, key }
    }
}

#[async_trait]
impl LogObjectStore for S3LogObject {
    async fn exists(&self) -> Result<bool> {
        DirectoryEndpoint::exists(&self.endpoint, &self.key).await
    }

    async fn read_text(&self) -> Result<String> {
        let data = self.endpoint.read_all(&self.key).await?;
        String::from_utf8(data).context("Central log is not valid UTF-8")
    }

    async fn write_text(&self, contents: &str) -> Result<()> {
        self.endpoint
            .put(&self.key, contents.as_bytes().to_vec(), "text/plain; charset=utf-8")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_prefix() {
        assert_eq!(list_prefix("incoming"), "incoming/");
        assert_eq!(list_prefix("/incoming/"), "incoming/");
        assert_eq!(list_prefix(""), "");
    }

    #[test]
    fn test_byte_range_is_inclusive() {
        assert_eq!(byte_range(0, 100), "bytes=0-99");
        assert_eq!(byte_range(150, 100), "bytes=150-249");
    }

    #[test]
    fn test_copy_source_header_encodes_key_segments() {
        assert_eq!(copy_source_header("incoming", "drop/a.csv"), "incoming/drop/a.csv");
        assert_eq!(
            copy_source_header("incoming", "drop/Q1 report.xlsx"),
            "incoming/drop/Q1%20report.xlsx"
        );
        assert_eq!(
            copy_source_header("incoming", "drop/a+b 100%.csv"),
            "incoming/drop/a%2Bb%20100%25.csv"
        );
        assert_eq!(
            copy_source_header("incoming", "drop/résumé.csv"),
            "incoming/drop/r%C3%A9sum%C3%A9.csv"
        );
    }

    #[test]
    fn test_copy_source_names_bucket_and_key() {
        let credentials = StorageCredentials {
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            path_style: true,
        };
        let endpoint = S3Endpoint::new("http://localhost:9000", "incoming", &credentials);

        assert_eq!(endpoint.bucket(), "incoming");
        assert_eq!(
            endpoint.copy_source("drop/a.csv"),
            CopySource::Object {
                bucket: "incoming".to_string(),
                key: "drop/a.csv".to_string(),
            }
        );
    }
}
