//! Object storage for drift records and reference data.
//!
//! Two backends: a directory standing in for a bucket, and an HTTP client for
//! S3-compatible endpoints addressed as `{endpoint}/{bucket}/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the file at `local_path` to `remote_key`, replacing any existing object.
    async fn upload(&self, local_path: &Path, remote_key: &str) -> ServerResult<()>;
    /// Fetch the whole object stored under `remote_key`.
    async fn download(&self, remote_key: &str) -> ServerResult<Bytes>;
    fn describe(&self) -> String;
}

/// Bucket backed by a local directory (`<root>/<bucket>/<key>`).
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            dir: root.as_ref().join(bucket),
        }
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> ServerResult<()> {
        let dest = self.object_path(remote_key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServerError::io(parent, e))?;
        }
        tokio::fs::copy(local_path, &dest)
            .await
            .map_err(|e| ServerError::io(local_path, e))?;
        tracing::debug!(key = remote_key, dest = %dest.display(), "uploaded object");
        Ok(())
    }

    async fn download(&self, remote_key: &str) -> ServerResult<Bytes> {
        let path = self.object_path(remote_key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(key = remote_key, bytes = data.len(), "downloaded object");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServerError::NotFound {
                key: remote_key.to_string(),
            }),
            Err(e) => Err(ServerError::io(path, e)),
        }
    }

    fn describe(&self) -> String {
        format!("local bucket at {}", self.dir.display())
    }
}

/// S3-compatible store reached over plain HTTP PUT/GET.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str) -> ServerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServerError::Storage(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> ServerResult<()> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| ServerError::io(local_path, e))?;
        let url = self.object_url(remote_key);
        let resp = self
            .client
            .put(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| ServerError::Storage(format!("put {remote_key} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(ServerError::Storage(format!(
                "put {remote_key} failed: status {}",
                resp.status()
            )));
        }
        tracing::debug!(key = remote_key, %url, "uploaded object");
        Ok(())
    }

    async fn download(&self, remote_key: &str) -> ServerResult<Bytes> {
        let url = self.object_url(remote_key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServerError::Storage(format!("get {remote_key} failed: {e}")))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ServerError::NotFound {
                key: remote_key.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(ServerError::Storage(format!(
                "get {remote_key} failed: status {}",
                resp.status()
            )));
        }
        let data = resp
            .bytes()
            .await
            .map_err(|e| ServerError::Storage(format!("reading {remote_key} failed: {e}")))?;
        tracing::debug!(key = remote_key, bytes = data.len(), "downloaded object");
        Ok(data)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }
}
