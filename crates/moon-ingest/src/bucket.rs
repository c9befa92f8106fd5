//! # Object-Store Client
//!
//! Lists, downloads, reads, and archives objects in named buckets. Buckets are
//! resolved to `object_store` handles through a [`BucketResolver`]:
//! [`S3Buckets`] for production and [`StaticBuckets`] for in-memory or
//! local-filesystem stores.
//!
//! Listing follows every continuation page the remote returns, so a prefix
//! with more than one page of objects is listed completely.

use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use moon_core::ObjectKey;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore};
use parking_lot::Mutex;

use crate::config::ObjectStoreSettings;

/// Failures talking to a bucket or staging its objects locally.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The bucket could not be resolved to a store.
    #[error("bucket \"{bucket}\" is not available: {reason}")]
    UnknownBucket {
        /// Bucket name as requested.
        bucket: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The remote rejected or failed a request.
    #[error("object store request failed for {bucket}/{target}: {source}")]
    Request {
        /// Bucket name.
        bucket: String,
        /// Key or prefix the request addressed.
        target: String,
        /// Underlying client error.
        #[source]
        source: object_store::Error,
    },

    /// Writing a downloaded object to local disk failed.
    #[error("failed to stage object at {path}: {source}")]
    Staging {
        /// Local destination.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ObjectStoreError {
    fn request(bucket: &str, target: impl Into<String>, source: object_store::Error) -> Self {
        Self::Request {
            bucket: bucket.to_string(),
            target: target.into(),
            source,
        }
    }
}

/// Maps a bucket name to a store handle.
pub trait BucketResolver: Send + Sync {
    /// Return the store backing `bucket`.
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError>;
}

/// Builds one `AmazonS3` client per bucket from `AWS_*` environment settings.
///
/// Clients are cached, so repeated runs against the same bucket share a
/// connection pool.
pub struct S3Buckets {
    settings: ObjectStoreSettings,
    clients: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl S3Buckets {
    /// Create a resolver with the given client settings.
    pub fn new(settings: ObjectStoreSettings) -> Self {
        Self {
            settings,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl BucketResolver for S3Buckets {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        let mut clients = self.clients.lock();
        if let Some(store) = clients.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(ClientOptions::new().with_timeout(self.settings.timeout))
            .build()
            .map_err(|e| ObjectStoreError::UnknownBucket {
                bucket: bucket.to_string(),
                reason: e.to_string(),
            })?;
        let store: Arc<dyn ObjectStore> = Arc::new(store);
        clients.insert(bucket.to_string(), Arc::clone(&store));
        tracing::debug!(bucket, "built S3 client");
        Ok(store)
    }
}

/// Serves a fixed set of pre-registered stores.
#[derive(Default, Clone)]
pub struct StaticBuckets {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl StaticBuckets {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `bucket`.
    pub fn with_bucket(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }
}

impl BucketResolver for StaticBuckets {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
        self.stores
            .get(bucket)
            .cloned()
            .ok_or_else(|| ObjectStoreError::UnknownBucket {
                bucket: bucket.to_string(),
                reason: "not registered".to_string(),
            })
    }
}

/// Operations the ingestion orchestrator needs from object storage.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Every key under `prefix`, in the order the store returns them.
    ///
    /// The prefix itself is never returned, and a missing trailing `/` on
    /// the prefix is tolerated.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectKey>, ObjectStoreError>;

    /// Write `key` to `destination`, creating parent directories.
    async fn download(
        &self,
        bucket: &str,
        key: &ObjectKey,
        destination: &FsPath,
    ) -> Result<bool, ObjectStoreError>;

    /// The full contents of `key`.
    async fn read(&self, bucket: &str, key: &ObjectKey) -> Result<Bytes, ObjectStoreError>;

    /// Move `key` to `<archive_prefix>/<base name>` and return the new key.
    async fn archive(
        &self,
        bucket: &str,
        key: &ObjectKey,
        archive_prefix: &str,
    ) -> Result<ObjectKey, ObjectStoreError>;
}

/// [`ObjectSource`] over `object_store` handles.
#[derive(Clone)]
pub struct ObjectStoreClient {
    buckets: Arc<dyn BucketResolver>,
}

impl ObjectStoreClient {
    /// Create a client resolving buckets through `buckets`.
    pub fn new(buckets: Arc<dyn BucketResolver>) -> Self {
        Self { buckets }
    }

    /// Client for S3 buckets configured from the environment.
    pub fn s3(settings: ObjectStoreSettings) -> Self {
        Self::new(Arc::new(S3Buckets::new(settings)))
    }
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient").finish_non_exhaustive()
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// Parse a listed key back into a store path without re-encoding it.
fn location(bucket: &str, key: &str) -> Result<Path, ObjectStoreError> {
    Path::parse(key).map_err(|e| ObjectStoreError::request(bucket, key, e.into()))
}

fn archive_key(key: &ObjectKey, archive_prefix: &str) -> ObjectKey {
    match normalize_prefix(archive_prefix).as_str() {
        "" => ObjectKey::new(key.base_name()),
        prefix => ObjectKey::new(format!("{prefix}/{}", key.base_name())),
    }
}

#[async_trait]
impl ObjectSource for ObjectStoreClient {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectKey>, ObjectStoreError> {
        let store = self.buckets.resolve(bucket)?;
        let prefix = normalize_prefix(prefix);
        let location = location(bucket, &prefix)?;

        let objects: Vec<_> = store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| ObjectStoreError::request(bucket, prefix.as_str(), e))?;

        let keys: Vec<ObjectKey> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .filter(|key| key.trim_end_matches('/') != prefix && !key.ends_with('/'))
            .map(ObjectKey::new)
            .collect();

        tracing::info!(bucket, prefix = %prefix, files = keys.len(), "listed bucket");
        Ok(keys)
    }

    async fn download(
        &self,
        bucket: &str,
        key: &ObjectKey,
        destination: &FsPath,
    ) -> Result<bool, ObjectStoreError> {
        let contents = self.read(bucket, key).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ObjectStoreError::Staging {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(destination, &contents)
            .await
            .map_err(|source| ObjectStoreError::Staging {
                path: destination.to_path_buf(),
                source,
            })?;

        tracing::debug!(bucket, key = %key, bytes = contents.len(), path = %destination.display(), "downloaded object");
        Ok(true)
    }

    async fn read(&self, bucket: &str, key: &ObjectKey) -> Result<Bytes, ObjectStoreError> {
        let store = self.buckets.resolve(bucket)?;
        let location = location(bucket, key.as_str())?;
        let result = store
            .get(&location)
            .await
            .map_err(|e| ObjectStoreError::request(bucket, key.as_str(), e))?;
        result
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::request(bucket, key.as_str(), e))
    }

    async fn archive(
        &self,
        bucket: &str,
        key: &ObjectKey,
        archive_prefix: &str,
    ) -> Result<ObjectKey, ObjectStoreError> {
        let store = self.buckets.resolve(bucket)?;
        let target = archive_key(key, archive_prefix);
        if target == *key {
            tracing::warn!(bucket, key = %key, "archive target is the source key, leaving object in place");
            return Ok(target);
        }
        let from = location(bucket, key.as_str())?;
        let to = location(bucket, target.as_str())?;

        store
            .copy(&from, &to)
            .await
            .map_err(|e| ObjectStoreError::request(bucket, key.as_str(), e))?;
        store
            .delete(&from)
            .await
            .map_err(|e| ObjectStoreError::request(bucket, key.as_str(), e))?;

        tracing::info!(bucket, key = %key, archived_to = %target, "archived object");
        Ok(target)
    }
}
