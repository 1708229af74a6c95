//! Blob store layer over `object_store`.
//!
//! The [`Storage`] struct maps bucket names to object stores and exposes the
//! get/put/list surface the pipeline needs. Manifests live in the links
//! bucket; output artifacts and media live in the data bucket.
//!
//! **Backends:**
//! - `file`: one directory per bucket under the configured root
//! - `s3`: Amazon S3, credentials resolved from the environment
//! - `memory`: process-local, used for tests and dry runs

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use listharvest_shared::{HarvestError, Result, StorageBackend, StorageConfig};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{DynObjectStore, ObjectStore, PutPayload};
use tracing::{debug, instrument};

/// Primary storage handle: named buckets backed by object stores.
#[derive(Clone)]
pub struct Storage {
    buckets: HashMap<String, Arc<DynObjectStore>>,
}

impl Storage {
    /// Open the links and data buckets described by `config`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let mut buckets = HashMap::new();
        for name in [&config.links_bucket, &config.data_bucket] {
            if buckets.contains_key(name.as_str()) {
                continue;
            }
            let store = create_object_store(config, name)?;
            buckets.insert(name.clone(), store);
        }

        debug!(backend = ?config.backend, buckets = buckets.len(), "opened blob store");
        Ok(Self { buckets })
    }

    /// In-memory storage with the given bucket names.
    pub fn in_memory(names: &[&str]) -> Self {
        let buckets = names
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    Arc::new(InMemory::new()) as Arc<DynObjectStore>,
                )
            })
            .collect();
        Self { buckets }
    }

    fn bucket(&self, name: &str) -> Result<&Arc<DynObjectStore>> {
        self.buckets
            .get(name)
            .ok_or_else(|| HarvestError::Storage(format!("unknown bucket '{name}'")))
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    /// Write `body` under `key`, replacing any existing object.
    #[instrument(skip(self, body), fields(len = body.len()))]
    pub async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let store = self.bucket(bucket)?;
        store
            .put(&ObjectPath::from(key), PutPayload::from(body))
            .await
            .map_err(|e| HarvestError::Storage(format!("put {bucket}/{key}: {e}")))?;
        debug!(bucket, key, "stored object");
        Ok(())
    }

    /// Read the object stored under `key`.
    #[instrument(skip(self))]
    pub async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let store = self.bucket(bucket)?;
        let bytes = store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| HarvestError::Storage(format!("get {bucket}/{key}: {e}")))?
            .bytes()
            .await
            .map_err(|e| HarvestError::Storage(format!("read {bucket}/{key}: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// List keys under `prefix` (all keys when `None`), sorted.
    pub async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        let store = self.bucket(bucket)?;
        let prefix = prefix.map(ObjectPath::from);
        let metas: Vec<_> = store
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| HarvestError::Storage(format!("list {bucket}: {e}")))?;

        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }
}

/// Build the object store for one bucket.
fn create_object_store(config: &StorageConfig, bucket: &str) -> Result<Arc<DynObjectStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemory::new())),
        StorageBackend::File => {
            let dir = Path::new(&config.root).join(bucket);
            std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;
            LocalFileSystem::new_with_prefix(&dir)
                .map(|s| Arc::new(s) as Arc<DynObjectStore>)
                .map_err(|e| HarvestError::Storage(format!("file store {}: {e}", dir.display())))
        }
        StorageBackend::S3 => {
            let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
            if let Some(region) = &config.region {
                builder = builder.with_region(region);
            }
            builder
                .build()
                .map(|s| Arc::new(s) as Arc<DynObjectStore>)
                .map_err(|e| HarvestError::Storage(format!("s3 bucket {bucket}: {e}")))
        }
    }
}
