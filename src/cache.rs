use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::key::RequestKey;

/// Storage for raw response bytes, keyed by request
///
/// Only raw bytes are stored; results are re-parsed on every hit.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Cached bytes for this request, `None` on a miss or expired entry
    async fn load(&self, key: &RequestKey) -> CacheResult<Option<Vec<u8>>>;

    async fn save(&self, key: &RequestKey, xml: &[u8]) -> CacheResult<()>;
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl CacheStore for NullCache {
    async fn load(&self, _key: &RequestKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn save(&self, _key: &RequestKey, _xml: &[u8]) -> CacheResult<()> {
        Ok(())
    }
}

/// Build the cache store selected by `config.backend`
pub fn from_config(config: &CacheConfig) -> Arc<dyn CacheStore> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    let delimiter = config.delimiter();
    match config.backend {
        CacheBackend::None => Arc::new(NullCache),
        CacheBackend::Memory => Arc::new(MemoryCache::new(
            config.max_memory_entries,
            ttl,
            delimiter,
        )),
        CacheBackend::Disk => Arc::new(DiskCache::new(config.directory.clone(), ttl, delimiter)),
        CacheBackend::Tiered => Arc::new(TieredCache::new(config)),
    }
}

/// Metadata for cached entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheMetadata {
    pub fn new(key: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));

        Self {
            key,
            created_at: now,
            expires_at,
            size_bytes: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = size;
        self
    }
}

/// Memory cache implementation using Moka
pub struct MemoryCache {
    cache: Cache<String, Arc<Vec<u8>>>,
    delimiter: char,
}

impl MemoryCache {
    pub fn new(max_capacity: u64, ttl: Duration, delimiter: char) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, delimiter }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: String, xml: Arc<Vec<u8>>) {
        self.cache.insert(key, xml).await;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub async fn entry_count(&self) -> u64 {
        // Run sync to ensure all pending operations are complete
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn load(&self, key: &RequestKey) -> CacheResult<Option<Vec<u8>>> {
        let key = key.cache_key(self.delimiter);
        Ok(self.get(&key).await.map(|xml| xml.as_ref().clone()))
    }

    async fn save(&self, key: &RequestKey, xml: &[u8]) -> CacheResult<()> {
        self.set(key.cache_key(self.delimiter), Arc::new(xml.to_vec()))
            .await;
        Ok(())
    }
}

/// Disk cache implementation using cacache for persistent, corruption-resistant storage
pub struct DiskCache {
    cache_dir: PathBuf,
    ttl: Duration,
    delimiter: char,
}

impl DiskCache {
    pub fn new(cache_dir: PathBuf, ttl: Duration, delimiter: char) -> Self {
        Self {
            cache_dir,
            ttl,
            delimiter,
        }
    }

    /// File-system safe identifier for a cache key
    pub fn entry_id(key: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        format!("response_{:x}", hasher.finish())
    }

    /// Get cached bytes, dropping the entry if it has expired
    pub async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.get_metadata(key).await? {
            Some(metadata) if !metadata.is_expired() => {}
            _ => {
                // Clean up expired entry
                let _ = self.remove(key).await;
                return Ok(None);
            }
        }

        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(cacache::Error::IntegrityError(e)) => Err(CacheError::Corruption {
                key: key.to_string(),
                details: e.to_string(),
            }),
            Err(e) => Err(CacheError::ReadError {
                key: key.to_string(),
                details: e.to_string(),
            }),
        }
    }

    pub async fn set(&self, key: &str, data: &[u8]) -> CacheResult<()> {
        cacache::write(&self.cache_dir, key, data)
            .await
            .map_err(|e| CacheError::WriteError {
                key: key.to_string(),
                details: e.to_string(),
            })?;

        let metadata =
            CacheMetadata::new(key.to_string(), self.ttl).with_size(data.len() as u64);
        self.set_metadata(key, &metadata).await
    }

    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        let _ = cacache::remove(&self.cache_dir, key).await;
        let _ = fs::remove_file(self.metadata_path(key)).await;
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> CacheResult<bool> {
        match self.get_metadata(key).await? {
            Some(metadata) => Ok(!metadata.is_expired()),
            None => Ok(false),
        }
    }

    /// Remove every entry
    pub async fn clear(&self) -> CacheResult<()> {
        cacache::clear(&self.cache_dir)
            .await
            .map_err(|e| CacheError::ClearFailed {
                details: e.to_string(),
            })?;

        match fs::remove_dir_all(self.cache_dir.join("metadata")).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::ClearFailed {
                details: e.to_string(),
            }),
        }
    }

    async fn get_metadata(&self, key: &str) -> CacheResult<Option<CacheMetadata>> {
        match fs::read_to_string(self.metadata_path(key)).await {
            Ok(content) => {
                let metadata: CacheMetadata =
                    serde_json::from_str(&content).map_err(|e| CacheError::Corruption {
                        key: key.to_string(),
                        details: format!("Failed to parse metadata: {}", e),
                    })?;
                Ok(Some(metadata))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::ReadError {
                key: key.to_string(),
                details: format!("Failed to read metadata: {}", e),
            }),
        }
    }

    async fn set_metadata(&self, key: &str, metadata: &CacheMetadata) -> CacheResult<()> {
        let metadata_path = self.metadata_path(key);
        let write_error = |details: String| CacheError::WriteError {
            key: key.to_string(),
            details,
        };

        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(format!("Failed to create metadata directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| write_error(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&metadata_path, content)
            .await
            .map_err(|e| write_error(format!("Failed to write metadata: {}", e)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join("metadata")
            .join(format!("{}.json", Self::entry_id(key)))
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn load(&self, key: &RequestKey) -> CacheResult<Option<Vec<u8>>> {
        self.get(&key.cache_key(self.delimiter)).await
    }

    async fn save(&self, key: &RequestKey, xml: &[u8]) -> CacheResult<()> {
        self.set(&key.cache_key(self.delimiter), xml).await
    }
}

/// Two-tier cache: memory first, then disk
pub struct TieredCache {
    memory: MemoryCache,
    disk: DiskCache,
    delimiter: char,
}

impl TieredCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        let delimiter = config.delimiter();
        Self {
            memory: MemoryCache::new(config.max_memory_entries, ttl, delimiter),
            disk: DiskCache::new(config.directory.clone(), ttl, delimiter),
            delimiter,
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }
}

#[async_trait]
impl CacheStore for TieredCache {
    async fn load(&self, key: &RequestKey) -> CacheResult<Option<Vec<u8>>> {
        let key = key.cache_key(self.delimiter);

        if let Some(xml) = self.memory.get(&key).await {
            return Ok(Some(xml.as_ref().clone()));
        }

        if let Some(xml) = self.disk.get(&key).await? {
            // Populate memory cache for future access
            self.memory.set(key, Arc::new(xml.clone())).await;
            return Ok(Some(xml));
        }

        Ok(None)
    }

    async fn save(&self, key: &RequestKey, xml: &[u8]) -> CacheResult<()> {
        let key = key.cache_key(self.delimiter);
        self.memory.set(key.clone(), Arc::new(xml.to_vec())).await;
        self.disk.set(&key, xml).await
    }
}
