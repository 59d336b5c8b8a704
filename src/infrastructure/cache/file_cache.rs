//! File-based cache implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::{AnalysisCache, CacheError};

/// Cache entry metadata for TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: serde_json::Value,
    created_at: u64,
    expires_at: u64,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        current_timestamp() >= self.expires_at
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub expired_entries: u64,
    pub cleanup_runs: u64,
}

/// File-based cache with per-entry TTL.
///
/// One JSON file per key, named by the SHA-256 of the key. Writes go to a
/// temporary file first and are renamed into place.
pub struct FileCacheRepository {
    cache_dir: PathBuf,
    file_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    stats: Mutex<CacheStats>,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl FileCacheRepository {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            file_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn hashed_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn cache_path(&self, hashed: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", hashed))
    }

    fn temp_cache_path(&self, hashed: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.tmp", hashed))
    }

    async fn file_lock(&self, hashed: &str) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().await;
        locks
            .entry(hashed.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop lock slots nobody is holding; the map alone keeps one reference
    async fn prune_locks(&self) {
        let mut locks = self.file_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn atomic_write(&self, hashed: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).await?;

        let temp_path = self.temp_cache_path(hashed);
        let final_path = self.cache_path(hashed);
        let content = serde_json::to_vec(entry)?;

        fs::write(&temp_path, content).await.map_err(|e| {
            error!("Failed to write temporary cache file: {}", e);
            CacheError::Io(e)
        })?;
        fs::rename(&temp_path, &final_path).await.map_err(|e| {
            error!("Failed to rename cache file: {}", e);
            CacheError::Io(e)
        })?;
        Ok(())
    }

    pub async fn get_stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    /// Remove every expired or unreadable entry, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<u64, CacheError> {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut cleaned = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }

            let remove = match Self::read_entry(&path).await {
                Ok(Some(entry)) => entry.is_expired(),
                Ok(None) => false,
                Err(e) => {
                    warn!("Removing unreadable cache file {:?}: {}", path, e);
                    true
                }
            };

            if remove {
                match fs::remove_file(&path).await {
                    Ok(()) => cleaned += 1,
                    Err(e) => warn!("Failed to remove cache file {:?}: {}", path, e),
                }
            }
        }

        self.prune_locks().await;

        let mut stats = self.stats.lock().await;
        stats.expired_entries += cleaned;
        stats.cleanup_runs += 1;
        debug!("Cache cleanup removed {} entries", cleaned);
        Ok(cleaned)
    }

    /// Periodically purge expired entries until `shutdown` is cancelled
    pub fn start_background_cleanup(
        self: Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match self.cleanup_expired().await {
                            Ok(cleaned) if cleaned > 0 => info!("Background cache cleanup removed {} entries", cleaned),
                            Ok(_) => {}
                            Err(e) => error!("Background cache cleanup failed: {}", e),
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl AnalysisCache for FileCacheRepository {
    async fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let hashed = Self::hashed_key(key);
        let path = self.cache_path(&hashed);

        let lock = self.file_lock(&hashed).await;
        let _guard = lock.lock().await;

        let entry = match Self::read_entry(&path).await? {
            Some(entry) if entry.is_expired() => {
                if let Err(e) = fs::remove_file(&path).await {
                    warn!("Failed to remove expired cache file {:?}: {}", path, e);
                }
                let mut stats = self.stats.lock().await;
                stats.expired_entries += 1;
                stats.misses += 1;
                return Ok(None);
            }
            Some(entry) => entry,
            None => {
                self.stats.lock().await.misses += 1;
                return Ok(None);
            }
        };

        self.stats.lock().await.hits += 1;
        debug!(
            "Cache hit for key: {} (age {}s)",
            key,
            current_timestamp().saturating_sub(entry.created_at)
        );
        Ok(Some(entry.data))
    }

    async fn set_json(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let hashed = Self::hashed_key(key);
        let lock = self.file_lock(&hashed).await;
        let _guard = lock.lock().await;

        let now = current_timestamp();
        let entry = CacheEntry {
            data: value,
            created_at: now,
            expires_at: now + ttl.as_secs(),
        };
        self.atomic_write(&hashed, &entry).await?;

        self.stats.lock().await.writes += 1;
        debug!("Cached entry for key: {} (expires in {}s)", key, ttl.as_secs());
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let hashed = Self::hashed_key(key);
        let result = {
            let lock = self.file_lock(&hashed).await;
            let _guard = lock.lock().await;
            fs::remove_file(self.cache_path(&hashed)).await
        };
        self.prune_locks().await;

        match result {
            Ok(()) => {
                debug!("Invalidated cache entry for key: {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}
