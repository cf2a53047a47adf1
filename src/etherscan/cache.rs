//! HTTP response cache with pluggable stores.

use std::{
    collections::HashMap,
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy::primitives::keccak256;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::{
    fs,
    sync::{OnceCell, RwLock},
};
use tracing::{debug, warn};

use super::error::Error;

const TMP_DIR: &str = "tmp";

const CREATE_RESPONSES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS responses (
        key TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        stored_at INTEGER NOT NULL
    )
"#;

/// Selects where responses are cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackend {
    /// Every request goes to the network.
    Disabled,
    /// Responses live in process memory for the lifetime of the client.
    Memory,
    /// Responses are stored as JSON files below `dir`.
    File { dir: PathBuf },
    /// Responses are stored in a SQLite database at `path`.
    Sqlite { path: PathBuf },
}

impl Default for CacheBackend {
    fn default() -> Self {
        Self::Sqlite {
            path: default_database_path(),
        }
    }
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "none" => Ok(Self::Disabled),
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File {
                dir: default_cache_dir(),
            }),
            "sqlite" => Ok(Self::default()),
            other => Err(Error::Configuration(format!(
                "unknown cache backend '{other}', expected one of: disabled, memory, file, sqlite"
            ))),
        }
    }
}

impl CacheBackend {
    /// Creates the store for this backend, or `None` if caching is disabled.
    pub fn open(&self) -> Option<Arc<dyn CacheStore>> {
        match self {
            Self::Disabled => None,
            Self::Memory => Some(Arc::new(MemoryStore::default())),
            Self::File { dir } => Some(Arc::new(FileStore::new(dir.clone()))),
            Self::Sqlite { path } => Some(Arc::new(SqliteStore::new(path.clone()))),
        }
    }
}

fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("etherscan-client")
}

/// Directory used by the file backend unless configured otherwise.
pub fn default_cache_dir() -> PathBuf {
    cache_root().join("http-cache")
}

/// Database used by the SQLite backend unless configured otherwise.
pub fn default_database_path() -> PathBuf {
    cache_root().join("http-cache.sqlite")
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow!("Failed to create cache directory {:?}: {}", dir, e))?;
    }
    Ok(())
}

/// A response body stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub body: String,
    /// Milliseconds since the Unix epoch
    pub stored_at: u64,
}

impl CachedResponse {
    pub fn new(body: String) -> Self {
        Self {
            body,
            stored_at: now_millis(),
        }
    }

    pub fn is_expired(&self, expire_after: Duration) -> bool {
        let age = now_millis().saturating_sub(self.stored_at);
        u128::from(age) >= expire_after.as_millis()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Storage for cached responses.
///
/// Implement this to back the cache with an external key-value, document or
/// relational store and pass it to
/// [`ClientBuilder::cache_store`](crate::etherscan::ClientBuilder::cache_store).
#[async_trait]
pub trait CacheStore: Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>>;

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl MemoryStore {
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), response);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Store that keeps one JSON file per response.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    next_tmp: AtomicU64,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            next_tmp: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(anyhow!("Failed to read cache file {:?}: {}", path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                // Corrupted entries are dropped so the next request refreshes them.
                warn!("Removing unreadable cache file {:?}: {}", path, e);
                self.remove(key).await?;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()> {
        let tmp_dir = self.dir.join(TMP_DIR);
        ensure_dir(&tmp_dir).await?;

        let content = serde_json::to_string(&response)
            .map_err(|e| anyhow!("Failed to serialize cache entry: {}", e))?;

        // Write to a unique temporary file first, then move it into place.
        let tmp_path = tmp_dir.join(format!(
            "{key}.{}.{}",
            std::process::id(),
            self.next_tmp.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| anyhow!("Failed to write cache file {:?}: {}", tmp_path, e))?;

        let path = self.entry_path(key);
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(anyhow!("Failed to move cache file to {:?}: {}", path, e));
        }

        debug!("Cached response to {:?}", path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove cache file: {}", e)),
        }
    }

    /// Removes the entries and temporary files written by this store. Other
    /// files in the directory are left alone.
    async fn clear(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(anyhow!("Failed to read cache directory {:?}: {}", self.dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| anyhow!("Failed to read cache directory {:?}: {}", self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| anyhow!("Failed to remove cache file {:?}: {}", path, e))?;
            }
        }

        let tmp_dir = self.dir.join(TMP_DIR);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)
                .await
                .map_err(|e| anyhow!("Failed to remove {:?}: {}", tmp_dir, e))?;
        }
        Ok(())
    }
}

/// Store backed by a single SQLite database.
///
/// The connection pool is opened on first use, creating the database file and
/// its parent directory if needed.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                if let Some(parent) = self.path.parent() {
                    ensure_dir(parent).await?;
                }

                let options = SqliteConnectOptions::new()
                    .filename(&self.path)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .connect_with(options)
                    .await
                    .map_err(|e| anyhow!("Failed to open cache database {:?}: {}", self.path, e))?;

                sqlx::query(CREATE_RESPONSES_TABLE)
                    .execute(&pool)
                    .await
                    .map_err(|e| anyhow!("Failed to create cache table: {}", e))?;

                debug!("Opened cache database {:?}", self.path);
                Ok::<_, anyhow::Error>(pool)
            })
            .await
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT body, stored_at FROM responses WHERE key = ?")
                .bind(key)
                .fetch_optional(self.pool().await?)
                .await
                .map_err(|e| anyhow!("Failed to read cache entry: {}", e))?;

        Ok(row.map(|(body, stored_at)| CachedResponse {
            body,
            stored_at: u64::try_from(stored_at).unwrap_or_default(),
        }))
    }

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO responses (key, body, stored_at) VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                body = excluded.body,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(key)
        .bind(&response.body)
        .bind(i64::try_from(response.stored_at).unwrap_or(i64::MAX))
        .execute(self.pool().await?)
        .await
        .map_err(|e| anyhow!("Failed to write cache entry: {}", e))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM responses WHERE key = ?")
            .bind(key)
            .execute(self.pool().await?)
            .await
            .map_err(|e| anyhow!("Failed to remove cache entry: {}", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM responses")
            .execute(self.pool().await?)
            .await
            .map_err(|e| anyhow!("Failed to clear cache database: {}", e))?;
        Ok(())
    }
}

/// A store plus the expiry applied to its entries.
///
/// Store failures are logged and treated as misses; they never fail a
/// request.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    expire_after: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, expire_after: Duration) -> Self {
        Self {
            store,
            expire_after,
        }
    }

    /// Derives the key of a request from its method, URL and parameters.
    pub fn key(method: &str, url: &str, canonical_params: &str) -> String {
        let hash = keccak256(format!("{method} {url}?{canonical_params}"));
        hex::encode(hash)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(response)) if !response.is_expired(self.expire_after) => {
                debug!("Cache hit for {}", key);
                Some(response.body)
            }
            Ok(Some(_)) => {
                debug!("Cache entry expired for {}", key);
                if let Err(e) = self.store.remove(key).await {
                    warn!("Failed to evict expired cache entry {}: {}", key, e);
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, body: String) {
        if let Err(e) = self.store.put(key, CachedResponse::new(body)).await {
            warn!("Failed to cache response {}: {}", key, e);
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert_eq!("None".parse::<CacheBackend>().unwrap(), CacheBackend::Disabled);
        assert!(matches!(
            "file".parse::<CacheBackend>().unwrap(),
            CacheBackend::File { .. }
        ));
        assert_eq!(
            "SQLite".parse::<CacheBackend>().unwrap(),
            CacheBackend::default()
        );
        assert!(matches!(
            "RedisBackend".parse::<CacheBackend>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_backend_open() {
        assert!(CacheBackend::Disabled.open().is_none());
        assert!(CacheBackend::Memory.open().is_some());
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = ResponseCache::key("POST", "https://api.etherscan.io/api", "a=1&b=2");
        let b = ResponseCache::key("POST", "https://api.etherscan.io/api", "a=1&b=2");
        let c = ResponseCache::key("GET", "https://api.etherscan.io/api", "a=1&b=2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_expiry() {
        let fresh = CachedResponse::new("{}".to_string());
        assert!(!fresh.is_expired(Duration::from_secs(5)));
        assert!(fresh.is_expired(Duration::ZERO));

        let old = CachedResponse {
            body: "{}".to_string(),
            stored_at: now_millis() - 10_000,
        };
        assert!(old.is_expired(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = Arc::new(MemoryStore::default());
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(60));

        assert_eq!(cache.get("k").await, None);
        cache.put("k", "body".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("body"));
        assert_eq!(store.len().await, 1);

        cache.clear().await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_evicted() {
        let store = Arc::new(MemoryStore::default());
        let cache = ResponseCache::new(store.clone(), Duration::ZERO);

        cache.put("k", "body".to_string()).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_file_store() {
        let temp_dir = tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("cache"));

        assert!(store.get("k").await.unwrap().is_none());

        let response = CachedResponse::new("{\"status\":\"1\"}".to_string());
        store.put("k", response.clone()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(response));
        assert!(store.dir().join("k.json").exists());

        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_clear_keeps_foreign_files() {
        let temp_dir = tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        let notes = temp_dir.path().join("notes.txt");
        std::fs::write(&notes, "keep me").unwrap();

        store
            .put("k", CachedResponse::new("{}".to_string()))
            .await
            .unwrap();
        std::fs::write(temp_dir.path().join(TMP_DIR).join("k.1.0"), "partial").unwrap();

        store.clear().await.unwrap();

        assert!(notes.exists());
        assert!(!temp_dir.path().join("k.json").exists());
        assert!(!temp_dir.path().join(TMP_DIR).exists());
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("cache.sqlite");
        let store = SqliteStore::new(path.clone());

        assert!(store.get("k").await.unwrap().is_none());
        assert!(path.exists());

        let first = CachedResponse {
            body: "{\"status\":\"1\"}".to_string(),
            stored_at: 1,
        };
        store.put("k", first).await.unwrap();

        let second = CachedResponse::new("{\"status\":\"1\",\"result\":\"2\"}".to_string());
        store.put("k", second.clone()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(second.clone()));

        // Entries outlive the store that wrote them.
        let reopened = SqliteStore::new(path);
        assert_eq!(reopened.get("k").await.unwrap(), Some(second));

        reopened.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        store
            .put("a", CachedResponse::new("{}".to_string()))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert!(reopened.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_backend_through_cache() {
        let temp_dir = tempdir().unwrap();
        let backend = CacheBackend::Sqlite {
            path: temp_dir.path().join("cache.sqlite"),
        };
        let cache = ResponseCache::new(backend.open().unwrap(), Duration::from_secs(60));

        cache.put("k", "body".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_file_store_drops_corrupted_entry() {
        let temp_dir = tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        std::fs::write(temp_dir.path().join("bad.json"), "not json").unwrap();

        assert!(store.get("bad").await.unwrap().is_none());
        assert!(!temp_dir.path().join("bad.json").exists());
    }
}
