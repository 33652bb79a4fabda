//! Response Cache - Keep vocabulary search responses between runs
//!
//! Responses are stored in one JSON index file inside the cache directory,
//! keyed by the normalized query. Entries older than the retention window
//! are ignored on read and dropped by [`ResponseCache::prune_expired`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CACHE_RETENTION_DAYS;
use crate::error::CacheResult;

/// Name of the index file inside the cache directory
const INDEX_FILE: &str = "vocabulary-responses.json";

/// A stored response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status of the original response
    pub status: u16,
    /// Raw response body
    pub body: String,
    /// When the response was fetched
    pub cached_at: DateTime<Utc>,
}

/// Cache of vocabulary responses with time-based expiry
#[derive(Debug)]
pub struct ResponseCache {
    /// Index file, `None` for a cache that lives only in memory
    index_path: Option<PathBuf>,
    /// How long an entry stays valid
    retention: Duration,
    /// Loaded entries (normalized key -> response)
    entries: HashMap<String, CachedResponse>,
    /// Whether entries changed since load
    dirty: bool,
}

impl ResponseCache {
    /// Open the cache in `dir`, loading existing entries from disk
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_dir_and_retention(dir, Duration::days(CACHE_RETENTION_DAYS))
    }

    /// Open the cache in `dir` with a custom retention window
    pub fn with_dir_and_retention(dir: impl AsRef<Path>, retention: Duration) -> Self {
        let index_path = dir.as_ref().join(INDEX_FILE);
        let entries = load_index(&index_path);
        debug!("Loaded {} cached responses from {}", entries.len(), index_path.display());

        Self {
            index_path: Some(index_path),
            retention,
            entries,
            dirty: false,
        }
    }

    /// A cache that is never written to disk
    pub fn in_memory(retention: Duration) -> Self {
        Self {
            index_path: None,
            retention,
            entries: HashMap::new(),
            dirty: false,
        }
    }

    /// Build the cache key for a query in a language
    pub fn key(language: &str, query: &str) -> String {
        format!("{}:{}", language.trim().to_lowercase(), query.trim().to_uppercase())
    }

    /// Get a response if present and not expired
    pub fn get(&self, key: &str) -> Option<&CachedResponse> {
        self.get_at(key, Utc::now())
    }

    /// Get a response if present and not expired at `now`
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<&CachedResponse> {
        self.entries
            .get(key)
            .filter(|entry| !self.is_expired(entry, now))
    }

    /// Store a response fetched now
    pub fn insert(&mut self, key: impl Into<String>, status: u16, body: impl Into<String>) {
        self.insert_at(key, status, body, Utc::now());
    }

    /// Store a response fetched at `cached_at`
    pub fn insert_at(
        &mut self,
        key: impl Into<String>,
        status: u16,
        body: impl Into<String>,
        cached_at: DateTime<Utc>,
    ) {
        self.entries.insert(
            key.into(),
            CachedResponse {
                status,
                body: body.into(),
                cached_at,
            },
        );
        self.dirty = true;
    }

    /// Drop expired entries, returning how many were removed
    pub fn prune_expired(&mut self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    /// Drop entries expired at `now`
    pub fn prune_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let retention = self.retention;
        self.entries.retain(|_, entry| now - entry.cached_at <= retention);

        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Write the index to disk if anything changed
    pub fn persist(&mut self) -> CacheResult<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, content)?;

        self.dirty = false;
        Ok(())
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CachedResponse, now: DateTime<Utc>) -> bool {
        now - entry.cached_at > self.retention
    }
}

/// Read the index file, starting empty if it is missing or unreadable
fn load_index(path: &Path) -> HashMap<String, CachedResponse> {
    if !path.exists() {
        return HashMap::new();
    }

    match fs::read_to_string(path).map(|content| serde_json::from_str(&content)) {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            warn!("Ignoring corrupt response cache {}: {}", path.display(), e);
            HashMap::new()
        }
        Err(e) => {
            warn!("Could not read response cache {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_normalization() {
        assert_eq!(ResponseCache::key("EN", " fish "), "en:FISH");
        assert_eq!(ResponseCache::key("en", "FISH*"), "en:FISH*");
        assert_ne!(ResponseCache::key("en", "FISH"), ResponseCache::key("fr", "FISH"));
    }

    #[test]
    fn test_expiry_checked_on_read() {
        let mut cache = ResponseCache::in_memory(Duration::days(7));
        let fetched = Utc::now() - Duration::days(10);
        cache.insert_at("en:FISH", 200, "{}", fetched);

        assert!(cache.get_at("en:FISH", fetched + Duration::days(6)).is_some());
        assert!(cache.get_at("en:FISH", fetched + Duration::days(8)).is_none());
        assert!(cache.get("en:FISH").is_none());
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let mut cache = ResponseCache::in_memory(Duration::days(7));
        let now = Utc::now();
        cache.insert_at("en:OLD", 200, "{}", now - Duration::days(30));
        cache.insert_at("en:NEW", 200, "{}", now - Duration::hours(1));

        assert_eq!(cache.prune_expired_at(now), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("en:NEW", now).is_some());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempdir().unwrap();

        let mut cache = ResponseCache::with_dir(dir.path());
        cache.insert("en:MAIZE", 200, r#"{"results":[]}"#);
        cache.persist().unwrap();

        let reloaded = ResponseCache::with_dir(dir.path());
        let entry = reloaded.get("en:MAIZE").unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, r#"{"results":[]}"#);
    }

    #[test]
    fn test_corrupt_index_starts_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "not json").unwrap();

        let cache = ResponseCache::with_dir(dir.path());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_in_memory_never_writes() {
        let mut cache = ResponseCache::in_memory(Duration::days(7));
        cache.insert("en:FISH", 200, "{}");
        assert!(cache.persist().is_ok());
    }
}
