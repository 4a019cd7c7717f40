use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::intake::fingerprint_text;

/// One cached result on disk. The full key is stored alongside the payload
/// so a hash collision can never serve a result for a different input.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: serde_json::Value,
    created_at: u64,
}

/// Disk-backed result cache: one JSON file per entry, keyed by a content
/// fingerprint, evicting oldest-created entries past a size limit.
pub struct ResultCache {
    dir: PathBuf,
    enabled: bool,
    max_entries: usize,
}

/// Summary of what the cache currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

impl ResultCache {
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let dir = config.resolve_dir();
        if config.enabled {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Cache(format!("failed to create cache dir {}: {e}", dir.display()))
            })?;
        }
        Ok(Self {
            dir,
            enabled: config.enabled,
            max_entries: config.max_entries,
        })
    }

    /// Look up a previously stored result. Corrupt or mismatched entries
    /// are removed and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let path = self.entry_path(key);
        let raw = std::fs::read_to_string(&path).ok()?;

        let entry: StoredEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, discarding");
                std::fs::remove_file(&path).ok();
                return None;
            }
        };

        if entry.key != key {
            warn!(
                stored = %entry.key,
                requested = %key,
                "cache key mismatch, discarding entry"
            );
            std::fs::remove_file(&path).ok();
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => {
                debug!(%key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache payload shape mismatch, discarding");
                std::fs::remove_file(&path).ok();
                None
            }
        }
    }

    /// Store a result, then evict oldest entries beyond the limit.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = StoredEntry {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
            created_at: unix_now(),
        };

        let path = self.entry_path(key);
        std::fs::write(&path, serde_json::to_string_pretty(&entry)?)
            .map_err(|e| Error::Cache(format!("failed to write cache entry: {e}")))?;
        debug!(%key, "cache entry written");

        self.evict_excess()?;
        Ok(())
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        for path in self.entry_files()? {
            std::fs::remove_file(&path)
                .map_err(|e| Error::Cache(format!("failed to remove {}: {e}", path.display())))?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let mut entries = 0;
        let mut total_bytes = 0;
        if let Ok(files) = self.entry_files() {
            for path in files {
                entries += 1;
                total_bytes += std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            }
        }
        CacheStats {
            entries,
            total_bytes,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint_text(key)))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(files),
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Least-recently-added eviction: drop oldest-created entries until the
    /// configured count fits. Unreadable entries are dropped first.
    fn evict_excess(&self) -> Result<()> {
        let files = self.entry_files()?;
        if files.len() <= self.max_entries {
            return Ok(());
        }

        let mut aged: Vec<(u64, PathBuf)> = Vec::with_capacity(files.len());
        for path in files {
            match std::fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<StoredEntry>(&raw).ok())
            {
                Some(entry) => aged.push((entry.created_at, path)),
                None => {
                    warn!(path = %path.display(), "unreadable cache entry, removing");
                    std::fs::remove_file(&path).ok();
                }
            }
        }

        if aged.len() <= self.max_entries {
            return Ok(());
        }

        aged.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let excess = aged.len() - self.max_entries;
        for (created_at, path) in aged.into_iter().take(excess) {
            debug!(created_at, path = %path.display(), "evicting cache entry");
            std::fs::remove_file(&path).ok();
        }
        Ok(())
    }
}

/// Cache key for a transcription result.
pub fn transcription_key(fingerprint: &str, language: Option<&str>) -> String {
    format!("transcribe:{fingerprint}:{}", language.unwrap_or("auto"))
}

/// Cache key for a processed-text result.
pub fn processing_key(transcript_fingerprint: &str, template_id: &str) -> String {
    format!("process:{transcript_fingerprint}:{template_id}")
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_cache(name: &str, max_entries: usize) -> ResultCache {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        ResultCache::open(&CacheConfig {
            enabled: true,
            dir: Some(dir),
            max_entries,
        })
        .unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = temp_cache("aiscribe_test_cache_roundtrip", 16);
        cache.put("transcribe:abc:auto", &"hello".to_string()).unwrap();
        let value: Option<String> = cache.get("transcribe:abc:auto");
        assert_eq!(value.as_deref(), Some("hello"));
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let cache = temp_cache("aiscribe_test_cache_miss", 16);
        let value: Option<String> = cache.get("transcribe:unknown:auto");
        assert!(value.is_none());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let dir = std::env::temp_dir().join("aiscribe_test_cache_disabled");
        let _ = fs::remove_dir_all(&dir);
        let cache = ResultCache::open(&CacheConfig {
            enabled: false,
            dir: Some(dir),
            max_entries: 16,
        })
        .unwrap();
        cache.put("k", &"v".to_string()).unwrap();
        let value: Option<String> = cache.get("k");
        assert!(value.is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss_and_removed() {
        let cache = temp_cache("aiscribe_test_cache_corrupt", 16);
        cache.put("key1", &"v".to_string()).unwrap();
        let path = cache.entry_path("key1");
        fs::write(&path, "{ not json").unwrap();

        let value: Option<String> = cache.get("key1");
        assert!(value.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_stored_key_must_match_exactly() {
        let cache = temp_cache("aiscribe_test_cache_keymatch", 16);
        cache.put("key1", &"v".to_string()).unwrap();

        // Simulate a hash collision: rewrite the entry claiming another key.
        let path = cache.entry_path("key1");
        let raw = fs::read_to_string(&path).unwrap();
        let tampered = raw.replace("key1", "key2");
        fs::write(&path, tampered).unwrap();

        let value: Option<String> = cache.get("key1");
        assert!(value.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_eviction_drops_oldest_first() {
        let cache = temp_cache("aiscribe_test_cache_evict", 2);

        // Seed two entries with explicit old timestamps.
        for (i, created_at) in [(1, 100u64), (2, 200u64)] {
            let key = format!("key{i}");
            let entry = StoredEntry {
                key: key.clone(),
                value: serde_json::json!("v"),
                created_at,
            };
            fs::write(
                cache.entry_path(&key),
                serde_json::to_string(&entry).unwrap(),
            )
            .unwrap();
        }

        // A third put exceeds max_entries=2 and must evict the oldest.
        cache.put("key3", &"v".to_string()).unwrap();

        assert!(cache.get::<String>("key1").is_none(), "oldest evicted");
        assert!(cache.get::<String>("key2").is_some());
        assert!(cache.get::<String>("key3").is_some());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = temp_cache("aiscribe_test_cache_clear", 16);
        cache.put("a", &"1".to_string()).unwrap();
        cache.put("b", &"2".to_string()).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_bytes > 0);

        cache.clear().unwrap();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_key_builders() {
        assert_eq!(transcription_key("fp", Some("en")), "transcribe:fp:en");
        assert_eq!(transcription_key("fp", None), "transcribe:fp:auto");
        assert_eq!(processing_key("fp", "meeting_notes"), "process:fp:meeting_notes");
    }
}
