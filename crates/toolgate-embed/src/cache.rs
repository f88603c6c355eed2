//! Content-addressed embedding cache: one JSON file per upstream server,
//! named by a SHA-256 hash of the server's launch configuration.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use toolgate_core::{ToolgateError, ToolgateResult};
use tracing::{debug, error, info, warn};

/// Flush threshold for the incremental cache writer.
const WRITE_CHUNK_BYTES: usize = 1024 * 1024;

/// Mapping of tool name to embedding vector, as stored on disk.
pub type EmbeddingMap = HashMap<String, Vec<f32>>;

/// Compute the cache key for an upstream server: hex SHA-256 of the
/// canonical `{name, config}` encoding. Env entries are ordered by key so
/// the hash is a pure function of the configuration.
pub fn generate_server_hash(
    name: &str,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> String {
    let sorted_env: BTreeMap<&str, &str> = env
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let canonical = serde_json::json!({
        "name": name,
        "config": {
            "command": command,
            "args": args,
            "env": sorted_env,
        }
    });
    // Struct-free canonical form; BTreeMap fixes the env order.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Directory of per-server embedding files.
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.json"))
    }

    /// Read the cached embeddings for a server hash. An absent or
    /// unparseable file is a cache miss, not an error.
    pub async fn get_cached_embeddings(&self, hash: &str) -> Option<EmbeddingMap> {
        let path = self.file_path(hash);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str::<EmbeddingMap>(&raw) {
            Ok(map) => {
                debug!(hash = %hash, tools = map.len(), "embedding cache hit");
                Some(map)
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "discarding unparseable embedding cache file");
                None
            }
        }
    }

    /// Persist the embedding map for a server hash.
    ///
    /// The JSON object is streamed entry by entry through a buffer flushed at
    /// megabyte boundaries, then moved into place atomically.
    pub async fn save_embeddings_to_cache(
        &self,
        hash: &str,
        map: &EmbeddingMap,
    ) -> ToolgateResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ToolgateError::Cache(format!("create {}: {e}", self.dir.display())))?;

        let final_path = self.file_path(hash);
        let tmp_path = self.dir.join(format!("{hash}.json.tmp"));
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| ToolgateError::Cache(format!("create {}: {e}", tmp_path.display())))?;

        let mut buffer = String::with_capacity(WRITE_CHUNK_BYTES + 4096);
        buffer.push('{');
        for (i, (tool, vector)) in map.iter().enumerate() {
            if i > 0 {
                buffer.push(',');
            }
            buffer.push_str(&serde_json::to_string(tool)?);
            buffer.push(':');
            buffer.push_str(&serde_json::to_string(vector)?);

            if buffer.len() >= WRITE_CHUNK_BYTES {
                file.write_all(buffer.as_bytes())
                    .await
                    .map_err(|e| ToolgateError::Cache(format!("write cache: {e}")))?;
                buffer.clear();
            }
        }
        buffer.push('}');
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| ToolgateError::Cache(format!("write cache: {e}")))?;
        file.flush()
            .await
            .map_err(|e| ToolgateError::Cache(format!("flush cache: {e}")))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| ToolgateError::Cache(format!("rename cache file: {e}")))?;

        info!(hash = %hash, tools = map.len(), "embedding cache written");
        Ok(())
    }

    /// Delete every `<hash>.json` in the cache directory whose hash is not in
    /// the active set. Non-JSON files are left alone; a missing directory is
    /// a no-op.
    pub async fn cleanup_unused_cache(&self, active_hashes: &HashSet<String>) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            if active_hashes.contains(&stem) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(file = %path.display(), "removed orphan embedding cache file"),
                Err(e) => error!(file = %path.display(), error = %e, "failed to remove cache file"),
            }
        }
    }
}

/// Estimate the in-memory footprint of an embedding map: two bytes per key
/// character plus eight bytes per stored value.
pub fn calculate_memory_usage(map: &EmbeddingMap) -> usize {
    map.iter()
        .map(|(tool, vector)| tool.chars().count() * 2 + vector.len() * 8)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> EmbeddingMap {
        let mut map = EmbeddingMap::new();
        map.insert("tool1".to_string(), vec![0.1, 0.2, 0.3]);
        map.insert("t2".to_string(), vec![0.5]);
        map
    }

    #[test]
    fn test_memory_usage() {
        assert_eq!(calculate_memory_usage(&sample_map()), 46);
        assert_eq!(calculate_memory_usage(&EmbeddingMap::new()), 0);
    }

    #[test]
    fn test_server_hash_deterministic() {
        let mut env = HashMap::new();
        env.insert("B".to_string(), "2".to_string());
        env.insert("A".to_string(), "1".to_string());
        let args = vec!["--flag".to_string()];

        let h1 = generate_server_hash("files", "npx", &args, &env);
        let h2 = generate_server_hash("files", "npx", &args, &env);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_server_hash_sensitive_to_inputs() {
        let env = HashMap::new();
        let base = generate_server_hash("files", "npx", &[], &env);
        assert_ne!(base, generate_server_hash("other", "npx", &[], &env));
        assert_ne!(base, generate_server_hash("files", "node", &[], &env));
        assert_ne!(
            base,
            generate_server_hash("files", "npx", &["-y".to_string()], &env)
        );
    }

    #[tokio::test]
    async fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        let map = sample_map();

        cache.save_embeddings_to_cache("abc123", &map).await.unwrap();
        let loaded = cache.get_cached_embeddings("abc123").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["t2"], vec![0.5]);
        assert_eq!(loaded["tool1"].len(), 3);
    }

    #[tokio::test]
    async fn test_saved_file_is_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        cache
            .save_embeddings_to_cache("deadbeef", &sample_map())
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join("deadbeef.json"))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_object());
    }

    #[tokio::test]
    async fn test_cache_miss_on_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        assert!(cache.get_cached_embeddings("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("bad.json"), "{not json")
            .await
            .unwrap();
        let cache = EmbeddingCache::new(dir.path());
        assert!(cache.get_cached_embeddings("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_orphan_json() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("active.json"), "{}").await.unwrap();
        tokio::fs::write(dir.path().join("unused.json"), "{}").await.unwrap();
        tokio::fs::write(dir.path().join("other.txt"), "keep").await.unwrap();

        let cache = EmbeddingCache::new(dir.path());
        let active: HashSet<String> = ["active".to_string()].into_iter().collect();
        cache.cleanup_unused_cache(&active).await;

        assert!(dir.path().join("active.json").exists());
        assert!(!dir.path().join("unused.json").exists());
        assert!(dir.path().join("other.txt").exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_directory_is_noop() {
        let cache = EmbeddingCache::new("/nonexistent/toolgate-cache-test");
        cache.cleanup_unused_cache(&HashSet::new()).await;
    }
}
