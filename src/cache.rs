//! Persistent calculation cache. One JSON file per cache key
//! under a configured directory; no embedded key-value store is pulled
//! in since a flat file per key is all this needs.
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::WaterBalanceError;

pub struct PersistentCache {
    dir: PathBuf,
}

impl PersistentCache {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding corrupt cache entry");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> std::io::Result<()> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(value)?;
        fs::write(path, bytes)
    }

    pub fn invalidate(&self, key: &str) -> std::io::Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Removes every entry whose key starts with `prefix` — used to drop
    /// all cached periods for one facility under a given workbook
    /// signature when the facility's capacity/surface_area changes.
    pub fn invalidate_prefix(&self, prefix: &str) -> std::io::Result<()> {
        purge_prefix(&self.dir, &sanitize_key(prefix))
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Removes every cache entry whose key begins with `signature`, called
/// when the repository detects the source workbook has changed.
pub fn purge_for_workbook(dir: &Path, signature: &str) -> Result<(), WaterBalanceError> {
    purge_prefix(dir, &sanitize_key(signature)).map_err(WaterBalanceError::from)
}

fn purge_prefix(dir: &Path, prefix: &str) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut removed = 0u32;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    debug!(prefix, removed, "purged matching cache entries");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: i32,
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wbe-cache-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = temp_dir("roundtrip");
        let cache = PersistentCache::new(&dir).unwrap();
        cache.put("sig1__2026-03", &Sample { value: 42 }).unwrap();
        let got: Sample = cache.get("sig1__2026-03").unwrap();
        assert_eq!(got, Sample { value: 42 });
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_key_returns_none() {
        let dir = temp_dir("missing");
        let cache = PersistentCache::new(&dir).unwrap();
        assert!(cache.get::<Sample>("nope").is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn purge_removes_only_matching_prefix() {
        let dir = temp_dir("purge");
        let cache = PersistentCache::new(&dir).unwrap();
        cache.put("sigA__2026-01", &Sample { value: 1 }).unwrap();
        cache.put("sigB__2026-01", &Sample { value: 2 }).unwrap();
        purge_for_workbook(&dir, "sigA").unwrap();
        assert!(cache.get::<Sample>("sigA__2026-01").is_none());
        assert!(cache.get::<Sample>("sigB__2026-01").is_some());
        fs::remove_dir_all(&dir).ok();
    }
}
