//! Per-plugin scoped cache (§4.6).
//!
//! Behaves like [`crate::cache::CacheManager`] but intentionally simpler:
//! a single on-disk location (the directory the plugin manager handed the
//! plugin), no policy enum, and a plain `ttl_seconds` where `0` means
//! never expires. Plugins must not reach into the core cache manager —
//! this is the only cache surface they see.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use draconis_common::error::Result;
use draconis_common::types::CacheEntry;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct PluginCache {
    dir: PathBuf,
    memory: Mutex<HashMap<String, Vec<u8>>>,
}

impl PluginCache {
    /// `dir` is created if absent — it's the directory the plugin manager
    /// derived for this plugin, `<cache home>/draconis++/plugins/<name>`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(PluginCache {
            dir,
            memory: Mutex::new(HashMap::new()),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = now_unix();
        let mut memory = self.memory.lock().expect("plugin cache mutex poisoned");

        if let Some(bytes) = memory.get(key) {
            if let Ok(entry) = bincode::deserialize::<CacheEntry<T>>(bytes) {
                if entry.is_valid_at(now) {
                    return Some(entry.data);
                }
            }
            return None;
        }

        let bytes = fs::read(self.dir.join(key)).ok()?;
        let entry: CacheEntry<T> = bincode::deserialize(&bytes).ok()?;
        if !entry.is_valid_at(now) {
            return None;
        }
        memory.insert(key.to_string(), bytes);
        Some(entry.data)
    }

    /// `ttl_seconds == 0` means the entry never expires.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<()> {
        let expires = if ttl_seconds == 0 { None } else { Some(now_unix() + ttl_seconds) };
        let entry = CacheEntry::new(value, expires);
        let encoded = bincode::serialize(&entry)
            .map_err(|e| draconis_common::error::Error::new(draconis_common::error::ErrorKind::InternalError, e.to_string()))?;

        let mut memory = self.memory.lock().expect("plugin cache mutex poisoned");
        memory.insert(key.to_string(), encoded.clone());
        let _ = fs::write(self.dir.join(key), encoded);
        Ok(())
    }

    pub fn invalidate(&self, key: &str) -> Result<()> {
        let mut memory = self.memory.lock().expect("plugin cache mutex poisoned");
        memory.remove(key);
        let _ = fs::remove_file(self.dir.join(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();
        cache.set("temp_c", &21i32, 0).unwrap();
        let value: Option<i32> = cache.get("temp_c");
        assert_eq!(value, Some(21));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();
        cache.set("k", &1u32, 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(cache.get::<u32>("k"), Some(1));
    }

    #[test]
    fn invalidate_removes_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();
        cache.set("k", &1u32, 0).unwrap();
        cache.invalidate("k").unwrap();
        assert_eq!(cache.get::<u32>("k"), None);
        assert!(!dir.path().join("k").exists());
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PluginCache::new(dir.path()).unwrap();
        cache.set("k", &1u32, 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(cache.get::<u32>("k"), None);
    }
}
