//! Two-tier (memory + disk), TTL-bounded cache manager (§4.2).
//!
//! `CacheManager::get_or_set` is the single entry point every probe in
//! [`crate::probe`] is built on: check memory, fall back to disk, fall back
//! to the caller's fetcher, and write back through both tiers on success.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{CacheEntry, CacheLocation, CachePolicy};

/// Directory/file namespace used under the OS cache home and the system
/// temp directory — `<cache home>/draconis++`, `<temp>/draconis++`.
pub const CACHE_NAMESPACE: &str = "draconis++";

static IGNORE_CACHE: AtomicBool = AtomicBool::new(false);

/// Process-wide cache bypass (§5 "Shared resources"). When set, every
/// [`CacheManager::get_or_set`] call (on every instance) short-circuits to
/// the fetcher and performs no disk I/O.
pub fn set_global_bypass(ignore: bool) {
    IGNORE_CACHE.store(ignore, Ordering::SeqCst);
}

pub fn global_bypass() -> bool {
    IGNORE_CACHE.load(Ordering::SeqCst)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validate that a cache key is an opaque, single-component name — never a
/// path, never `.`/`..`.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key == "." || key == ".." {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("cache key {key:?} is not an opaque single-component name"),
        ));
    }
    Ok(())
}

struct CacheInner {
    memory: HashMap<String, Vec<u8>>,
    default_policy: CachePolicy,
}

/// Two-tier cache: an in-process memory map backed by per-location on-disk
/// directories. One mutex guards both tiers, matching the reference
/// implementation's single-lock design (§4.2 "Concurrency").
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    persistent_dir: PathBuf,
    temp_dir: PathBuf,
}

impl CacheManager {
    /// Create a manager rooted at the platform's standard per-user cache
    /// directory and the system temp directory (§4.2 "Invariants").
    pub fn new() -> Result<Self> {
        let persistent_dir = persistent_cache_dir()?;
        let temp_dir = std::env::temp_dir().join(CACHE_NAMESPACE);
        fs::create_dir_all(&persistent_dir)?;
        fs::create_dir_all(&temp_dir)?;
        Ok(CacheManager {
            inner: Mutex::new(CacheInner {
                memory: HashMap::new(),
                default_policy: CachePolicy::default(),
            }),
            persistent_dir,
            temp_dir,
        })
    }

    /// Create a manager rooted at caller-supplied directories, bypassing
    /// platform resolution entirely — used by tests and by callers that
    /// want an isolated cache root.
    pub fn with_dirs(persistent_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let persistent_dir = persistent_dir.into();
        let temp_dir = temp_dir.into();
        fs::create_dir_all(&persistent_dir)?;
        fs::create_dir_all(&temp_dir)?;
        Ok(CacheManager {
            inner: Mutex::new(CacheInner {
                memory: HashMap::new(),
                default_policy: CachePolicy::default(),
            }),
            persistent_dir,
            temp_dir,
        })
    }

    fn dir_for(&self, location: CacheLocation) -> Option<&Path> {
        match location {
            CacheLocation::InMemory => None,
            CacheLocation::TempDirectory => Some(&self.temp_dir),
            CacheLocation::Persistent => Some(&self.persistent_dir),
        }
    }

    /// Replace the default policy used when `get_or_set` receives no
    /// override. Affects only calls made after this returns.
    pub fn set_global_policy(&self, policy: CachePolicy) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.default_policy = policy;
    }

    /// Fetch `key` from the cache, falling back to `fetcher` on a miss and
    /// writing the result back through memory and (unless the policy is
    /// `InMemory`) disk.
    pub fn get_or_set<T, F>(&self, key: &str, policy: Option<CachePolicy>, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if global_bypass() {
            return fetcher();
        }
        validate_key(key)?;

        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let effective_policy = policy.unwrap_or(inner.default_policy);
        let now = now_unix();

        if let Some(bytes) = inner.memory.get(key) {
            if let Some(entry) = decode_entry::<T>(bytes) {
                if entry.is_valid_at(now) {
                    return Ok(entry.data);
                }
            }
        }

        if let Some(dir) = self.dir_for(effective_policy.location) {
            let path = dir.join(key);
            if let Ok(bytes) = fs::read(&path) {
                if let Some(entry) = decode_entry::<T>(&bytes) {
                    if entry.is_valid_at(now) {
                        inner.memory.insert(key.to_string(), bytes);
                        return Ok(entry.data);
                    }
                }
            }
        }

        let data = fetcher()?;

        let expires = effective_policy.ttl.map(|ttl| now + ttl);
        let entry = CacheEntry::new(&data, expires);
        if let Ok(encoded) = bincode::serialize(&entry) {
            inner.memory.insert(key.to_string(), encoded.clone());
            if let Some(dir) = self.dir_for(effective_policy.location) {
                let _ = fs::write(dir.join(key), encoded);
            }
        }

        Ok(data)
    }

    /// Remove `key` from memory and from both on-disk locations. No error
    /// if the key was never present.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.memory.remove(key);
        let _ = fs::remove_file(self.temp_dir.join(key));
        let _ = fs::remove_file(self.persistent_dir.join(key));
        Ok(())
    }

    /// Clear memory and remove every regular file under the persistent
    /// cache directory plus any extension-less or previously-known file
    /// under the temp directory. Returns the number of files removed.
    pub fn invalidate_all(&self, log_removals: bool) -> Result<usize> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let known_keys: HashSet<String> = inner.memory.keys().cloned().collect();
        inner.memory.clear();
        drop(inner);

        let mut removed = 0usize;

        if let Ok(entries) = fs::read_dir(&self.persistent_dir) {
            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    if fs::remove_file(entry.path()).is_ok() {
                        removed += 1;
                        if log_removals {
                            tracing::debug!(path = %entry.path().display(), "removed persistent cache file");
                        }
                    }
                }
            }
        }

        if let Ok(entries) = fs::read_dir(&self.temp_dir) {
            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let extension_less = path.extension().is_none();
                if extension_less || known_keys.contains(&name) {
                    if fs::remove_file(&path).is_ok() {
                        removed += 1;
                        if log_removals {
                            tracing::debug!(path = %path.display(), "removed temp-directory cache file");
                        }
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn decode_entry<T: DeserializeOwned>(bytes: &[u8]) -> Option<CacheEntry<T>> {
    bincode::deserialize(bytes).ok()
}

/// Resolve the per-user persistent cache directory (§4.2 "Invariants"):
/// `$XDG_CACHE_HOME/draconis++` or `~/.cache/draconis++` on Linux,
/// `~/Library/Caches/draconis++` on macOS, `%LOCALAPPDATA%\draconis++\cache`
/// on Windows.
pub fn persistent_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().ok_or_else(|| {
        Error::new(ErrorKind::ApiUnavailable, "could not resolve platform cache directory")
    })?;
    #[cfg(windows)]
    {
        Ok(base.join(CACHE_NAMESPACE).join("cache"))
    }
    #[cfg(not(windows))]
    {
        Ok(base.join(CACHE_NAMESPACE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager() -> (CacheManager, TempDir, TempDir) {
        let persistent = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let mgr = CacheManager::with_dirs(persistent.path(), temp.path()).unwrap();
        (mgr, persistent, temp)
    }

    #[test]
    fn repeated_get_or_set_invokes_fetcher_once_with_never_expire() {
        let (mgr, _p, _t) = manager();
        let calls = AtomicUsize::new(0);
        let policy = CachePolicy {
            location: CacheLocation::Persistent,
            ttl: None,
        };
        for _ in 0..5 {
            let value: u32 = mgr
                .get_or_set("count", Some(policy), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let (mgr, _p, _t) = manager();
        let policy = CachePolicy {
            location: CacheLocation::Persistent,
            ttl: None,
        };
        let _: u32 = mgr.get_or_set("k", Some(policy), || Ok(1u32)).unwrap();
        mgr.invalidate("k").unwrap();
        let calls = AtomicUsize::new(0);
        let value: u32 = mgr
            .get_or_set("k", Some(policy), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2u32)
            })
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bypass_skips_disk_and_always_refetches() {
        let (mgr, _p, temp) = manager();
        set_global_bypass(true);
        let policy = CachePolicy {
            location: CacheLocation::TempDirectory,
            ttl: None,
        };
        let calls = RefCell::new(0);
        for _ in 0..2 {
            let _: u32 = mgr
                .get_or_set("bypassed", Some(policy), || {
                    *calls.borrow_mut() += 1;
                    Ok(9u32)
                })
                .unwrap();
        }
        set_global_bypass(false);
        assert_eq!(*calls.borrow(), 2);
        assert!(!temp.path().join("bypassed").exists());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let (mgr, _p, _t) = manager();
        let policy = CachePolicy {
            location: CacheLocation::Persistent,
            ttl: Some(1),
        };
        let first: u32 = mgr.get_or_set("ttl-key", Some(policy), || Ok(1u32)).unwrap();
        assert_eq!(first, 1);
        thread::sleep(Duration::from_millis(1100));
        let second: u32 = mgr.get_or_set("ttl-key", Some(policy), || Ok(2u32)).unwrap();
        assert_eq!(second, 2);
    }

    #[test]
    fn invalidate_all_removes_known_and_extensionless_temp_files() {
        let (mgr, persistent, temp) = manager();
        let policy_persist = CachePolicy {
            location: CacheLocation::Persistent,
            ttl: None,
        };
        let policy_temp = CachePolicy {
            location: CacheLocation::TempDirectory,
            ttl: None,
        };
        let _: u32 = mgr.get_or_set("p1", Some(policy_persist), || Ok(1u32)).unwrap();
        let _: u32 = mgr.get_or_set("t1", Some(policy_temp), || Ok(2u32)).unwrap();
        fs::write(temp.path().join("stray.txt"), b"x").unwrap();

        let removed = mgr.invalidate_all(false).unwrap();
        assert_eq!(removed, 2);
        assert!(!persistent.path().join("p1").exists());
        assert!(!temp.path().join("t1").exists());
        assert!(temp.path().join("stray.txt").exists());

        let calls = AtomicUsize::new(0);
        let _: u32 = mgr
            .get_or_set("p1", Some(policy_persist), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(3u32)
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_non_opaque_keys() {
        let (mgr, _p, _t) = manager();
        let err = mgr.get_or_set::<u32, _>("a/b", None, || Ok(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
