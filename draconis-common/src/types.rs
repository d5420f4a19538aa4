//! Data model shared by the cache, probe, package and plugin subsystems
//! (§3).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of the running operating system.
///
/// `id` is the lowercase distro identifier on Linux/BSD, or one of
/// `"windows"`, `"macos"`, `"haiku"`, `"serenity"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OSInfo {
    pub name: String,
    pub version: String,
    pub id: String,
}

/// Used-vs-total byte counters, shared by memory and disk-space probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Physical and logical CPU core counts. `physical` must never exceed
/// `logical`; neither field may be zero — constructing an invalid pair is a
/// caller bug, not a recoverable runtime condition, so [`CPUCores::new`]
/// panics rather than returning a `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CPUCores {
    pub physical: usize,
    pub logical: usize,
}

impl CPUCores {
    pub fn new(physical: usize, logical: usize) -> Self {
        assert!(physical > 0 && logical > 0, "core counts must be non-zero");
        assert!(physical <= logical, "physical cores must not exceed logical cores");
        CPUCores { physical, logical }
    }
}

/// A single storage volume. `is_system_drive` is true for exactly one disk
/// per host (the root/boot volume) — enforced by the probe layer, not this
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub filesystem: String,
    pub drive_type: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub is_system_drive: bool,
}

/// Pixel dimensions of a display output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A single display output. At most one entry across a probe's result set
/// may have `is_primary = true`; if the platform reports no primary output,
/// the probe promotes the first-enumerated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: u64,
    pub resolution: Resolution,
    pub refresh_rate: f64,
    pub is_primary: bool,
}

/// A single network interface. Address fields are absent when the
/// interface has no address of that family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub mac_address: Option<String>,
    pub is_up: bool,
    pub is_loopback: bool,
}

/// Charge state reported by a battery probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    Unknown,
    Charging,
    Discharging,
    Full,
    NotPresent,
}

/// Battery state. `status` is `Full` iff the platform reports charging and
/// `percentage == Some(100)`; building that invariant is the probe's
/// responsibility, this type just carries the fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub status: BatteryStatus,
    pub percentage: Option<u8>,
    pub time_remaining: Option<u64>,
}

/// A cached value plus its expiry, as stored by [`draconis_core::cache`] —
/// absent `expires` means the entry never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub expires: Option<u64>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, expires: Option<u64>) -> Self {
        CacheEntry { data, expires }
    }

    /// `now < expires` means valid; `now >= expires` or `None` ttl-less
    /// entries are always valid.
    pub fn is_valid_at(&self, now: u64) -> bool {
        match self.expires {
            Some(expires) => now < expires,
            None => true,
        }
    }
}

/// Where a cache entry is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLocation {
    InMemory,
    TempDirectory,
    Persistent,
}

/// A cache policy: where an entry lives and how long it survives.
/// The default is `Persistent` with a one-day TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub location: CacheLocation,
    pub ttl: Option<u64>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            location: CacheLocation::Persistent,
            ttl: Some(24 * 60 * 60),
        }
    }
}

/// Plugin capability kind — what contract a plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    InfoProvider,
    OutputFormat,
}

/// Capabilities a plugin declares it needs, used by the plugin manager to
/// decide whether to grant a plugin a context it depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependencies {
    pub requires_network: bool,
    pub requires_filesystem: bool,
    pub requires_admin: bool,
    pub requires_caching: bool,
}

/// Static identity of a plugin, read from its manifest or its static
/// registration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub dependencies: PluginDependencies,
}

/// Filesystem paths handed to a plugin once per process, derived from the
/// host's standard config/cache/data directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginContext {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

/// Bookkeeping for a loaded plugin, dynamic or static. Static plugins carry
/// no library handle (`has_library_handle = false`) since they were linked
/// in at build time rather than `dlopen`ed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedPlugin {
    pub path: Option<PathBuf>,
    pub metadata: PluginMetadata,
    pub has_library_handle: bool,
    pub is_initialized: bool,
    pub is_ready: bool,
    pub is_loaded: bool,
}

/// Serialisable view of a [`crate::error::Error`] for contexts (plugin
/// manager summaries, FFI diagnostics) that need error detail as data
/// rather than as a `Result` short-circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub kind: crate::error::ErrorKind,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl From<&crate::error::Error> for StructuredError {
    fn from(err: &crate::error::Error) -> Self {
        StructuredError {
            kind: err.kind(),
            message: err.message.clone(),
            context: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_expiry_boundary() {
        let entry = CacheEntry::new(42u32, Some(100));
        assert!(entry.is_valid_at(99));
        assert!(!entry.is_valid_at(100));
        assert!(!entry.is_valid_at(101));
    }

    #[test]
    fn cache_entry_without_expiry_never_invalid() {
        let entry = CacheEntry::new("x".to_string(), None);
        assert!(entry.is_valid_at(0));
        assert!(entry.is_valid_at(u64::MAX));
    }

    #[test]
    fn default_cache_policy_is_persistent_one_day() {
        let policy = CachePolicy::default();
        assert_eq!(policy.location, CacheLocation::Persistent);
        assert_eq!(policy.ttl, Some(86_400));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn cpu_cores_rejects_zero() {
        CPUCores::new(0, 4);
    }

    #[test]
    #[should_panic(expected = "must not exceed")]
    fn cpu_cores_rejects_physical_over_logical() {
        CPUCores::new(8, 4);
    }

    #[test]
    fn cpu_cores_accepts_valid_pair() {
        let cores = CPUCores::new(4, 8);
        assert_eq!(cores.physical, 4);
        assert_eq!(cores.logical, 8);
    }
}
