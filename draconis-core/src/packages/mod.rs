//! Package-count service (§4.4): counts installed packages across
//! whichever package managers are present on the host, behind a bitflag
//! mask so callers can opt specific managers in or out.

use draconis_common::error::{Error, ErrorKind, Result};

use crate::cache::CacheManager;

/// Bitflag over the fixed set of package managers this service knows how
/// to count. Availability of a given bit on the running platform is the
/// caller's responsibility (§4.4 "the available members depending on
/// platform").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manager(u32);

impl Manager {
    pub const NONE: Manager = Manager(0);
    pub const APK: Manager = Manager(1 << 0);
    pub const DPKG: Manager = Manager(1 << 1);
    pub const MOSS: Manager = Manager(1 << 2);
    pub const PACMAN: Manager = Manager(1 << 3);
    pub const RPM: Manager = Manager(1 << 4);
    pub const XBPS: Manager = Manager(1 << 5);
    pub const HOMEBREW: Manager = Manager(1 << 6);
    pub const MACPORTS: Manager = Manager(1 << 7);
    pub const WINGET: Manager = Manager(1 << 8);
    pub const CHOCOLATEY: Manager = Manager(1 << 9);
    pub const SCOOP: Manager = Manager(1 << 10);
    pub const PKGNG: Manager = Manager(1 << 11);
    pub const PKGSRC: Manager = Manager(1 << 12);
    pub const HAIKUPKG: Manager = Manager(1 << 13);
    pub const NIX: Manager = Manager(1 << 14);
    pub const CARGO: Manager = Manager(1 << 15);

    pub const ALL: Manager = Manager(0xFFFF);

    pub fn contains(self, other: Manager) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Manager {
        Manager(bits)
    }
}

impl std::ops::BitOr for Manager {
    type Output = Manager;
    fn bitor(self, rhs: Manager) -> Manager {
        Manager(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Manager {
    fn bitor_assign(&mut self, rhs: Manager) {
        self.0 |= rhs.0;
    }
}

/// Default mask for the platform this crate is built for.
#[cfg(target_os = "linux")]
pub fn platform_default_mask() -> Manager {
    Manager::APK | Manager::DPKG | Manager::MOSS | Manager::PACMAN | Manager::RPM | Manager::XBPS | Manager::NIX | Manager::CARGO
}

#[cfg(target_os = "macos")]
pub fn platform_default_mask() -> Manager {
    Manager::HOMEBREW | Manager::MACPORTS | Manager::NIX | Manager::CARGO
}

#[cfg(windows)]
pub fn platform_default_mask() -> Manager {
    Manager::WINGET | Manager::CHOCOLATEY | Manager::SCOOP | Manager::CARGO
}

#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
pub fn platform_default_mask() -> Manager {
    Manager::PKGNG | Manager::NIX | Manager::CARGO
}

#[cfg(target_os = "netbsd")]
pub fn platform_default_mask() -> Manager {
    Manager::PKGSRC | Manager::NIX | Manager::CARGO
}

#[cfg(target_os = "haiku")]
pub fn platform_default_mask() -> Manager {
    Manager::HAIKUPKG
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    windows,
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "haiku"
)))]
pub fn platform_default_mask() -> Manager {
    Manager::CARGO
}

struct ManagerEntry {
    manager: Manager,
    id: &'static str,
    count: fn(&CacheManager) -> Result<u64>,
}

fn registry() -> Vec<ManagerEntry> {
    vec![
        ManagerEntry { manager: Manager::APK, id: "apk", count: count_apk },
        ManagerEntry { manager: Manager::DPKG, id: "dpkg", count: count_dpkg },
        ManagerEntry { manager: Manager::MOSS, id: "moss", count: count_moss },
        ManagerEntry { manager: Manager::PACMAN, id: "pacman", count: count_pacman },
        ManagerEntry { manager: Manager::RPM, id: "rpm", count: count_rpm },
        ManagerEntry { manager: Manager::XBPS, id: "xbps", count: count_xbps },
        ManagerEntry { manager: Manager::NIX, id: "nix", count: count_nix },
        ManagerEntry { manager: Manager::CARGO, id: "cargo", count: count_cargo },
        ManagerEntry { manager: Manager::HOMEBREW, id: "homebrew", count: count_homebrew },
        ManagerEntry { manager: Manager::MACPORTS, id: "macports", count: count_macports },
        ManagerEntry { manager: Manager::CHOCOLATEY, id: "chocolatey", count: count_chocolatey },
        ManagerEntry { manager: Manager::SCOOP, id: "scoop", count: count_scoop },
        ManagerEntry { manager: Manager::WINGET, id: "winget", count: count_winget },
        ManagerEntry { manager: Manager::PKGNG, id: "pkgng", count: count_pkgng },
        ManagerEntry { manager: Manager::PKGSRC, id: "pkgsrc", count: count_pkgsrc },
        ManagerEntry { manager: Manager::HAIKUPKG, id: "haikupkg", count: count_haikupkg },
    ]
}

/// Sum of counts across every manager selected by `enabled_mask` that
/// produced a value. Returns `UnavailableFeature` if none did (§4.4
/// "Aggregation").
pub fn get_total_count(cache: &CacheManager, enabled_mask: Manager) -> Result<u64> {
    let counts = get_individual_counts(cache, enabled_mask);
    if counts.is_empty() {
        return Err(Error::new(ErrorKind::UnavailableFeature, "no package manager produced a count"));
    }
    Ok(counts.values().sum())
}

/// Per-manager counts for every manager selected by `enabled_mask` that
/// produced a value; informational errors (NotFound/ApiUnavailable/
/// NotSupported) are swallowed at debug level, everything else is logged
/// as an error but never aborts the aggregation.
pub fn get_individual_counts(cache: &CacheManager, enabled_mask: Manager) -> std::collections::HashMap<String, u64> {
    let mut out = std::collections::HashMap::new();
    for entry in registry() {
        if !enabled_mask.contains(entry.manager) {
            continue;
        }
        match (entry.count)(cache) {
            Ok(count) => {
                out.insert(entry.id.to_string(), count);
            }
            Err(err) if err.is_informational() => {
                tracing::debug!(manager = entry.id, error = %err, "package manager unavailable");
            }
            Err(err) => {
                tracing::error!(manager = entry.id, error = %err, "package count failed");
            }
        }
    }
    out
}

/// Open a SQLite database read-only and run a `COUNT`-style query,
/// returning the single resulting integer.
pub fn get_count_from_db(_cache: &CacheManager, id: &str, db_path: &str, count_query: &str) -> Result<u64> {
    if !std::path::Path::new(db_path).exists() {
        return Err(Error::new(ErrorKind::NotFound, format!("{id}: database {db_path} not found")));
    }
    let conn = rusqlite::Connection::open_with_flags(db_path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::new(ErrorKind::IoError, e.to_string()))?;
    let count: i64 = conn
        .query_row(count_query, [], |row| row.get(0))
        .map_err(|e| Error::new(ErrorKind::ParseError, format!("{id}: {e}")))?;
    if count < 0 {
        return Err(Error::new(ErrorKind::CorruptedData, format!("{id}: negative count from {db_path}")));
    }
    Ok(count as u64)
}

/// Enumerate a directory; with `extension_filter`, count only regular
/// files whose extension matches, else count all entries. `subtract_one`
/// drops one from the final count (for directories carrying a metadata
/// sidecar entry alongside the package entries).
pub fn get_count_from_directory(
    _cache: &CacheManager,
    id: &str,
    dir: &str,
    extension_filter: Option<&str>,
    subtract_one: bool,
) -> Result<u64> {
    let entries = std::fs::read_dir(dir).map_err(|_| Error::new(ErrorKind::NotFound, format!("{id}: directory {dir} not found")))?;
    let mut count = 0u64;
    for entry in entries.flatten() {
        match extension_filter {
            Some(ext) => {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                    && entry.path().extension().and_then(|e| e.to_str()) == Some(ext)
                {
                    count += 1;
                }
            }
            None => count += 1,
        }
    }
    if subtract_one {
        count = count.saturating_sub(1);
    }
    Ok(count)
}

/// XBPS's package database is a plist `<dict>` keyed by package name; a
/// package counts iff its sub-dict has `state = "installed"`. The
/// `_XBPS_ALTERNATIVES_` key is metadata, not a package, and is skipped.
pub fn get_count_from_plist(_cache: &CacheManager, id: &str, plist_path: &str) -> Result<u64> {
    let value = plist::Value::from_file(plist_path)
        .map_err(|e| Error::new(ErrorKind::ParseError, format!("{id}: {e}")))?;
    let dict = value
        .as_dictionary()
        .ok_or_else(|| Error::new(ErrorKind::ParseError, format!("{id}: plist root is not a dictionary")))?;
    let mut count = 0u64;
    for (key, entry) in dict {
        if key == "_XBPS_ALTERNATIVES_" {
            continue;
        }
        if let Some(pkg) = entry.as_dictionary() {
            if pkg.get("state").and_then(|v| v.as_string()) == Some("installed") {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Count lines beginning with `prefix` in a flat text database — used by
/// package managers (apk) that record one package per block in a single
/// file rather than one file/directory per package.
pub fn get_count_from_line_prefix(_cache: &CacheManager, id: &str, file_path: &str, prefix: &str) -> Result<u64> {
    let contents = std::fs::read_to_string(file_path)
        .map_err(|_| Error::new(ErrorKind::NotFound, format!("{id}: database {file_path} not found")))?;
    Ok(contents.lines().filter(|line| line.starts_with(prefix)).count() as u64)
}

fn count_apk(cache: &CacheManager) -> Result<u64> {
    get_count_from_line_prefix(cache, "apk", "/lib/apk/db/installed", "P:")
}

fn count_moss(cache: &CacheManager) -> Result<u64> {
    get_count_from_directory(cache, "moss", "/var/lib/moss/db/install", None, false)
}

fn count_dpkg(cache: &CacheManager) -> Result<u64> {
    get_count_from_directory(cache, "dpkg", "/var/lib/dpkg/info", Some("list"), false)
}

fn count_pacman(cache: &CacheManager) -> Result<u64> {
    get_count_from_directory(cache, "pacman", "/var/lib/pacman/local", None, true)
}

fn count_rpm(cache: &CacheManager) -> Result<u64> {
    get_count_from_db(cache, "rpm", "/var/lib/rpm/rpmdb.sqlite", "SELECT COUNT(*) FROM Packages")
}

fn count_xbps(cache: &CacheManager) -> Result<u64> {
    get_count_from_plist(cache, "xbps", "/var/db/xbps/pkgdb-0.38.plist")
}

fn count_nix(cache: &CacheManager) -> Result<u64> {
    get_count_from_db(cache, "nix", "/nix/var/nix/db/db.sqlite", "SELECT COUNT(*) FROM ValidPaths")
}

fn count_cargo(cache: &CacheManager) -> Result<u64> {
    let dir = std::env::var("CARGO_HOME")
        .map(|home| format!("{home}/bin"))
        .unwrap_or_else(|_| {
            let home = dirs::home_dir().unwrap_or_default();
            home.join(".cargo/bin").to_string_lossy().into_owned()
        });
    get_count_from_directory(cache, "cargo", &dir, None, false)
}

fn count_homebrew(cache: &CacheManager) -> Result<u64> {
    let cellar = "/opt/homebrew/Cellar";
    let fallback = "/usr/local/Cellar";
    let dir = if std::path::Path::new(cellar).exists() { cellar } else { fallback };
    get_count_from_directory(cache, "homebrew", dir, None, false)
}

fn count_macports(cache: &CacheManager) -> Result<u64> {
    get_count_from_db(
        cache,
        "macports",
        "/opt/local/var/macports/registry/registry.db",
        "SELECT COUNT(*) FROM ports WHERE state = 'installed'",
    )
}

fn count_pkgng(cache: &CacheManager) -> Result<u64> {
    get_count_from_db(cache, "pkgng", "/var/db/pkg/local.sqlite", "SELECT COUNT(*) FROM packages")
}

fn count_pkgsrc(cache: &CacheManager) -> Result<u64> {
    get_count_from_directory(cache, "pkgsrc", "/usr/pkg/pkgdb", None, false)
}

fn count_haikupkg(cache: &CacheManager) -> Result<u64> {
    get_count_from_directory(cache, "haikupkg", "/boot/system/package-links", None, true)
}

#[cfg(windows)]
fn count_winget(cache: &CacheManager) -> Result<u64> {
    windows_registry::count_packages_subkey(cache)
}

#[cfg(not(windows))]
fn count_winget(_cache: &CacheManager) -> Result<u64> {
    Err(Error::new(ErrorKind::NotSupported, "winget counting requires Windows"))
}

#[cfg(windows)]
mod windows_registry {
    use super::*;
    use windows_sys::Win32::Foundation::ERROR_SUCCESS;
    use windows_sys::Win32::System::Registry::{RegOpenKeyExW, RegQueryInfoKeyW, HKEY_CURRENT_USER, KEY_READ};

    const PACKAGES_SUBKEY: &str =
        "Software\\Classes\\Local Settings\\Software\\Microsoft\\Windows\\CurrentVersion\\AppModel\\Repository\\Packages";

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Count subkeys under the AppModel packages registry key (§4.4 winget).
    pub(super) fn count_packages_subkey(_cache: &CacheManager) -> Result<u64> {
        let subkey_w = to_wide(PACKAGES_SUBKEY);
        unsafe {
            let mut hkey = std::ptr::null_mut();
            let rc = RegOpenKeyExW(HKEY_CURRENT_USER, subkey_w.as_ptr(), 0, KEY_READ, &mut hkey);
            if rc != ERROR_SUCCESS {
                return Err(Error::new(ErrorKind::NotFound, "AppModel packages registry key not found"));
            }
            let mut subkey_count: u32 = 0;
            let rc = RegQueryInfoKeyW(
                hkey,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut subkey_count,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            );
            windows_sys::Win32::System::Registry::RegCloseKey(hkey);
            if rc != ERROR_SUCCESS {
                return Err(Error::new(ErrorKind::InternalError, "RegQueryInfoKeyW failed"));
            }
            Ok(subkey_count as u64)
        }
    }
}

fn count_chocolatey(cache: &CacheManager) -> Result<u64> {
    let dir = std::env::var("ChocolateyInstall")
        .map(|base| format!("{base}\\lib"))
        .map_err(|_| Error::new(ErrorKind::ApiUnavailable, "ChocolateyInstall is not set"))?;
    get_count_from_directory(cache, "chocolatey", &dir, None, false)
}

fn count_scoop(cache: &CacheManager) -> Result<u64> {
    let dir = std::env::var("SCOOP")
        .map(|base| format!("{base}\\apps"))
        .unwrap_or_else(|_| {
            let home = dirs::home_dir().unwrap_or_default();
            home.join("scoop/apps").to_string_lossy().into_owned()
        });
    get_count_from_directory(cache, "scoop", &dir, None, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_bitor_combines_flags() {
        let mask = Manager::DPKG | Manager::RPM;
        assert!(mask.contains(Manager::DPKG));
        assert!(mask.contains(Manager::RPM));
        assert!(!mask.contains(Manager::PACMAN));
    }

    #[test]
    fn get_count_from_directory_counts_filtered_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.list"), "").unwrap();
        std::fs::write(dir.path().join("b.list"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();
        let cache = CacheManager::with_dirs(dir.path().join("p"), dir.path().join("t")).unwrap();
        let count = get_count_from_directory(&cache, "test", dir.path().to_str().unwrap(), Some("list"), false).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn get_count_from_directory_subtracts_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pkg-a"), "").unwrap();
        std::fs::write(dir.path().join("ALPM_DB_VERSION"), "").unwrap();
        let cache = CacheManager::with_dirs(dir.path().join("p"), dir.path().join("t")).unwrap();
        let count = get_count_from_directory(&cache, "test", dir.path().to_str().unwrap(), None, true).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn get_count_from_directory_missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dirs(dir.path().join("p"), dir.path().join("t")).unwrap();
        let err = get_count_from_directory(&cache, "test", "/no/such/dir", None, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn get_count_from_line_prefix_counts_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("installed");
        std::fs::write(&db, "P:alpine-baselayout\nV:3.4.3\n\nP:busybox\nV:1.36\n\nC:not-a-package\n").unwrap();
        let cache = CacheManager::with_dirs(dir.path().join("p"), dir.path().join("t")).unwrap();
        let count = get_count_from_line_prefix(&cache, "apk", db.to_str().unwrap(), "P:").unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn get_count_from_db_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dirs(dir.path().join("p"), dir.path().join("t")).unwrap();
        let err = get_count_from_db(&cache, "test", "/no/such.sqlite", "SELECT COUNT(*) FROM x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
