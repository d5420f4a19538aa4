//! Probe dispatch (§4.3): one function per measurement, routed to a
//! platform-specific implementation chosen at compile time by `target_os`.
//!
//! Every probe but `uptime` takes a [`CacheManager`] and is expected to key
//! its cache entry `<platform>_<probe>`, e.g. `linux_cpu_model`. The
//! dispatch layer itself does not cache — each platform implementation
//! owns its own `get_or_set` calls, since TTL class varies probe to probe
//! (§3 "Lifecycle rules").

use draconis_common::error::Result;
use draconis_common::types::{
    Battery, CPUCores, DiskInfo, DisplayInfo, NetworkInterface, OSInfo, ResourceUsage,
};

use crate::cache::CacheManager;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as platform;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as platform;

#[cfg(any(target_os = "freebsd", target_os = "dragonfly", target_os = "netbsd"))]
mod bsd;
#[cfg(any(target_os = "freebsd", target_os = "dragonfly", target_os = "netbsd"))]
use bsd as platform;

#[cfg(target_os = "haiku")]
mod haiku;
#[cfg(target_os = "haiku")]
use haiku as platform;

#[cfg(target_os = "serenity")]
mod serenity;
#[cfg(target_os = "serenity")]
use serenity as platform;

/// Common helpers every platform module shares: env-var lookups, shell
/// name tables, and the desktop/window-manager detection shared by the
/// Linux/BSD Wayland-or-X11 path.
mod common;

/// Stable identifier for the active target platform, used to build cache
/// keys (`<platform>_<probe>`) and as `OSInfo::id` when the platform
/// doesn't have its own distro identifier (Windows/macOS/Haiku/Serenity).
pub fn platform_id() -> &'static str {
    platform::PLATFORM_ID
}

pub fn mem_info(cache: &CacheManager) -> Result<ResourceUsage> {
    platform::mem_info(cache)
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    platform::operating_system(cache)
}

pub fn desktop_environment(cache: &CacheManager) -> Result<String> {
    platform::desktop_environment(cache)
}

pub fn window_manager(cache: &CacheManager) -> Result<String> {
    platform::window_manager(cache)
}

pub fn shell(cache: &CacheManager) -> Result<String> {
    platform::shell(cache)
}

pub fn host(cache: &CacheManager) -> Result<String> {
    platform::host(cache)
}

pub fn cpu_model(cache: &CacheManager) -> Result<String> {
    platform::cpu_model(cache)
}

pub fn cpu_cores(cache: &CacheManager) -> Result<CPUCores> {
    platform::cpu_cores(cache)
}

pub fn gpu_model(cache: &CacheManager) -> Result<String> {
    platform::gpu_model(cache)
}

pub fn kernel_version(cache: &CacheManager) -> Result<String> {
    platform::kernel_version(cache)
}

pub fn disk_usage() -> Result<ResourceUsage> {
    platform::disk_usage()
}

pub fn disks(cache: &CacheManager) -> Result<Vec<DiskInfo>> {
    platform::disks(cache)
}

pub fn system_disk(cache: &CacheManager) -> Result<DiskInfo> {
    let all = disks(cache)?;
    all.into_iter()
        .find(|d| d.is_system_drive)
        .ok_or_else(|| {
            draconis_common::error::Error::new(
                draconis_common::error::ErrorKind::NotFound,
                "no disk reported as the system drive",
            )
        })
}

pub fn outputs(cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    let mut list = platform::outputs(cache)?;
    if !list.is_empty() && !list.iter().any(|d| d.is_primary) {
        list[0].is_primary = true;
    }
    Ok(list)
}

pub fn primary_output(cache: &CacheManager) -> Result<DisplayInfo> {
    let all = outputs(cache)?;
    all.into_iter().find(|d| d.is_primary).ok_or_else(|| {
        draconis_common::error::Error::new(
            draconis_common::error::ErrorKind::NotFound,
            "no display outputs detected",
        )
    })
}

pub fn network_interfaces(cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    platform::network_interfaces(cache)
}

pub fn primary_network_interface(cache: &CacheManager) -> Result<NetworkInterface> {
    platform::primary_network_interface(cache)
}

pub fn battery_info() -> Result<Battery> {
    platform::battery_info()
}

pub fn uptime() -> Result<u64> {
    platform::uptime()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_promotes_first_when_no_primary_reported() {
        use draconis_common::types::Resolution;
        let raw = vec![
            DisplayInfo {
                id: 1,
                resolution: Resolution { width: 1920, height: 1080 },
                refresh_rate: 60.0,
                is_primary: false,
            },
            DisplayInfo {
                id: 2,
                resolution: Resolution { width: 2560, height: 1440 },
                refresh_rate: 144.0,
                is_primary: false,
            },
        ];
        let mut promoted = raw;
        if !promoted.is_empty() && !promoted.iter().any(|d| d.is_primary) {
            promoted[0].is_primary = true;
        }
        assert!(promoted[0].is_primary);
        assert!(!promoted[1].is_primary);
    }
}
