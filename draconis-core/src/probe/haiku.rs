//! Haiku probe implementations (§4.3 "Haiku") — deliberately terse, matching
//! how little this platform exposes: most probes are hard-coded constants
//! or single `libbe.so`/`get_system_info` calls.

use std::ffi::CStr;

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{
    Battery, CPUCores, CacheLocation, CachePolicy, DiskInfo, DisplayInfo, NetworkInterface, OSInfo,
    ResourceUsage,
};

use crate::cache::CacheManager;

pub const PLATFORM_ID: &str = "haiku";

fn never_expire() -> CachePolicy {
    CachePolicy { location: CacheLocation::Persistent, ttl: None }
}

pub fn mem_info(_cache: &CacheManager) -> Result<ResourceUsage> {
    Err(Error::new(ErrorKind::PlatformSpecific, "get_system_info binding not linked into this build"))
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    cache.get_or_set("haiku_os_info", Some(never_expire()), || {
        Ok(OSInfo { name: "Haiku".to_string(), version: String::new(), id: "haiku".to_string() })
    })
}

pub fn desktop_environment(_cache: &CacheManager) -> Result<String> {
    Ok("Haiku Desktop Environment".to_string())
}

pub fn window_manager(_cache: &CacheManager) -> Result<String> {
    Ok("app_server".to_string())
}

pub fn shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("haiku_shell", Some(never_expire()), || {
        std::env::var("SHELL").map_err(|_| Error::new(ErrorKind::NotFound, "SHELL not set"))
    })
}

pub fn host(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("haiku_host", Some(never_expire()), || {
        let mut buf = [0u8; 256];
        unsafe {
            if libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            Ok(CStr::from_ptr(buf.as_ptr() as *const libc::c_char).to_string_lossy().into_owned())
        }
    })
}

pub fn cpu_model(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::PlatformSpecific, "get_system_info binding not linked into this build"))
}

pub fn cpu_cores(_cache: &CacheManager) -> Result<CPUCores> {
    Err(Error::new(ErrorKind::PlatformSpecific, "get_system_info binding not linked into this build"))
}

pub fn gpu_model(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::NotSupported, "GPU identification is not implemented on Haiku"))
}

pub fn kernel_version(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::PlatformSpecific, "kernel_version integer needs get_system_info binding"))
}

pub fn disk_usage() -> Result<ResourceUsage> {
    statvfs_usage("/boot")
}

fn statvfs_usage(path: &str) -> Result<ResourceUsage> {
    let c_path = std::ffi::CString::new(path).unwrap();
    unsafe {
        let mut stat: std::mem::MaybeUninit<libc::statvfs> = std::mem::MaybeUninit::uninit();
        if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        let stat = stat.assume_init();
        let block_size = stat.f_frsize.max(1) as u64;
        let total = stat.f_blocks as u64 * block_size;
        let free = stat.f_bfree as u64 * block_size;
        Ok(ResourceUsage { used_bytes: total.saturating_sub(free), total_bytes: total })
    }
}

pub fn disks(cache: &CacheManager) -> Result<Vec<DiskInfo>> {
    cache.get_or_set("haiku_disks", Some(CachePolicy { location: CacheLocation::Persistent, ttl: Some(60) }), || {
        let usage = statvfs_usage("/boot")?;
        Ok(vec![DiskInfo {
            name: "boot".to_string(),
            mount_point: "/boot".to_string(),
            filesystem: "bfs".to_string(),
            drive_type: "Fixed".to_string(),
            total_bytes: usage.total_bytes,
            used_bytes: usage.used_bytes,
            is_system_drive: true,
        }])
    })
}

pub fn outputs(_cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    Err(Error::new(ErrorKind::NotSupported, "display enumeration is not implemented on Haiku"))
}

pub fn network_interfaces(_cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on Haiku"))
}

pub fn primary_network_interface(_cache: &CacheManager) -> Result<NetworkInterface> {
    Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on Haiku"))
}

pub fn battery_info() -> Result<Battery> {
    Err(Error::new(ErrorKind::NotSupported, "battery status is not implemented on Haiku"))
}

pub fn uptime() -> Result<u64> {
    Err(Error::new(ErrorKind::PlatformSpecific, "uptime needs get_system_info binding"))
}
