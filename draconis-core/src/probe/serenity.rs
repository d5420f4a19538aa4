//! SerenityOS probe implementations (§4.3 "SerenityOS") — as terse as the
//! spec's own allocation: most values are either hard-coded or a single
//! `/sys/kernel/memstat` JSON read.

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{
    Battery, CPUCores, CacheLocation, CachePolicy, DiskInfo, DisplayInfo, NetworkInterface, OSInfo,
    ResourceUsage,
};

use crate::cache::CacheManager;

pub const PLATFORM_ID: &str = "serenity";

const PAGE_SIZE: u64 = 4096;

fn never_expire() -> CachePolicy {
    CachePolicy { location: CacheLocation::Persistent, ttl: None }
}

pub fn mem_info(_cache: &CacheManager) -> Result<ResourceUsage> {
    let contents = std::fs::read_to_string("/sys/kernel/memstat")?;
    let parsed: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| Error::new(ErrorKind::ParseError, e.to_string()))?;
    let allocated = parsed["physical_allocated"]
        .as_u64()
        .ok_or_else(|| Error::new(ErrorKind::ParseError, "missing physical_allocated"))?;
    let available = parsed["physical_available"]
        .as_u64()
        .ok_or_else(|| Error::new(ErrorKind::ParseError, "missing physical_available"))?;
    Ok(ResourceUsage {
        used_bytes: allocated * PAGE_SIZE,
        total_bytes: (allocated + available) * PAGE_SIZE,
    })
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    cache.get_or_set("serenity_os_info", Some(never_expire()), || {
        unsafe {
            let mut uts: std::mem::MaybeUninit<libc::utsname> = std::mem::MaybeUninit::uninit();
            if libc::uname(uts.as_mut_ptr()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            let uts = uts.assume_init();
            let release = std::ffi::CStr::from_ptr(uts.release.as_ptr()).to_string_lossy().into_owned();
            Ok(OSInfo { name: "SerenityOS".to_string(), version: release, id: "serenity".to_string() })
        }
    })
}

pub fn desktop_environment(_cache: &CacheManager) -> Result<String> {
    Ok("SerenityOS Desktop".to_string())
}

pub fn window_manager(_cache: &CacheManager) -> Result<String> {
    Ok("WindowManager".to_string())
}

pub fn shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("serenity_shell", Some(never_expire()), || {
        unsafe {
            let pw = libc::getpwuid(libc::getuid());
            if pw.is_null() {
                return Err(Error::new(ErrorKind::NotFound, "getpwuid returned no entry for current user"));
            }
            let shell_ptr = (*pw).pw_shell;
            if shell_ptr.is_null() {
                return Err(Error::new(ErrorKind::NotFound, "passwd entry has no shell field"));
            }
            Ok(std::ffi::CStr::from_ptr(shell_ptr).to_string_lossy().into_owned())
        }
    })
}

pub fn host(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::NotSupported, "host identification is not implemented on SerenityOS"))
}

pub fn cpu_model(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::NotSupported, "CPU model identification is not implemented on SerenityOS"))
}

pub fn cpu_cores(_cache: &CacheManager) -> Result<CPUCores> {
    Err(Error::new(ErrorKind::NotSupported, "CPU core enumeration is not implemented on SerenityOS"))
}

pub fn gpu_model(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::NotSupported, "GPU identification is not implemented on SerenityOS"))
}

pub fn kernel_version(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("serenity_kernel_version", Some(never_expire()), || {
        unsafe {
            let mut uts: std::mem::MaybeUninit<libc::utsname> = std::mem::MaybeUninit::uninit();
            if libc::uname(uts.as_mut_ptr()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            let uts = uts.assume_init();
            Ok(std::ffi::CStr::from_ptr(uts.release.as_ptr()).to_string_lossy().into_owned())
        }
    })
}

pub fn disk_usage() -> Result<ResourceUsage> {
    Err(Error::new(ErrorKind::NotSupported, "disk usage is not implemented on SerenityOS"))
}

pub fn disks(_cache: &CacheManager) -> Result<Vec<DiskInfo>> {
    Err(Error::new(ErrorKind::NotSupported, "disk enumeration is not implemented on SerenityOS"))
}

pub fn outputs(_cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    Err(Error::new(ErrorKind::NotSupported, "display enumeration is not implemented on SerenityOS"))
}

pub fn network_interfaces(_cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on SerenityOS"))
}

pub fn primary_network_interface(_cache: &CacheManager) -> Result<NetworkInterface> {
    Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on SerenityOS"))
}

pub fn battery_info() -> Result<Battery> {
    Err(Error::new(ErrorKind::NotSupported, "battery status is not implemented on SerenityOS"))
}

pub fn uptime() -> Result<u64> {
    Err(Error::new(ErrorKind::NotSupported, "uptime is not implemented on SerenityOS"))
}
