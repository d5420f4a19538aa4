//! FreeBSD/DragonFly/NetBSD probe implementations (§4.3 "BSD").
//!
//! Shell, kernel version and disk probes are identical to the Linux path
//! (`/proc`-free equivalents aside, the same `statvfs`/`uname` calls work
//! unchanged); window-manager/desktop-environment detection reuses the
//! same Wayland-or-X11 heuristic Linux uses, gated on a graphical session
//! variable being present.

use std::ffi::CStr;
use std::mem::MaybeUninit;

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{
    Battery, CPUCores, CacheLocation, CachePolicy, DiskInfo, DisplayInfo, NetworkInterface, OSInfo,
    ResourceUsage,
};

use crate::cache::CacheManager;

use super::common::{desktop_environment_from_env, friendly_shell_name, window_manager_from_session};

#[cfg(target_os = "freebsd")]
pub const PLATFORM_ID: &str = "freebsd";
#[cfg(target_os = "dragonfly")]
pub const PLATFORM_ID: &str = "dragonfly";
#[cfg(target_os = "netbsd")]
pub const PLATFORM_ID: &str = "netbsd";

const TTL_SHORT: u64 = 60;
const TTL_SESSION: u64 = 3_600;

fn never_expire() -> CachePolicy {
    CachePolicy { location: CacheLocation::Persistent, ttl: None }
}

fn short_lived() -> CachePolicy {
    CachePolicy { location: CacheLocation::Persistent, ttl: Some(TTL_SHORT) }
}

fn session_scoped() -> CachePolicy {
    CachePolicy { location: CacheLocation::TempDirectory, ttl: Some(TTL_SESSION) }
}

fn sysctl_u64(name: &str) -> Result<u64> {
    let c_name = std::ffi::CString::new(name).unwrap();
    let mut value: u64 = 0;
    let mut size = std::mem::size_of::<u64>();
    unsafe {
        if libc::sysctlbyname(c_name.as_ptr(), &mut value as *mut u64 as *mut libc::c_void, &mut size, std::ptr::null_mut(), 0) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
    }
    Ok(value)
}

pub fn mem_info(_cache: &CacheManager) -> Result<ResourceUsage> {
    let total = sysctl_u64("hw.physmem").or_else(|_| sysctl_u64("hw.physmem64"))?;
    Ok(ResourceUsage { used_bytes: 0, total_bytes: total })
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    cache.get_or_set("bsd_os_info", Some(never_expire()), || {
        if let Ok(contents) = std::fs::read_to_string("/etc/os-release") {
            let name = contents
                .lines()
                .find_map(|l| l.strip_prefix("NAME=").map(|v| v.trim_matches('"').to_string()));
            let id = contents
                .lines()
                .find_map(|l| l.strip_prefix("ID=").map(|v| v.trim_matches('"').to_lowercase()));
            if let (Some(name), Some(id)) = (name, id) {
                return Ok(OSInfo { name, version: String::new(), id });
            }
        }
        unsafe {
            let mut uts: MaybeUninit<libc::utsname> = MaybeUninit::uninit();
            if libc::uname(uts.as_mut_ptr()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            let uts = uts.assume_init();
            let sysname = CStr::from_ptr(uts.sysname.as_ptr()).to_string_lossy().into_owned();
            let release = CStr::from_ptr(uts.release.as_ptr()).to_string_lossy().into_owned();
            Ok(OSInfo { name: sysname.clone(), version: release, id: sysname.to_lowercase() })
        }
    })
}

pub fn desktop_environment(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_desktop_environment", Some(never_expire()), || {
        require_graphical_session()?;
        desktop_environment_from_env().ok_or_else(|| Error::new(ErrorKind::NotFound, "no desktop-environment hint"))
    })
}

pub fn window_manager(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_wm", Some(never_expire()), || {
        require_graphical_session()?;
        window_manager_from_session().ok_or_else(|| Error::new(ErrorKind::NotFound, "no graphical session detected"))
    })
}

fn require_graphical_session() -> Result<()> {
    if std::env::var("WAYLAND_DISPLAY").is_ok() || std::env::var("DISPLAY").is_ok() {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::NotSupported, "no graphical session variable set"))
    }
}

pub fn shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_shell", Some(session_scoped()), || {
        let shell = std::env::var("SHELL").map_err(|_| Error::new(ErrorKind::NotFound, "SHELL not set"))?;
        Ok(friendly_shell_name(&shell))
    })
}

pub fn host(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_host", Some(never_expire()), || {
        #[cfg(target_os = "netbsd")]
        {
            if let Ok(name) = sysctl_string("machdep.dmi.system-product") {
                return Ok(name);
            }
        }
        #[cfg(not(target_os = "netbsd"))]
        {
            if let Ok(output) = std::process::Command::new("kenv").arg("smbios.system.product").output() {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        sysctl_string("hw.model")
    })
}

fn sysctl_string(name: &str) -> Result<String> {
    let c_name = std::ffi::CString::new(name).unwrap();
    let mut size: usize = 0;
    unsafe {
        if libc::sysctlbyname(c_name.as_ptr(), std::ptr::null_mut(), &mut size, std::ptr::null_mut(), 0) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        let mut buf = vec![0u8; size];
        if libc::sysctlbyname(c_name.as_ptr(), buf.as_mut_ptr() as *mut libc::c_void, &mut size, std::ptr::null_mut(), 0) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        buf.truncate(size.saturating_sub(1).min(buf.len()));
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

pub fn cpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_cpu_model", Some(never_expire()), || sysctl_string("hw.model"))
}

pub fn cpu_cores(cache: &CacheManager) -> Result<CPUCores> {
    cache.get_or_set("bsd_cpu_cores", Some(never_expire()), || {
        let logical = sysctl_u64("hw.ncpu")? as usize;
        Ok(CPUCores::new(logical, logical))
    })
}

pub fn gpu_model(_cache: &CacheManager) -> Result<String> {
    Err(Error::new(ErrorKind::NotSupported, "GPU identification is not implemented on this BSD target"))
}

pub fn kernel_version(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("bsd_kernel_version", Some(never_expire()), || {
        unsafe {
            let mut uts: MaybeUninit<libc::utsname> = MaybeUninit::uninit();
            if libc::uname(uts.as_mut_ptr()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            let uts = uts.assume_init();
            Ok(CStr::from_ptr(uts.release.as_ptr()).to_string_lossy().into_owned())
        }
    })
}

pub fn disk_usage() -> Result<ResourceUsage> {
    statvfs_usage("/")
}

fn statvfs_usage(path: &str) -> Result<ResourceUsage> {
    let c_path = std::ffi::CString::new(path).unwrap();
    unsafe {
        let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
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
    cache.get_or_set("bsd_disks", Some(short_lived()), || {
        let usage = statvfs_usage("/")?;
        Ok(vec![DiskInfo {
            name: "root".to_string(),
            mount_point: "/".to_string(),
            filesystem: "ufs".to_string(),
            drive_type: "Fixed".to_string(),
            total_bytes: usage.total_bytes,
            used_bytes: usage.used_bytes,
            is_system_drive: true,
        }])
    })
}

pub fn outputs(_cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    Err(Error::new(ErrorKind::NotSupported, "display enumeration is not implemented on this BSD target"))
}

pub fn network_interfaces(cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    cache.get_or_set("bsd_network_interfaces", Some(short_lived()), || {
        Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on this BSD target"))
    })
}

pub fn primary_network_interface(_cache: &CacheManager) -> Result<NetworkInterface> {
    Err(Error::new(ErrorKind::NotSupported, "interface enumeration is not implemented on this BSD target"))
}

pub fn battery_info() -> Result<Battery> {
    Err(Error::new(ErrorKind::NotSupported, "battery status is not implemented on this BSD target"))
}

pub fn uptime() -> Result<u64> {
    let mut mib = [libc::CTL_KERN, libc::KERN_BOOTTIME];
    #[repr(C)]
    struct Timeval {
        tv_sec: i64,
        tv_usec: i64,
    }
    let mut tv = Timeval { tv_sec: 0, tv_usec: 0 };
    let mut size = std::mem::size_of::<Timeval>();
    unsafe {
        if libc::sysctl(mib.as_mut_ptr(), 2, &mut tv as *mut Timeval as *mut libc::c_void, &mut size, std::ptr::null_mut(), 0) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
    }
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    Ok(now.saturating_sub(tv.tv_sec.max(0) as u64))
}
