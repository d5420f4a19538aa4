//! macOS probe implementations (§4.3 "macOS").

use std::ffi::CString;
use std::mem::MaybeUninit;

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{
    Battery, BatteryStatus, CPUCores, CacheLocation, CachePolicy, DiskInfo, DisplayInfo,
    NetworkInterface, OSInfo, Resolution, ResourceUsage,
};

use crate::cache::CacheManager;

pub const PLATFORM_ID: &str = "macos";

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

/// `sysctlbyname` returning a `u64`.
fn sysctl_u64(name: &str) -> Result<u64> {
    let c_name = CString::new(name).unwrap();
    let mut value: u64 = 0;
    let mut size = std::mem::size_of::<u64>();
    unsafe {
        let rc = libc::sysctlbyname(
            c_name.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        );
        if rc != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
    }
    Ok(value)
}

/// `sysctlbyname` returning a NUL-terminated string.
fn sysctl_string(name: &str) -> Result<String> {
    let c_name = CString::new(name).unwrap();
    let mut size: usize = 0;
    unsafe {
        if libc::sysctlbyname(c_name.as_ptr(), std::ptr::null_mut(), &mut size, std::ptr::null_mut(), 0) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        let mut buf = vec![0u8; size];
        if libc::sysctlbyname(
            c_name.as_ptr(),
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        ) != 0
        {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        buf.truncate(size.saturating_sub(1).min(buf.len()));
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

pub fn mem_info(_cache: &CacheManager) -> Result<ResourceUsage> {
    let total = sysctl_u64("hw.memsize")?;
    // host_statistics64(HOST_VM_INFO64) needs mach APIs this crate doesn't
    // bind directly; vm_stat's "Pages active"/"Pages wired down" gives the
    // same (active + wire) * pagesize figure without a hand-rolled mach
    // trap wrapper.
    let output = std::process::Command::new("vm_stat")
        .output()
        .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
    let text = String::from_utf8_lossy(&output.stdout);
    let page_size = parse_vm_stat_field(&text, "page size of").unwrap_or(4096);
    let active = parse_vm_stat_pages(&text, "Pages active").unwrap_or(0);
    let wired = parse_vm_stat_pages(&text, "Pages wired down").unwrap_or(0);
    let used = (active + wired) * page_size;
    Ok(ResourceUsage { used_bytes: used, total_bytes: total })
}

fn parse_vm_stat_field(text: &str, marker: &str) -> Option<u64> {
    text.lines()
        .find(|l| l.contains(marker))
        .and_then(|l| l.split_whitespace().rev().nth(1))
        .and_then(|s| s.parse().ok())
}

fn parse_vm_stat_pages(text: &str, marker: &str) -> Option<u64> {
    text.lines()
        .find(|l| l.starts_with(marker))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().trim_end_matches('.'))
        .and_then(|s| s.parse().ok())
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    cache.get_or_set("macos_os_info", Some(never_expire()), || {
        let value: plist::Value = plist::Value::from_file("/System/Library/CoreServices/SystemVersion.plist")
            .map_err(|e| Error::new(ErrorKind::ParseError, e.to_string()))?;
        let dict = value.as_dictionary().ok_or_else(|| Error::new(ErrorKind::ParseError, "SystemVersion.plist is not a dictionary"))?;
        let get = |key: &str| dict.get(key).and_then(|v| v.as_string()).map(str::to_string);
        let name = get("ProductName").ok_or_else(|| Error::new(ErrorKind::ParseError, "missing ProductName"))?;
        let version = get("ProductVersion").unwrap_or_default();
        Ok(OSInfo { name, version, id: "macos".to_string() })
    })
}

pub fn desktop_environment(_cache: &CacheManager) -> Result<String> {
    Ok("Aqua".to_string())
}

const KNOWN_WMS: &[&str] = &["yabai", "chunkwm", "amethyst", "spectacle", "rectangle"];

pub fn window_manager(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_wm", Some(never_expire()), || {
        let output = std::process::Command::new("ps")
            .args(["-axco", "command"])
            .output()
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
        let text = String::from_utf8_lossy(&output.stdout);
        for line in text.lines() {
            let lower = line.trim().to_lowercase();
            if let Some(found) = KNOWN_WMS.iter().find(|wm| lower == **wm) {
                return Ok(title_case(found));
            }
        }
        Ok("Quartz".to_string())
    })
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

const SHELL_NAMES: &[(&str, &str)] = &[
    ("bash", "Bash"),
    ("zsh", "Zsh"),
    ("ksh", "KornShell"),
    ("fish", "Fish"),
    ("tcsh", "TCSH"),
    ("csh", "C Shell"),
    ("sh", "POSIX Shell"),
    ("nu", "Nushell"),
];

pub fn shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_shell", Some(session_scoped()), || {
        let shell_path = std::env::var("SHELL").map_err(|_| Error::new(ErrorKind::NotFound, "SHELL not set"))?;
        let basename = std::path::Path::new(&shell_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&shell_path);
        Ok(SHELL_NAMES
            .iter()
            .find(|(bin, _)| *bin == basename)
            .map(|(_, friendly)| friendly.to_string())
            .unwrap_or_else(|| shell_path.clone()))
    })
}

pub fn host(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_host", Some(never_expire()), || {
        let model = sysctl_string("hw.model")?;
        apple_model_to_name(&model).ok_or_else(|| {
            Error::new(ErrorKind::UnavailableFeature, format!("unrecognised Apple model identifier {model}"))
        })
    })
}

fn apple_model_to_name(model: &str) -> Option<String> {
    let family = model.split(',').next()?;
    let name = match family {
        f if f.starts_with("MacBookPro") => "MacBook Pro",
        f if f.starts_with("MacBookAir") => "MacBook Air",
        f if f.starts_with("MacBook") => "MacBook",
        f if f.starts_with("MacMini") => "Mac mini",
        f if f.starts_with("MacPro") => "Mac Pro",
        f if f.starts_with("iMacPro") => "iMac Pro",
        f if f.starts_with("iMac") => "iMac",
        f if f.starts_with("Mac") => "Mac",
        _ => return None,
    };
    Some(name.to_string())
}

pub fn cpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_cpu_model", Some(never_expire()), || {
        sysctl_string("machdep.cpu.brand_string")
    })
}

pub fn cpu_cores(cache: &CacheManager) -> Result<CPUCores> {
    cache.get_or_set("macos_cpu_cores", Some(never_expire()), || {
        let physical = sysctl_u64("hw.physicalcpu")? as usize;
        let logical = sysctl_u64("hw.logicalcpu")? as usize;
        Ok(CPUCores::new(physical, logical))
    })
}

pub fn gpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_gpu_model", Some(never_expire()), || {
        let output = std::process::Command::new("system_profiler")
            .args(["SPDisplaysDataType", "-json"])
            .output()
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::new(ErrorKind::ParseError, e.to_string()))?;
        parsed["SPDisplaysDataType"][0]["sppci_model"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "system_profiler reported no GPU model"))
    })
}

pub fn kernel_version(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("macos_kernel_version", Some(never_expire()), || sysctl_string("kern.osrelease"))
}

pub fn disk_usage() -> Result<ResourceUsage> {
    statvfs_usage("/")
}

fn statvfs_usage(path: &str) -> Result<ResourceUsage> {
    let c_path = CString::new(path).map_err(|_| Error::new(ErrorKind::InvalidArgument, "path contains NUL"))?;
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
    cache.get_or_set("macos_disks", Some(short_lived()), || {
        let usage = statvfs_usage("/")?;
        Ok(vec![DiskInfo {
            name: "/dev/disk1".to_string(),
            mount_point: "/".to_string(),
            filesystem: "apfs".to_string(),
            drive_type: "Fixed".to_string(),
            total_bytes: usage.total_bytes,
            used_bytes: usage.used_bytes,
            is_system_drive: true,
        }])
    })
}

pub fn outputs(cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    cache.get_or_set("macos_outputs", Some(session_scoped()), || {
        let output = std::process::Command::new("system_profiler")
            .args(["SPDisplaysDataType", "-json"])
            .output()
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::new(ErrorKind::ParseError, e.to_string()))?;
        let gpus = parsed["SPDisplaysDataType"].as_array().cloned().unwrap_or_default();
        let mut list = Vec::new();
        let mut id = 0u64;
        for gpu in gpus {
            let displays = gpu["spdisplays_ndrvs"].as_array().cloned().unwrap_or_default();
            for display in displays {
                let resolution_str = display["_spdisplays_resolution"].as_str().unwrap_or("0 x 0");
                let (width, height) = parse_resolution(resolution_str);
                let is_primary = display["spdisplays_main"].as_str() == Some("spdisplays_yes");
                list.push(DisplayInfo {
                    id,
                    resolution: Resolution { width, height },
                    refresh_rate: 60.0,
                    is_primary,
                });
                id += 1;
            }
        }
        if list.is_empty() {
            return Err(Error::new(ErrorKind::NotFound, "system_profiler reported no displays"));
        }
        Ok(list)
    })
}

fn parse_resolution(s: &str) -> (u32, u32) {
    let mut parts = s.split(['x', '@']).map(str::trim);
    let width = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let height = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (width, height)
}

pub fn network_interfaces(cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    cache.get_or_set("macos_network_interfaces", Some(short_lived()), collect_interfaces)
}

fn collect_interfaces() -> Result<Vec<NetworkInterface>> {
    use std::collections::HashMap;
    use std::ffi::CStr;

    let mut by_name: HashMap<String, NetworkInterface> = HashMap::new();
    unsafe {
        let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(&mut head) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        let mut cursor = head;
        while !cursor.is_null() {
            let ifa = &*cursor;
            let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
            let entry = by_name.entry(name.clone()).or_insert_with(|| NetworkInterface {
                name: name.clone(),
                ipv4_address: None,
                ipv6_address: None,
                mac_address: None,
                is_up: false,
                is_loopback: false,
            });
            entry.is_up = ifa.ifa_flags & libc::IFF_UP as u32 != 0;
            entry.is_loopback = ifa.ifa_flags & libc::IFF_LOOPBACK as u32 != 0;
            if !ifa.ifa_addr.is_null() {
                let family = (*ifa.ifa_addr).sa_family as i32;
                if family == libc::AF_INET {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                    entry.ipv4_address = Some(std::net::Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr)).to_string());
                } else if family == libc::AF_INET6 {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in6);
                    entry.ipv6_address = Some(std::net::Ipv6Addr::from(addr.sin6_addr.s6_addr).to_string());
                }
            }
            cursor = ifa.ifa_next;
        }
        libc::freeifaddrs(head);
    }
    if by_name.is_empty() {
        return Err(Error::new(ErrorKind::NotFound, "no network interfaces reported"));
    }
    Ok(by_name.into_values().collect())
}

pub fn primary_network_interface(cache: &CacheManager) -> Result<NetworkInterface> {
    cache.get_or_set("macos_primary_network_interface", Some(short_lived()), || {
        let output = std::process::Command::new("route")
            .args(["-n", "get", "default"])
            .output()
            .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let iface_name = text
            .lines()
            .find_map(|l| l.trim().strip_prefix("interface: "))
            .map(str::to_string);
        let all = collect_interfaces()?;
        if let Some(name) = iface_name {
            if let Some(found) = all.iter().find(|i| i.name == name) {
                return Ok(found.clone());
            }
        }
        all.into_iter()
            .find(|i| !i.is_loopback && i.is_up)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no non-loopback interface is up"))
    })
}

pub fn battery_info() -> Result<Battery> {
    let output = std::process::Command::new("pmset")
        .arg("-g")
        .arg("batt")
        .output()
        .map_err(|e| Error::new(ErrorKind::ApiUnavailable, e.to_string()))?;
    let text = String::from_utf8_lossy(&output.stdout);
    let detail_line = text
        .lines()
        .find(|l| l.contains('%'))
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "no battery present"))?;
    let percentage = regex::Regex::new(r"(\d+)%")
        .unwrap()
        .captures(detail_line)
        .and_then(|c| c[1].parse::<u8>().ok());
    let charging = detail_line.contains("charging") && !detail_line.contains("discharging");
    let status = match (charging, percentage) {
        (true, Some(100)) => BatteryStatus::Full,
        (true, _) => BatteryStatus::Charging,
        (false, _) => BatteryStatus::Discharging,
    };
    Ok(Battery { status, percentage, time_remaining: None })
}

pub fn uptime() -> Result<u64> {
    let boottime = sysctl_u64("kern.boottime.tv_sec").or_else(|_| {
        // kern.boottime is a `struct timeval`, not a plain u64; fall back to
        // reading just the seconds field via the generic sysctl().
        sysctl_boottime_seconds()
    })?;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(now.saturating_sub(boottime))
}

fn sysctl_boottime_seconds() -> Result<u64> {
    #[repr(C)]
    struct Timeval {
        tv_sec: i64,
        tv_usec: i64,
    }
    let mut mib = [libc::CTL_KERN, libc::KERN_BOOTTIME];
    let mut tv = Timeval { tv_sec: 0, tv_usec: 0 };
    let mut size = std::mem::size_of::<Timeval>();
    unsafe {
        let rc = libc::sysctl(
            mib.as_mut_ptr(),
            2,
            &mut tv as *mut Timeval as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        );
        if rc != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
    }
    Ok(tv.tv_sec.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apple_model_maps_known_families() {
        assert_eq!(apple_model_to_name("MacBookPro18,3").as_deref(), Some("MacBook Pro"));
        assert_eq!(apple_model_to_name("Mac14,2").as_deref(), Some("Mac"));
        assert_eq!(apple_model_to_name("PurpleBox1,1"), None);
    }

    #[test]
    fn parse_resolution_handles_refresh_suffix() {
        assert_eq!(parse_resolution("1920 x 1080 @ 60.00Hz"), (1920, 1080));
        assert_eq!(parse_resolution("2560 x 1440"), (2560, 1440));
    }
}
