//! Linux probe implementations (§4.3 "Linux").

use std::collections::HashSet;
use std::ffi::CStr;
use std::fs;
use std::mem::MaybeUninit;

use draconis_common::error::{Error, ErrorKind, Result};
use draconis_common::types::{
    Battery, BatteryStatus, CPUCores, CacheLocation, CachePolicy, DiskInfo, DisplayInfo,
    NetworkInterface, OSInfo, Resolution, ResourceUsage,
};

use crate::cache::CacheManager;

use super::common::{desktop_environment_from_env, friendly_shell_name, window_manager_from_session};

pub const PLATFORM_ID: &str = "linux";

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

pub fn mem_info(_cache: &CacheManager) -> Result<ResourceUsage> {
    unsafe {
        let mut info: MaybeUninit<libc::sysinfo> = MaybeUninit::uninit();
        if libc::sysinfo(info.as_mut_ptr()) != 0 {
            return Err(Error::from(std::io::Error::last_os_error()));
        }
        let info = info.assume_init();
        let mem_unit = info.mem_unit.max(1) as u64;
        let total = info.totalram as u64 * mem_unit;
        let free = info.freeram as u64 * mem_unit;
        let buffer = info.bufferram as u64 * mem_unit;
        let used = total.saturating_sub(free).saturating_sub(buffer);
        Ok(ResourceUsage { used_bytes: used, total_bytes: total })
    }
}

/// Unquote a shell-style quoted value as found in `/etc/os-release`.
fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_os_release(contents: &str) -> (Option<String>, Option<String>, Option<String>, Option<String>, Option<String>) {
    let mut name = None;
    let mut version = None;
    let mut id = None;
    let mut pretty_name = None;
    let mut version_id = None;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else { continue };
        let value = unquote(value);
        match key {
            "NAME" => name = Some(value),
            "VERSION" => version = Some(value),
            "ID" => id = Some(value),
            "PRETTY_NAME" => pretty_name = Some(value),
            "VERSION_ID" => version_id = Some(value),
            _ => {}
        }
    }
    (name, version, id, pretty_name, version_id)
}

pub fn operating_system(cache: &CacheManager) -> Result<OSInfo> {
    cache.get_or_set("linux_os_info", Some(never_expire()), || {
        let contents = fs::read_to_string("/etc/os-release")
            .or_else(|_| fs::read_to_string("/usr/lib/os-release"))?;
        let (name, version, id, pretty_name, version_id) = parse_os_release(&contents);
        let name = name.or(pretty_name).ok_or_else(|| {
            Error::new(ErrorKind::ParseError, "os-release missing NAME/PRETTY_NAME")
        })?;
        let version = version.or(version_id).unwrap_or_default();
        let id = id.unwrap_or_else(|| "linux".to_string()).to_lowercase();
        Ok(OSInfo { name, version, id })
    })
}

pub fn desktop_environment(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_desktop_environment", Some(never_expire()), || {
        desktop_environment_from_env()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no desktop-environment hint in environment"))
    })
}

pub fn window_manager(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_wm", Some(never_expire()), || {
        window_manager_from_session()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no graphical session detected"))
    })
}

pub fn shell(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_shell", Some(session_scoped()), || {
        let shell = std::env::var("SHELL")
            .map_err(|_| Error::new(ErrorKind::NotFound, "SHELL is not set"))?;
        Ok(friendly_shell_name(&shell))
    })
}

pub fn host(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_host", Some(never_expire()), || {
        read_dmi_field("product_family").or_else(|_| read_dmi_field("product_name"))
    })
}

fn read_dmi_field(field: &str) -> Result<String> {
    let path = format!("/sys/class/dmi/id/{field}");
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.trim().to_string()),
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Error::new(ErrorKind::PermissionDenied, format!("cannot read {path}")))
        }
        Err(err) => Err(Error::from(err)),
    }
}

pub fn cpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_cpu_model", Some(never_expire()), || {
        let contents = fs::read_to_string("/proc/cpuinfo")?;
        contents
            .lines()
            .find_map(|line| line.strip_prefix("model name").and_then(|rest| rest.split_once(':')).map(|(_, v)| v.trim().to_string()))
            .ok_or_else(|| Error::new(ErrorKind::ParseError, "no 'model name' field in /proc/cpuinfo"))
    })
}

pub fn cpu_cores(cache: &CacheManager) -> Result<CPUCores> {
    cache.get_or_set("linux_cpu_cores", Some(never_expire()), || {
        let contents = fs::read_to_string("/proc/cpuinfo")?;
        let mut logical = 0usize;
        let mut physical_ids: HashSet<(String, String)> = HashSet::new();
        let mut current_physical_id = String::new();
        for line in contents.lines() {
            if line.starts_with("processor") {
                logical += 1;
            } else if let Some((_, value)) = line.split_once(':') {
                if line.starts_with("physical id") {
                    current_physical_id = value.trim().to_string();
                } else if line.starts_with("core id") {
                    physical_ids.insert((current_physical_id.clone(), value.trim().to_string()));
                }
            }
        }
        let physical = if physical_ids.is_empty() { logical } else { physical_ids.len() };
        if logical == 0 {
            return Err(Error::new(ErrorKind::ParseError, "/proc/cpuinfo reported zero logical cores"));
        }
        Ok(CPUCores::new(physical.max(1).min(logical), logical))
    })
}

const PCI_VENDOR_NAMES: &[(u32, &str)] = &[(0x1002, "AMD"), (0x10de, "NVIDIA"), (0x8086, "Intel")];
const PCI_IDS_PATH: &str = "/usr/share/hwdata/pci.ids";

fn parse_hex_file(path: &str) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    u32::from_str_radix(contents.trim().trim_start_matches("0x"), 16).ok()
}

/// Look up a PCI device's marketing name in a `pci.ids`-format database:
/// unindented lines are 4-hex-digit vendor ids, tab-indented lines under a
/// vendor are its devices.
fn lookup_pci_ids(path: &str, vendor: u32, device: u32) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let vendor_hex = format!("{vendor:04x}");
    let device_hex = format!("{device:04x}");
    let mut in_matching_vendor = false;
    for line in contents.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !line.starts_with('\t') {
            in_matching_vendor = line.len() >= 4 && line[..4].eq_ignore_ascii_case(&vendor_hex);
            continue;
        }
        if in_matching_vendor && !line.starts_with("\t\t") {
            let entry = line.trim_start_matches('\t');
            if entry.len() >= 4 && entry[..4].eq_ignore_ascii_case(&device_hex) {
                return Some(entry[4..].trim_start().to_string());
            }
        }
    }
    None
}

pub fn gpu_model(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_gpu_model", Some(never_expire()), || {
        let entries = fs::read_dir("/sys/bus/pci/devices")
            .map_err(|_| Error::new(ErrorKind::NotSupported, "no PCI bus exposed under /sys"))?;
        for entry in entries.flatten() {
            let class = parse_hex_file(&entry.path().join("class").to_string_lossy());
            let is_display = class.map(|c| (c >> 16) == 0x03).unwrap_or(false);
            if !is_display {
                continue;
            }
            let vendor = parse_hex_file(&entry.path().join("vendor").to_string_lossy());
            let device = parse_hex_file(&entry.path().join("device").to_string_lossy());
            if let (Some(vendor), Some(device)) = (vendor, device) {
                if let Some(name) = lookup_pci_ids(PCI_IDS_PATH, vendor, device) {
                    return Ok(name);
                }
                if let Some((_, name)) = PCI_VENDOR_NAMES.iter().find(|(id, _)| *id == vendor) {
                    return Ok(name.to_string());
                }
                return Ok(format!("Unknown GPU (vendor {vendor:#06x})"));
            }
        }
        Err(Error::new(ErrorKind::NotFound, "no display-class PCI device found"))
    })
}

pub fn kernel_version(cache: &CacheManager) -> Result<String> {
    cache.get_or_set("linux_kernel_version", Some(never_expire()), || {
        unsafe {
            let mut uts: MaybeUninit<libc::utsname> = MaybeUninit::uninit();
            if libc::uname(uts.as_mut_ptr()) != 0 {
                return Err(Error::from(std::io::Error::last_os_error()));
            }
            let uts = uts.assume_init();
            let release = CStr::from_ptr(uts.release.as_ptr()).to_string_lossy().into_owned();
            Ok(release)
        }
    })
}

pub fn disk_usage() -> Result<ResourceUsage> {
    statvfs_usage("/")
}

fn statvfs_usage(path: &str) -> Result<ResourceUsage> {
    use std::ffi::CString;
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
    cache.get_or_set("linux_disks", Some(short_lived()), || {
        let contents = fs::read_to_string("/proc/mounts")?;
        let mut disks = Vec::new();
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let (Some(device), Some(mount_point), Some(filesystem)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if !device.starts_with("/dev/") {
                continue;
            }
            let usage = match statvfs_usage(mount_point) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if usage.total_bytes == 0 {
                continue;
            }
            disks.push(DiskInfo {
                name: device.to_string(),
                mount_point: mount_point.to_string(),
                filesystem: filesystem.to_string(),
                drive_type: "Fixed".to_string(),
                total_bytes: usage.total_bytes,
                used_bytes: usage.used_bytes,
                is_system_drive: mount_point == "/",
            });
        }
        if disks.is_empty() {
            return Err(Error::new(ErrorKind::NotFound, "no mounted block devices found"));
        }
        Ok(disks)
    })
}

/// Display enumeration degrades to `NotSupported` without a running
/// Wayland/X11 session or its query tool (`swaymsg`, `xrandr`) on PATH.
pub fn outputs(cache: &CacheManager) -> Result<Vec<DisplayInfo>> {
    cache.get_or_set("linux_outputs", Some(session_scoped()), || {
        if std::env::var("WAYLAND_DISPLAY").is_ok() {
            if let Ok(list) = outputs_from_swaymsg() {
                return Ok(list);
            }
        }
        if std::env::var("DISPLAY").is_ok() {
            if let Ok(list) = outputs_from_xrandr() {
                return Ok(list);
            }
        }
        Err(Error::new(ErrorKind::NotSupported, "no display query mechanism available"))
    })
}

fn outputs_from_swaymsg() -> Result<Vec<DisplayInfo>> {
    let output = std::process::Command::new("swaymsg")
        .args(["-t", "get_outputs", "-r"])
        .output()
        .map_err(|_| Error::new(ErrorKind::ApiUnavailable, "swaymsg not available"))?;
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::new(ErrorKind::ParseError, e.to_string()))?;
    let array = parsed.as_array().ok_or_else(|| Error::new(ErrorKind::ParseError, "unexpected swaymsg output"))?;
    let mut list = Vec::new();
    for (idx, item) in array.iter().enumerate() {
        let mode = &item["current_mode"];
        let width = mode["width"].as_u64().unwrap_or(0) as u32;
        let height = mode["height"].as_u64().unwrap_or(0) as u32;
        let refresh_mhz = mode["refresh"].as_f64().unwrap_or(0.0);
        list.push(DisplayInfo {
            id: idx as u64,
            resolution: Resolution { width, height },
            refresh_rate: refresh_mhz / 1000.0,
            is_primary: item["focused"].as_bool().unwrap_or(false),
        });
    }
    if list.is_empty() {
        return Err(Error::new(ErrorKind::NotFound, "swaymsg reported no outputs"));
    }
    Ok(list)
}

fn outputs_from_xrandr() -> Result<Vec<DisplayInfo>> {
    let output = std::process::Command::new("xrandr")
        .arg("--query")
        .output()
        .map_err(|_| Error::new(ErrorKind::ApiUnavailable, "xrandr not available"))?;
    let text = String::from_utf8_lossy(&output.stdout);
    let re_connected = regex::Regex::new(r"^(\S+) connected( primary)? (\d+)x(\d+)\+\d+\+\d+").unwrap();
    let re_active_mode = regex::Regex::new(r"^\s+(\d+)x(\d+)\s+([\d.]+)\*").unwrap();
    let mut list = Vec::new();
    let mut id = 0u64;
    let mut pending: Option<(bool, u32, u32)> = None;
    for line in text.lines() {
        if let Some(caps) = re_connected.captures(line) {
            if let Some((is_primary, width, height)) = pending.take() {
                list.push(DisplayInfo { id, resolution: Resolution { width, height }, refresh_rate: 60.0, is_primary });
                id += 1;
            }
            let is_primary = caps.get(2).is_some();
            let width: u32 = caps[3].parse().unwrap_or(0);
            let height: u32 = caps[4].parse().unwrap_or(0);
            pending = Some((is_primary, width, height));
        } else if let Some(caps) = re_active_mode.captures(line) {
            if let Some((is_primary, width, height)) = pending.take() {
                let refresh: f64 = caps[3].parse().unwrap_or(60.0);
                list.push(DisplayInfo { id, resolution: Resolution { width, height }, refresh_rate: refresh, is_primary });
                id += 1;
            }
        }
    }
    if let Some((is_primary, width, height)) = pending.take() {
        list.push(DisplayInfo { id, resolution: Resolution { width, height }, refresh_rate: 60.0, is_primary });
    }
    if list.is_empty() {
        return Err(Error::new(ErrorKind::NotFound, "xrandr reported no connected outputs"));
    }
    Ok(list)
}

pub fn network_interfaces(cache: &CacheManager) -> Result<Vec<NetworkInterface>> {
    cache.get_or_set("linux_network_interfaces", Some(short_lived()), collect_interfaces)
}

fn collect_interfaces() -> Result<Vec<NetworkInterface>> {
    use std::collections::HashMap;

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
                is_up: ifa.ifa_flags & libc::IFF_UP as u32 != 0,
                is_loopback: ifa.ifa_flags & libc::IFF_LOOPBACK as u32 != 0,
            });
            entry.is_up = ifa.ifa_flags & libc::IFF_UP as u32 != 0;
            entry.is_loopback = ifa.ifa_flags & libc::IFF_LOOPBACK as u32 != 0;

            if !ifa.ifa_addr.is_null() {
                let family = (*ifa.ifa_addr).sa_family as i32;
                if family == libc::AF_INET {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                    let ip = std::net::Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
                    entry.ipv4_address = Some(ip.to_string());
                } else if family == libc::AF_INET6 {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in6);
                    let ip = std::net::Ipv6Addr::from(addr.sin6_addr.s6_addr);
                    entry.ipv6_address = Some(ip.to_string());
                } else if family == libc::AF_PACKET {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_ll);
                    let len = addr.sll_halen as usize;
                    if len == 6 {
                        let mac = &addr.sll_addr[..6];
                        entry.mac_address = Some(
                            mac.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":"),
                        );
                    }
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
    cache.get_or_set("linux_primary_network_interface", Some(short_lived()), || {
        let default_name = default_route_interface();
        let all = collect_interfaces()?;
        if let Some(name) = default_name {
            if let Some(found) = all.iter().find(|i| i.name == name) {
                return Ok(found.clone());
            }
        }
        all.into_iter()
            .find(|i| !i.is_loopback && i.is_up)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "no non-loopback interface is up"))
    })
}

fn default_route_interface() -> Option<String> {
    let contents = fs::read_to_string("/proc/net/route").ok()?;
    for line in contents.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let iface = fields.next()?;
        let destination = fields.next()?;
        if destination == "00000000" {
            return Some(iface.to_string());
        }
    }
    None
}

pub fn battery_info() -> Result<Battery> {
    let base = std::path::Path::new("/sys/class/power_supply");
    let entries = fs::read_dir(base).map_err(|_| Error::new(ErrorKind::NotFound, "no power_supply class exposed"))?;
    for entry in entries.flatten() {
        let type_path = entry.path().join("type");
        let Ok(kind) = fs::read_to_string(&type_path) else { continue };
        if kind.trim() != "Battery" {
            continue;
        }
        let capacity: Option<u8> = fs::read_to_string(entry.path().join("capacity"))
            .ok()
            .and_then(|s| s.trim().parse().ok());
        let status_raw = fs::read_to_string(entry.path().join("status")).unwrap_or_default();
        let status_raw = status_raw.trim();
        let status = match (status_raw, capacity) {
            (_, Some(100)) if status_raw == "Not charging" || status_raw == "Full" => BatteryStatus::Full,
            ("Charging", _) => BatteryStatus::Charging,
            ("Discharging", _) => BatteryStatus::Discharging,
            ("Not charging", _) => BatteryStatus::Discharging,
            _ => BatteryStatus::Unknown,
        };
        let time_remaining = match status {
            BatteryStatus::Charging => fs::read_to_string(entry.path().join("time_to_full_now")).ok(),
            BatteryStatus::Discharging => fs::read_to_string(entry.path().join("time_to_empty_now")).ok(),
            _ => None,
        }
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|minutes| minutes * 60);
        return Ok(Battery { status, percentage: capacity, time_remaining });
    }
    Err(Error::new(ErrorKind::NotFound, "no battery power supply present"))
}

pub fn uptime() -> Result<u64> {
    let contents = fs::read_to_string("/proc/uptime")?;
    let seconds = contents
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::new(ErrorKind::ParseError, "unexpected /proc/uptime format"))?;
    Ok(seconds as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_os_release_extracts_known_keys() {
        let sample = "NAME=\"Arch Linux\"\nID=arch\nPRETTY_NAME=\"Arch Linux\"\n";
        let (name, _version, id, pretty, _vid) = parse_os_release(sample);
        assert_eq!(name.as_deref(), Some("Arch Linux"));
        assert_eq!(id.as_deref(), Some("arch"));
        assert_eq!(pretty.as_deref(), Some("Arch Linux"));
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"hello\""), "hello");
        assert_eq!(unquote("'hello'"), "hello");
        assert_eq!(unquote("hello"), "hello");
        assert_eq!(unquote("\"unterminated"), "\"unterminated");
    }

    #[test]
    fn not_charging_below_full_is_discharging_not_charging() {
        let status_raw = "Not charging";
        let capacity = Some(80u8);
        let status = match (status_raw, capacity) {
            (_, Some(100)) if status_raw == "Not charging" || status_raw == "Full" => BatteryStatus::Full,
            ("Charging", _) => BatteryStatus::Charging,
            ("Discharging", _) => BatteryStatus::Discharging,
            ("Not charging", _) => BatteryStatus::Discharging,
            _ => BatteryStatus::Unknown,
        };
        assert_eq!(status, BatteryStatus::Discharging);
    }

    #[test]
    fn lookup_pci_ids_finds_device_under_matching_vendor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pci.ids");
        fs::write(
            &path,
            "# comment\n1002  Advanced Micro Devices, Inc. [AMD/ATI]\n\t6798  Tahiti XT [Radeon HD 7970]\n10de  NVIDIA Corporation\n\t1b80  GP104 [GeForce GTX 1080]\n",
        )
        .unwrap();
        let name = lookup_pci_ids(path.to_str().unwrap(), 0x1002, 0x6798);
        assert_eq!(name.as_deref(), Some("Tahiti XT [Radeon HD 7970]"));
        assert_eq!(lookup_pci_ids(path.to_str().unwrap(), 0x1002, 0x1234), None);
        assert_eq!(lookup_pci_ids(path.to_str().unwrap(), 0x10de, 0x1b80).as_deref(), Some("GP104 [GeForce GTX 1080]"));
    }
}
