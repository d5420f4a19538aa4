//! C-layout mirrors of the §3 data types, plus the `Free<Type>`/
//! `Free<Type>List` deallocators §4.9 requires for every struct and list
//! struct that owns string fields.
//!
//! Ownership rule throughout: any `*mut c_char` handed back to the
//! caller was produced by [`CString::into_raw`] and must eventually pass
//! through [`drac_free_string`] (directly, or transitively via one of the
//! `Free*` routines below); `Free*` routines null the pointers they free
//! so a caller that double-frees a struct frees nothing the second time.

use std::ffi::{c_char, CString};
use std::os::raw::c_void;
use std::ptr;

use draconis_common::types::{Battery, BatteryStatus, DiskInfo, DisplayInfo, NetworkInterface, OSInfo};

fn to_c_string(s: &str) -> *mut c_char {
    CString::new(s).unwrap_or_else(|_| CString::new("").unwrap()).into_raw()
}

fn opt_to_c_string(s: &Option<String>) -> *mut c_char {
    match s {
        Some(s) => to_c_string(s),
        None => ptr::null_mut(),
    }
}

unsafe fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free a string previously returned through an out-parameter.
#[no_mangle]
pub unsafe extern "C" fn drac_free_string(s: *mut c_char) {
    free_c_string(s);
}

#[repr(C)]
pub struct DracResourceUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

#[repr(C)]
pub struct DracCpuCores {
    pub physical: usize,
    pub logical: usize,
}

#[repr(C)]
pub struct DracOsInfo {
    pub name: *mut c_char,
    pub version: *mut c_char,
    pub id: *mut c_char,
}

impl From<OSInfo> for DracOsInfo {
    fn from(info: OSInfo) -> Self {
        DracOsInfo {
            name: to_c_string(&info.name),
            version: to_c_string(&info.version),
            id: to_c_string(&info.id),
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_os_info(info: *mut DracOsInfo) {
    if info.is_null() {
        return;
    }
    let info = &mut *info;
    free_c_string(info.name);
    free_c_string(info.version);
    free_c_string(info.id);
    info.name = ptr::null_mut();
    info.version = ptr::null_mut();
    info.id = ptr::null_mut();
}

#[repr(C)]
pub struct DracDiskInfo {
    pub name: *mut c_char,
    pub mount_point: *mut c_char,
    pub filesystem: *mut c_char,
    pub drive_type: *mut c_char,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub is_system_drive: bool,
}

impl From<DiskInfo> for DracDiskInfo {
    fn from(d: DiskInfo) -> Self {
        DracDiskInfo {
            name: to_c_string(&d.name),
            mount_point: to_c_string(&d.mount_point),
            filesystem: to_c_string(&d.filesystem),
            drive_type: to_c_string(&d.drive_type),
            total_bytes: d.total_bytes,
            used_bytes: d.used_bytes,
            is_system_drive: d.is_system_drive,
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_disk_info(info: *mut DracDiskInfo) {
    if info.is_null() {
        return;
    }
    let info = &mut *info;
    free_c_string(info.name);
    free_c_string(info.mount_point);
    free_c_string(info.filesystem);
    free_c_string(info.drive_type);
    info.name = ptr::null_mut();
    info.mount_point = ptr::null_mut();
    info.filesystem = ptr::null_mut();
    info.drive_type = ptr::null_mut();
}

#[repr(C)]
pub struct DracDiskInfoList {
    pub items: *mut DracDiskInfo,
    pub len: usize,
}

impl DracDiskInfoList {
    pub(super) fn from_vec(disks: Vec<DiskInfo>) -> Self {
        let mut items: Vec<DracDiskInfo> = disks.into_iter().map(DracDiskInfo::from).collect();
        items.shrink_to_fit();
        let len = items.len();
        let ptr = items.as_mut_ptr();
        std::mem::forget(items);
        DracDiskInfoList { items: ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_disk_info_list(list: *mut DracDiskInfoList) {
    if list.is_null() {
        return;
    }
    let list = &mut *list;
    if !list.items.is_null() {
        let items = Vec::from_raw_parts(list.items, list.len, list.len);
        for mut item in items {
            drac_free_disk_info(&mut item);
        }
    }
    list.items = ptr::null_mut();
    list.len = 0;
}

#[repr(C)]
pub struct DracResolution {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
pub struct DracDisplayInfo {
    pub id: u64,
    pub resolution: DracResolution,
    pub refresh_rate: f64,
    pub is_primary: bool,
}

impl From<DisplayInfo> for DracDisplayInfo {
    fn from(d: DisplayInfo) -> Self {
        DracDisplayInfo {
            id: d.id,
            resolution: DracResolution {
                width: d.resolution.width,
                height: d.resolution.height,
            },
            refresh_rate: d.refresh_rate,
            is_primary: d.is_primary,
        }
    }
}

#[repr(C)]
pub struct DracDisplayInfoList {
    pub items: *mut DracDisplayInfo,
    pub len: usize,
}

impl DracDisplayInfoList {
    pub(super) fn from_vec(displays: Vec<DisplayInfo>) -> Self {
        let mut items: Vec<DracDisplayInfo> = displays.into_iter().map(DracDisplayInfo::from).collect();
        items.shrink_to_fit();
        let len = items.len();
        let ptr = items.as_mut_ptr();
        std::mem::forget(items);
        DracDisplayInfoList { items: ptr, len }
    }
}

/// Plain-data list; no owned strings, so freeing is just reclaiming the
/// backing allocation.
#[no_mangle]
pub unsafe extern "C" fn drac_free_display_info_list(list: *mut DracDisplayInfoList) {
    if list.is_null() {
        return;
    }
    let list = &mut *list;
    if !list.items.is_null() {
        drop(Vec::from_raw_parts(list.items, list.len, list.len));
    }
    list.items = ptr::null_mut();
    list.len = 0;
}

#[repr(C)]
pub struct DracNetworkInterface {
    pub name: *mut c_char,
    pub ipv4_address: *mut c_char,
    pub ipv6_address: *mut c_char,
    pub mac_address: *mut c_char,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl From<NetworkInterface> for DracNetworkInterface {
    fn from(n: NetworkInterface) -> Self {
        DracNetworkInterface {
            name: to_c_string(&n.name),
            ipv4_address: opt_to_c_string(&n.ipv4_address),
            ipv6_address: opt_to_c_string(&n.ipv6_address),
            mac_address: opt_to_c_string(&n.mac_address),
            is_up: n.is_up,
            is_loopback: n.is_loopback,
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_network_interface(info: *mut DracNetworkInterface) {
    if info.is_null() {
        return;
    }
    let info = &mut *info;
    free_c_string(info.name);
    free_c_string(info.ipv4_address);
    free_c_string(info.ipv6_address);
    free_c_string(info.mac_address);
    info.name = ptr::null_mut();
    info.ipv4_address = ptr::null_mut();
    info.ipv6_address = ptr::null_mut();
    info.mac_address = ptr::null_mut();
}

#[repr(C)]
pub struct DracNetworkInterfaceList {
    pub items: *mut DracNetworkInterface,
    pub len: usize,
}

impl DracNetworkInterfaceList {
    pub(super) fn from_vec(interfaces: Vec<NetworkInterface>) -> Self {
        let mut items: Vec<DracNetworkInterface> = interfaces.into_iter().map(DracNetworkInterface::from).collect();
        items.shrink_to_fit();
        let len = items.len();
        let ptr = items.as_mut_ptr();
        std::mem::forget(items);
        DracNetworkInterfaceList { items: ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_network_interface_list(list: *mut DracNetworkInterfaceList) {
    if list.is_null() {
        return;
    }
    let list = &mut *list;
    if !list.items.is_null() {
        let items = Vec::from_raw_parts(list.items, list.len, list.len);
        for mut item in items {
            drac_free_network_interface(&mut item);
        }
    }
    list.items = ptr::null_mut();
    list.len = 0;
}

/// `0 = Unknown, 1 = Charging, 2 = Discharging, 3 = Full, 4 = NotPresent`.
fn battery_status_code(status: BatteryStatus) -> u8 {
    match status {
        BatteryStatus::Unknown => 0,
        BatteryStatus::Charging => 1,
        BatteryStatus::Discharging => 2,
        BatteryStatus::Full => 3,
        BatteryStatus::NotPresent => 4,
    }
}

#[repr(C)]
pub struct DracBattery {
    pub status: u8,
    pub has_percentage: bool,
    pub percentage: u8,
    pub has_time_remaining: bool,
    pub time_remaining_secs: u64,
}

impl From<Battery> for DracBattery {
    fn from(b: Battery) -> Self {
        DracBattery {
            status: battery_status_code(b.status),
            has_percentage: b.percentage.is_some(),
            percentage: b.percentage.unwrap_or(0),
            has_time_remaining: b.time_remaining.is_some(),
            time_remaining_secs: b.time_remaining.unwrap_or(0),
        }
    }
}

#[repr(C)]
pub struct DracPluginField {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

#[repr(C)]
pub struct DracPluginFieldList {
    pub items: *mut DracPluginField,
    pub len: usize,
}

impl DracPluginFieldList {
    pub(super) fn from_map(fields: std::collections::HashMap<String, String>) -> Self {
        let mut items: Vec<DracPluginField> = fields
            .into_iter()
            .map(|(k, v)| DracPluginField {
                key: to_c_string(&k),
                value: to_c_string(&v),
            })
            .collect();
        items.shrink_to_fit();
        let len = items.len();
        let ptr = items.as_mut_ptr();
        std::mem::forget(items);
        DracPluginFieldList { items: ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_plugin_field_list(list: *mut DracPluginFieldList) {
    if list.is_null() {
        return;
    }
    let list = &mut *list;
    if !list.items.is_null() {
        let items = Vec::from_raw_parts(list.items, list.len, list.len);
        for item in items {
            free_c_string(item.key);
            free_c_string(item.value);
        }
    }
    list.items = ptr::null_mut();
    list.len = 0;
}

#[repr(C)]
pub struct DracPluginInfo {
    pub name: *mut c_char,
    pub version: *mut c_char,
    pub author: *mut c_char,
    pub description: *mut c_char,
    /// `0 = InfoProvider, 1 = OutputFormat`.
    pub plugin_type: u8,
}

impl From<draconis_common::types::PluginMetadata> for DracPluginInfo {
    fn from(m: draconis_common::types::PluginMetadata) -> Self {
        DracPluginInfo {
            name: to_c_string(&m.name),
            version: to_c_string(&m.version),
            author: to_c_string(&m.author),
            description: to_c_string(&m.description),
            plugin_type: match m.plugin_type {
                draconis_common::types::PluginType::InfoProvider => 0,
                draconis_common::types::PluginType::OutputFormat => 1,
            },
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_plugin_info(info: *mut DracPluginInfo) {
    if info.is_null() {
        return;
    }
    let info = &mut *info;
    free_c_string(info.name);
    free_c_string(info.version);
    free_c_string(info.author);
    free_c_string(info.description);
    info.name = ptr::null_mut();
    info.version = ptr::null_mut();
    info.author = ptr::null_mut();
    info.description = ptr::null_mut();
}

#[repr(C)]
pub struct DracPluginInfoList {
    pub items: *mut DracPluginInfo,
    pub len: usize,
}

impl DracPluginInfoList {
    pub(super) fn from_vec(plugins: Vec<draconis_common::types::PluginMetadata>) -> Self {
        let mut items: Vec<DracPluginInfo> = plugins.into_iter().map(DracPluginInfo::from).collect();
        items.shrink_to_fit();
        let len = items.len();
        let ptr = items.as_mut_ptr();
        std::mem::forget(items);
        DracPluginInfoList { items: ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_free_plugin_info_list(list: *mut DracPluginInfoList) {
    if list.is_null() {
        return;
    }
    let list = &mut *list;
    if !list.items.is_null() {
        let items = Vec::from_raw_parts(list.items, list.len, list.len);
        for mut item in items {
            drac_free_plugin_info(&mut item);
        }
    }
    list.items = ptr::null_mut();
    list.len = 0;
}

/// Marker alias documenting intent at call sites — every `DracCacheManager*`
/// / `DracPluginCache*` handle is just an opaque, caller-owned pointer.
pub type OpaqueHandle = c_void;
