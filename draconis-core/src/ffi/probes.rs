//! Probe exports (§4.3, §4.9): one exported function per probe, each
//! taking the cache-manager handle the probe needs (all but
//! `GetDiskUsage`, `GetBatteryInfo`, `GetUptime`, which are never cached)
//! and writing its result through an out-parameter.

use std::ffi::{c_char, CString};

use crate::ffi::error::{emit, DracErrorCode};
use crate::ffi::handles::DracCacheManager;
use crate::ffi::types::{
    DracBattery, DracCpuCores, DracDiskInfo, DracDiskInfoList, DracDisplayInfo, DracDisplayInfoList, DracNetworkInterface,
    DracNetworkInterfaceList, DracOsInfo, DracResourceUsage,
};
use crate::probe;

fn string_out(out: *mut *mut c_char, f: impl FnOnce() -> draconis_common::error::Result<String>) -> DracErrorCode {
    if out.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    match f() {
        Ok(value) => {
            let c_string = CString::new(value).unwrap_or_else(|_| CString::new("").unwrap());
            unsafe { out.write(c_string.into_raw()) };
            DracErrorCode::Success
        }
        Err(err) => err.kind().into(),
    }
}

macro_rules! cached_probe {
    ($name:ident, $probe_fn:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(handle: *mut DracCacheManager, out: *mut *mut c_char) -> DracErrorCode {
            if handle.is_null() {
                return DracErrorCode::InvalidArgument;
            }
            string_out(out, || $probe_fn(&(*handle).0))
        }
    };
}

cached_probe!(drac_get_desktop_environment, probe::desktop_environment);
cached_probe!(drac_get_window_manager, probe::window_manager);
cached_probe!(drac_get_shell, probe::shell);
cached_probe!(drac_get_host, probe::host);
cached_probe!(drac_get_cpu_model, probe::cpu_model);
cached_probe!(drac_get_gpu_model, probe::gpu_model);
cached_probe!(drac_get_kernel_version, probe::kernel_version);

#[no_mangle]
pub unsafe extern "C" fn drac_get_operating_system(handle: *mut DracCacheManager, out: *mut DracOsInfo) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::operating_system(&(*handle).0).map(DracOsInfo::from))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_mem_info(handle: *mut DracCacheManager, out: *mut DracResourceUsage) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || {
        probe::mem_info(&(*handle).0).map(|u| DracResourceUsage {
            used_bytes: u.used_bytes,
            total_bytes: u.total_bytes,
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_cpu_cores(handle: *mut DracCacheManager, out: *mut DracCpuCores) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || {
        probe::cpu_cores(&(*handle).0).map(|c| DracCpuCores {
            physical: c.physical,
            logical: c.logical,
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_disk_usage(out: *mut DracResourceUsage) -> DracErrorCode {
    emit(out, || {
        probe::disk_usage().map(|u| DracResourceUsage {
            used_bytes: u.used_bytes,
            total_bytes: u.total_bytes,
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_disks(handle: *mut DracCacheManager, out: *mut DracDiskInfoList) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::disks(&(*handle).0).map(DracDiskInfoList::from_vec))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_system_disk(handle: *mut DracCacheManager, out: *mut DracDiskInfo) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::system_disk(&(*handle).0).map(DracDiskInfo::from))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_outputs(handle: *mut DracCacheManager, out: *mut DracDisplayInfoList) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::outputs(&(*handle).0).map(DracDisplayInfoList::from_vec))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_primary_output(handle: *mut DracCacheManager, out: *mut DracDisplayInfo) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::primary_output(&(*handle).0).map(DracDisplayInfo::from))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_network_interfaces(handle: *mut DracCacheManager, out: *mut DracNetworkInterfaceList) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::network_interfaces(&(*handle).0).map(DracNetworkInterfaceList::from_vec))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_primary_network_interface(handle: *mut DracCacheManager, out: *mut DracNetworkInterface) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || probe::primary_network_interface(&(*handle).0).map(DracNetworkInterface::from))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_battery_info(out: *mut DracBattery) -> DracErrorCode {
    emit(out, || probe::battery_info().map(DracBattery::from))
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_uptime(out: *mut u64) -> DracErrorCode {
    emit(out, probe::uptime)
}

#[no_mangle]
pub unsafe extern "C" fn drac_get_total_package_count(handle: *mut DracCacheManager, enabled_mask: u32, out: *mut u64) -> DracErrorCode {
    if handle.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    emit(out, || crate::packages::get_total_count(&(*handle).0, crate::packages::Manager::from_bits(enabled_mask)))
}
