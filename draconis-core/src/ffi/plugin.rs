//! Plugin-manager exports (§4.7, §4.9). The manager itself is the
//! process-wide singleton ([`PluginManager::instance`]) — these functions
//! don't take a manager handle, only the per-call arguments it needs.

use std::ffi::{c_char, CStr};

use crate::ffi::error::DracErrorCode;
use crate::ffi::handles::DracPluginCache;
use crate::ffi::types::DracPluginInfoList;
use crate::plugin::manager::PluginManagerConfig;
use crate::plugin::PluginManager;

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// `auto_load` is a C array of `auto_load_len` NUL-terminated strings,
/// naming plugins to load immediately (§4.7 "initialize").
#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_initialize(
    auto_load: *const *const c_char,
    auto_load_len: usize,
    cache: *mut DracPluginCache,
) -> DracErrorCode {
    if cache.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    let mut config = PluginManagerConfig::default();
    if !auto_load.is_null() {
        for i in 0..auto_load_len {
            if let Some(name) = str_arg(*auto_load.add(i)) {
                config.auto_load.push(name.to_string());
            }
        }
    }
    PluginManager::instance().initialize(&config, &(*cache).0);
    DracErrorCode::Success
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_scan() {
    PluginManager::instance().scan_for_plugins();
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_load(name: *const c_char, cache: *mut DracPluginCache) -> DracErrorCode {
    if cache.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    let Some(name) = str_arg(name) else {
        return DracErrorCode::InvalidArgument;
    };
    match PluginManager::instance().load_plugin(name, &(*cache).0) {
        Ok(()) => DracErrorCode::Success,
        Err(err) => err.kind().into(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_unload(name: *const c_char) -> DracErrorCode {
    let Some(name) = str_arg(name) else {
        return DracErrorCode::InvalidArgument;
    };
    match PluginManager::instance().unload_plugin(name) {
        Ok(()) => DracErrorCode::Success,
        Err(err) => err.kind().into(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_is_loaded(name: *const c_char) -> bool {
    match str_arg(name) {
        Some(name) => PluginManager::instance().is_plugin_loaded(name),
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_list_loaded(out: *mut DracPluginInfoList) -> DracErrorCode {
    if out.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    let metadata = PluginManager::instance().list_loaded_plugins().into_iter().map(|p| p.metadata).collect();
    out.write(DracPluginInfoList::from_vec(metadata));
    DracErrorCode::Success
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_manager_list_discovered(out: *mut DracPluginInfoList) -> DracErrorCode {
    if out.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    let metadata = PluginManager::instance().list_discovered_plugins();
    out.write(DracPluginInfoList::from_vec(metadata));
    DracErrorCode::Success
}
