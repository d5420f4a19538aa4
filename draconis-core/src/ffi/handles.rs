//! Opaque handle lifecycle (§4.9, §9 "Opaque handles crossing a C ABI").
//!
//! `DracCacheManager` and `DracPluginCache` are never exposed as internal
//! references — each is a `Box::into_raw`'d Rust value behind an opaque
//! pointer, created and destroyed only through the functions here. A
//! null handle where one is required is `INVALID_ARGUMENT`, never a
//! dereference.

use std::ffi::{c_char, CStr};
use std::ptr;

use crate::cache::CacheManager;
use crate::ffi::error::DracErrorCode;
use crate::plugin::PluginCache;

/// Opaque cache-manager handle. Construct with
/// [`drac_cache_manager_create`], destroy with
/// [`drac_cache_manager_destroy`].
pub struct DracCacheManager(pub(crate) CacheManager);

#[no_mangle]
pub extern "C" fn drac_cache_manager_create() -> *mut DracCacheManager {
    match CacheManager::new() {
        Ok(manager) => Box::into_raw(Box::new(DracCacheManager(manager))),
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_cache_manager_destroy(handle: *mut DracCacheManager) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_cache_invalidate(handle: *mut DracCacheManager, key: *const c_char) -> DracErrorCode {
    if handle.is_null() || key.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    let Ok(key) = CStr::from_ptr(key).to_str() else {
        return DracErrorCode::InvalidArgument;
    };
    match (*handle).0.invalidate(key) {
        Ok(()) => DracErrorCode::Success,
        Err(err) => err.kind().into(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_cache_invalidate_all(handle: *mut DracCacheManager, log_removals: bool, out_count: *mut usize) -> DracErrorCode {
    if handle.is_null() || out_count.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    match (*handle).0.invalidate_all(log_removals) {
        Ok(count) => {
            out_count.write(count);
            DracErrorCode::Success
        }
        Err(err) => err.kind().into(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_cache_set_global_bypass(ignore: bool) {
    crate::cache::set_global_bypass(ignore);
}

/// Opaque per-plugin cache handle (§4.6). Construct with
/// [`drac_plugin_cache_create`], destroy with
/// [`drac_plugin_cache_destroy`].
pub struct DracPluginCache(pub(crate) PluginCache);

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_cache_create(dir: *const c_char) -> *mut DracPluginCache {
    if dir.is_null() {
        return ptr::null_mut();
    }
    let Ok(dir) = CStr::from_ptr(dir).to_str() else {
        return ptr::null_mut();
    };
    match PluginCache::new(dir) {
        Ok(cache) => Box::into_raw(Box::new(DracPluginCache(cache))),
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn drac_plugin_cache_destroy(handle: *mut DracPluginCache) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
