//! Plugin capability contracts (§4.5).
//!
//! Every plugin implements [`Lifecycle`] plus exactly one of the two
//! capability sets, [`InfoProvider`] or [`OutputFormat`]. The two are
//! independent of each other — a plugin is one or the other, never both —
//! which is why [`PluginInstance`] is a two-armed enum rather than a single
//! trait object with optional methods.
//!
//! A dynamic plugin crosses the C ABI as a thin pointer to a boxed
//! [`PluginInstance`] (`Box<PluginInstance>` on the heap, handed across as
//! `Box::into_raw(Box::new(instance)) as *mut c_void`). The host never
//! reconstructs that `Box` itself — ownership, and therefore the
//! allocator that must free it, stays with the plugin's shared library,
//! which is why `DestroyPlugin` is a function exported by the plugin
//! rather than something the host does by dropping a `Box` it didn't
//! allocate (§9 "RAII library handles").

use std::collections::HashMap;

use draconis_common::error::Result;
use draconis_common::types::{PluginContext, PluginMetadata};

use crate::plugin::plugin_cache::PluginCache;

/// Operations common to every plugin regardless of capability.
pub trait Lifecycle: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Must be idempotent per instance — a second call with the same
    /// context is a no-op that still returns `Ok(())`.
    fn initialize(&mut self, context: &PluginContext, cache: &PluginCache) -> Result<()>;

    /// Called before the instance is destroyed.
    fn shutdown(&mut self);

    /// True iff initialization succeeded and the plugin is willing to
    /// serve calls.
    fn is_ready(&self) -> bool;
}

/// A value-producing plugin: collects data and renders it for display.
pub trait InfoProvider: Lifecycle {
    /// Stable short id (e.g. `"weather"`) used for static/dynamic dedup
    /// and by [`crate::plugin::manager::PluginManager::with_info_provider`].
    fn provider_id(&self) -> &str;

    /// Refresh the backing data.
    fn collect_data(&mut self, cache: &PluginCache) -> Result<()>;

    fn to_json(&self) -> Result<String>;

    /// Key/value view for compact formatting; keys are conventionally
    /// namespaced with the provider id (`"weather.temp_c"`).
    fn fields(&self) -> HashMap<String, String>;

    fn display_value(&self) -> Result<String>;
    fn display_icon(&self) -> String;
    fn display_label(&self) -> String;

    /// Last collection error, if any — separate from `collect_data`'s
    /// `Result`; only consulted by diagnostics (§7).
    fn last_error(&self) -> Option<String>;

    /// From the plugin's own configuration.
    fn is_enabled(&self) -> bool;
}

/// A rendering plugin: turns core + plugin data into an output document.
pub trait OutputFormat: Lifecycle {
    fn format_output(&self, format_name: &str, core_data: &str, plugin_data: &str) -> Result<String>;
    fn format_names(&self) -> Vec<String>;
    fn file_extension(&self, format_name: &str) -> Option<String>;
}

/// The two capability sets a loaded plugin can present. One instance is
/// exactly one of these — never both — so the manager's typed caches
/// (§4.3 "append the instance pointer to the typed cache matching its
/// metadata's plugin type") are simply `Vec<String>` name lists keyed off
/// this discriminant, with the instance itself owned here.
pub enum PluginInstance {
    InfoProvider(Box<dyn InfoProvider>),
    OutputFormat(Box<dyn OutputFormat>),
}

impl PluginInstance {
    pub fn metadata(&self) -> &PluginMetadata {
        match self {
            PluginInstance::InfoProvider(p) => p.metadata(),
            PluginInstance::OutputFormat(p) => p.metadata(),
        }
    }

    pub fn initialize(&mut self, context: &PluginContext, cache: &PluginCache) -> Result<()> {
        match self {
            PluginInstance::InfoProvider(p) => p.initialize(context, cache),
            PluginInstance::OutputFormat(p) => p.initialize(context, cache),
        }
    }

    pub fn shutdown(&mut self) {
        match self {
            PluginInstance::InfoProvider(p) => p.shutdown(),
            PluginInstance::OutputFormat(p) => p.shutdown(),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            PluginInstance::InfoProvider(p) => p.is_ready(),
            PluginInstance::OutputFormat(p) => p.is_ready(),
        }
    }

    /// `Some(id)` for info providers, used for static/dynamic dedup
    /// (§4.7 step 2); output-format plugins have no provider id.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            PluginInstance::InfoProvider(p) => Some(p.provider_id()),
            PluginInstance::OutputFormat(_) => None,
        }
    }
}

/// Signature a dynamic plugin's `CreatePlugin` export and a static
/// plugin's registry factory both share.
pub type CreatePluginFn = fn() -> PluginInstance;

/// Signature a dynamic plugin's `DestroyPlugin` export and a static
/// plugin's registry destructor both share. Takes the instance back by
/// value so the plugin's own allocator runs the drop.
pub type DestroyPluginFn = fn(PluginInstance);

/// C ABI surface a dynamic plugin library exports. `create`/`destroy` are
/// required; `set_log_level` is optional — resolved only if present, and
/// called with a pointer into the host's log-level slot (§4.7 step 3).
pub mod abi {
    use std::ffi::c_void;
    use std::sync::atomic::AtomicU8;

    pub const CREATE_PLUGIN_SYMBOL: &[u8] = b"CreatePlugin";
    pub const DESTROY_PLUGIN_SYMBOL: &[u8] = b"DestroyPlugin";
    pub const SET_LOG_LEVEL_SYMBOL: &[u8] = b"SetPluginLogLevel";

    pub type CreatePluginAbi = unsafe extern "C" fn() -> *mut c_void;
    pub type DestroyPluginAbi = unsafe extern "C" fn(*mut c_void);
    pub type SetPluginLogLevelAbi = unsafe extern "C" fn(*const AtomicU8);
}
