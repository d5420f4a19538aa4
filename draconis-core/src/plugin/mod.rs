//! Plugin subsystem (§4.5-§4.8): capability contracts, a per-plugin
//! scoped cache, a static-registry fast path for precompiled builds, and
//! a dynamic-library host built on [`libloading`].

pub mod interfaces;
pub mod manager;
pub mod plugin_cache;
pub mod registry;

pub use interfaces::{InfoProvider, Lifecycle, OutputFormat, PluginInstance};
pub use manager::{PluginManager, PluginManagerConfig};
pub use plugin_cache::PluginCache;
