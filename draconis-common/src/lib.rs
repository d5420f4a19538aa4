//! Shared result/error taxonomy and data model for draconis-rs.
//!
//! This crate has no I/O and no platform-specific code — it defines the
//! vocabulary that `draconis-core`'s cache, probe, package and plugin
//! subsystems all speak: the [`error::Error`]/[`error::Result`] pair and the
//! data types returned by probes and carried across the plugin boundary.

pub mod error;
pub mod format;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{
    Battery, BatteryStatus, CacheEntry, CacheLocation, CachePolicy, CPUCores, DiskInfo,
    DisplayInfo, LoadedPlugin, NetworkInterface, OSInfo, PluginContext, PluginDependencies,
    PluginMetadata, PluginType, Resolution, ResourceUsage,
};
