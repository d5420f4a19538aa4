//! Cache manager, platform probes, package counting, and plugin host for
//! draconis-rs.
//!
//! This crate is the "does the actual work" half of the workspace: it owns
//! every probe that reaches out to the operating system, the two-tier cache
//! those probes are built on, the package-count aggregation service, the
//! dynamic-plugin host, and the stable C ABI that exposes all of it to
//! non-Rust consumers.
//!
//! `draconis-common` supplies the vocabulary ([`draconis_common::Result`],
//! the §3 data types); this crate supplies the behaviour.

pub mod cache;
pub mod ffi;
pub mod logging;
pub mod packages;
pub mod plugin;
pub mod probe;

pub use cache::{CacheManager, CACHE_NAMESPACE};
pub use draconis_common::{error, types, Error, ErrorKind, Result};
