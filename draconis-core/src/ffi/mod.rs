//! Stable FFI surface (§4.9, §6): a plain-C-ABI export of the cache
//! manager, the probe set, and the plugin manager, for consumers outside
//! Rust (JNI/Lua/Python bindings, demo CLIs — themselves out of scope,
//! §1).
//!
//! Conventions used throughout this module:
//! - Every exported function returns a [`error::DracErrorCode`]; a
//!   `Result` never crosses the boundary directly.
//! - A null handle where one is required is always `InvalidArgument`,
//!   never a dereference.
//! - Strings are handed back through `*mut *mut c_char` out-parameters
//!   and must be freed with [`types::drac_free_string`]; structs and list
//!   structs with string fields carry their own `Free*`/`Free*List`
//!   routine that also frees the inner strings and nulls the pointers.
//! - Handles (`DracCacheManager*`, `DracPluginCache*`) are opaque and are
//!   created/destroyed only through the functions in [`handles`].

pub mod error;
pub mod handles;
pub mod plugin;
pub mod probes;
pub mod types;

pub use error::DracErrorCode;
pub use handles::{DracCacheManager, DracPluginCache};
