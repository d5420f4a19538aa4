//! Error taxonomy for draconis-rs.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Errors carry
//! a stable [`ErrorKind`], a free-form message, and the source location of
//! the call site that raised them — mirroring the reference implementation's
//! `DracError` (kind + message + `std::source_location`).
//!
//! Errors never cross the FFI boundary directly (see `draconis_core::ffi`):
//! they are reduced to their [`ErrorKind`] discriminant on export, and the
//! message is discarded at that boundary.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Result type alias used throughout draconis-rs.
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed error-kind enumeration (§3).
///
/// Stable across releases — callers (including FFI consumers) may match on
/// this enum without it growing new, unannounced variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiUnavailable,
    ConfigurationError,
    CorruptedData,
    InternalError,
    InvalidArgument,
    IoError,
    NetworkError,
    NotFound,
    NotSupported,
    Other,
    OutOfMemory,
    ParseError,
    PermissionDenied,
    PermissionRequired,
    PlatformSpecific,
    ResourceExhausted,
    Timeout,
    UnavailableFeature,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ApiUnavailable => "api_unavailable",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::CorruptedData => "corrupted_data",
            ErrorKind::InternalError => "internal_error",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::IoError => "io_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::Other => "other",
            ErrorKind::OutOfMemory => "out_of_memory",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::PermissionRequired => "permission_required",
            ErrorKind::PlatformSpecific => "platform_specific",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UnavailableFeature => "unavailable_feature",
        };
        f.write_str(s)
    }
}

/// `(file, line)` of the call site that raised an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        SourceLocation {
            file: loc.file().to_string(),
            line: loc.line(),
        }
    }
}

/// Structured error carrying an [`ErrorKind`], a message, and the call site.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message} ({location})")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl Error {
    /// Construct an error, capturing the caller's location automatically.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            location: SourceLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether higher layers (package aggregation, plugin manager) should
    /// treat this as a non-fatal, informational condition (§7).
    pub fn is_informational(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NotFound | ErrorKind::ApiUnavailable | ErrorKind::NotSupported
        )
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::IoError,
        };
        Error::new(kind, err.to_string())
    }
}

/// Construct an [`Error`] and wrap it in `Err` — mirrors the reference's
/// `ERR(errc, msg)` macro.
#[macro_export]
macro_rules! err {
    ($kind:expr, $msg:expr) => {
        return Err($crate::error::Error::new($kind, $msg))
    };
}

/// Construct a formatted [`Error`] and wrap it in `Err` — mirrors `ERR_FMT`.
#[macro_export]
macro_rules! err_fmt {
    ($kind:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::new($kind, format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_kind_and_location() {
        let err = Error::new(ErrorKind::NotFound, "battery missing");
        let text = err.to_string();
        assert!(text.contains("not_found"));
        assert!(text.contains("battery missing"));
        assert!(text.contains("error.rs"));
    }

    #[test]
    fn io_error_not_found_maps_to_not_found_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn informational_kinds() {
        assert!(Error::new(ErrorKind::NotFound, "x").is_informational());
        assert!(Error::new(ErrorKind::ApiUnavailable, "x").is_informational());
        assert!(Error::new(ErrorKind::NotSupported, "x").is_informational());
        assert!(!Error::new(ErrorKind::InternalError, "x").is_informational());
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::PermissionDenied.to_string(), "permission_denied");
        assert_eq!(ErrorKind::OutOfMemory.to_string(), "out_of_memory");
    }
}
