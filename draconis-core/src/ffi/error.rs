//! FFI error-code enumeration (§3, §4.9, §6): `SUCCESS = 255`, every
//! [`ErrorKind`] variant maps to a fixed value in `0..17`. A `Result<T>`
//! never crosses the boundary as a `Result` — every exported function
//! returns one of these codes directly, and the message carried by
//! [`draconis_common::error::Error`] is discarded at the boundary (§7
//! "The FFI surface reduces every error to its kind code").

use draconis_common::error::ErrorKind;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DracErrorCode {
    ApiUnavailable = 0,
    ConfigurationError = 1,
    CorruptedData = 2,
    InternalError = 3,
    InvalidArgument = 4,
    IoError = 5,
    NetworkError = 6,
    NotFound = 7,
    NotSupported = 8,
    Other = 9,
    OutOfMemory = 10,
    ParseError = 11,
    PermissionDenied = 12,
    PermissionRequired = 13,
    PlatformSpecific = 14,
    ResourceExhausted = 15,
    Timeout = 16,
    UnavailableFeature = 17,
    Success = 255,
}

impl From<ErrorKind> for DracErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ApiUnavailable => DracErrorCode::ApiUnavailable,
            ErrorKind::ConfigurationError => DracErrorCode::ConfigurationError,
            ErrorKind::CorruptedData => DracErrorCode::CorruptedData,
            ErrorKind::InternalError => DracErrorCode::InternalError,
            ErrorKind::InvalidArgument => DracErrorCode::InvalidArgument,
            ErrorKind::IoError => DracErrorCode::IoError,
            ErrorKind::NetworkError => DracErrorCode::NetworkError,
            ErrorKind::NotFound => DracErrorCode::NotFound,
            ErrorKind::NotSupported => DracErrorCode::NotSupported,
            ErrorKind::Other => DracErrorCode::Other,
            ErrorKind::OutOfMemory => DracErrorCode::OutOfMemory,
            ErrorKind::ParseError => DracErrorCode::ParseError,
            ErrorKind::PermissionDenied => DracErrorCode::PermissionDenied,
            ErrorKind::PermissionRequired => DracErrorCode::PermissionRequired,
            ErrorKind::PlatformSpecific => DracErrorCode::PlatformSpecific,
            ErrorKind::ResourceExhausted => DracErrorCode::ResourceExhausted,
            ErrorKind::Timeout => DracErrorCode::Timeout,
            ErrorKind::UnavailableFeature => DracErrorCode::UnavailableFeature,
        }
    }
}

/// Run `f`, writing its success value through `out` and returning
/// [`DracErrorCode::Success`], or returning the mapped error code on
/// failure without touching `out`.
pub(super) fn emit<T>(out: *mut T, f: impl FnOnce() -> draconis_common::error::Result<T>) -> DracErrorCode {
    if out.is_null() {
        return DracErrorCode::InvalidArgument;
    }
    match f() {
        Ok(value) => {
            unsafe { out.write(value) };
            DracErrorCode::Success
        }
        Err(err) => err.kind().into(),
    }
}
