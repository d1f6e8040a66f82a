//! Classification of accessibility provider failures
//!
//! Every provider call returns [`ProviderError`] on failure. The error carries
//! a [`FailureKind`] which the rest of the crate uses to decide between
//! retrying with a different strategy, downgrading to "not found", or
//! surfacing the failure verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// UI Automation specific HRESULTs
pub const UIA_E_ELEMENTNOTENABLED: u32 = 0x8004_0200;
pub const UIA_E_ELEMENTNOTAVAILABLE: u32 = 0x8004_0201;
pub const UIA_E_NOCLICKABLEPOINT: u32 = 0x8004_0202;
pub const UIA_E_PROXYASSEMBLYNOTLOADED: u32 = 0x8004_0203;
pub const UIA_E_NOTSUPPORTED: u32 = 0x8004_0204;
pub const UIA_E_INVALIDOPERATION: u32 = 0x8013_1509;
pub const UIA_E_TIMEOUT: u32 = 0x8013_1505;

// Generic COM / Win32 HRESULTs seen from cross-process providers
pub const E_NOTIMPL: u32 = 0x8000_4001;
pub const E_NOINTERFACE: u32 = 0x8000_4002;
pub const E_FAIL: u32 = 0x8000_4005;
pub const E_ACCESSDENIED: u32 = 0x8007_0005;
pub const E_ELEVATION_REQUIRED: u32 = 0x8007_02E4;
pub const E_INVALID_WINDOW_HANDLE: u32 = 0x8007_0578;
pub const RPC_E_SERVER_DIED: u32 = 0x8001_0007;
pub const RPC_E_DISCONNECTED: u32 = 0x8001_0108;
pub const RPC_E_CALL_REJECTED: u32 = 0x8001_0001;
pub const CO_E_OBJNOTCONNECTED: u32 = 0x8004_01FD;

/// Small taxonomy every provider failure is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The element is no longer backed by a live object.
    Stale,
    /// The target process runs elevated or otherwise refuses access.
    AccessDenied,
    /// The element does not implement the requested pattern or operation.
    Unsupported,
    /// Anything else. May succeed on a later attempt or with another strategy.
    Transient,
}

impl FailureKind {
    /// Whether another attempt (possibly through a different strategy) is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::Unsupported)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Stale => "stale",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Transient => "transient",
        };
        f.write_str(s)
    }
}

/// Maps a native status code to a [`FailureKind`].
pub fn classify(code: i32) -> FailureKind {
    match code as u32 {
        UIA_E_ELEMENTNOTAVAILABLE
        | RPC_E_DISCONNECTED
        | RPC_E_SERVER_DIED
        | CO_E_OBJNOTCONNECTED
        | E_INVALID_WINDOW_HANDLE => FailureKind::Stale,
        E_ACCESSDENIED | E_ELEVATION_REQUIRED => FailureKind::AccessDenied,
        UIA_E_NOTSUPPORTED
        | UIA_E_INVALIDOPERATION
        | UIA_E_ELEMENTNOTENABLED
        | UIA_E_NOCLICKABLEPOINT
        | E_NOTIMPL
        | E_NOINTERFACE => FailureKind::Unsupported,
        _ => FailureKind::Transient,
    }
}

/// Error returned by every provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}{}: {message}", self.code_suffix())]
pub struct ProviderError {
    pub kind: FailureKind,
    pub code: Option<i32>,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Builds an error from a native status code, classifying it.
    pub fn from_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: classify(code),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Stale, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AccessDenied, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn is_stale(&self) -> bool {
        self.kind == FailureKind::Stale
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// ` (0xXXXXXXXX)` when a native code is known, empty otherwise.
    fn code_suffix(&self) -> String {
        self.code
            .map(|code| format!(" (0x{:08X})", code as u32))
            .unwrap_or_default()
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify(UIA_E_ELEMENTNOTAVAILABLE as i32), FailureKind::Stale);
        assert_eq!(classify(RPC_E_DISCONNECTED as i32), FailureKind::Stale);
        assert_eq!(classify(E_INVALID_WINDOW_HANDLE as i32), FailureKind::Stale);
        assert_eq!(classify(E_ACCESSDENIED as i32), FailureKind::AccessDenied);
        assert_eq!(classify(E_ELEVATION_REQUIRED as i32), FailureKind::AccessDenied);
        assert_eq!(classify(UIA_E_NOTSUPPORTED as i32), FailureKind::Unsupported);
        assert_eq!(classify(E_NOINTERFACE as i32), FailureKind::Unsupported);
        assert_eq!(classify(E_FAIL as i32), FailureKind::Transient);
        assert_eq!(classify(UIA_E_TIMEOUT as i32), FailureKind::Transient);
    }

    #[test]
    fn test_unknown_code_is_transient() {
        assert_eq!(classify(0x1234), FailureKind::Transient);
    }

    #[test]
    fn test_retryability() {
        assert!(FailureKind::Transient.is_retryable());
        assert!(FailureKind::Unsupported.is_retryable());
        assert!(!FailureKind::Stale.is_retryable());
        assert!(!FailureKind::AccessDenied.is_retryable());
    }

    #[test]
    fn test_display_includes_code() {
        let err = ProviderError::from_code(E_ACCESSDENIED as i32, "OpenProcess");
        assert_eq!(err.kind, FailureKind::AccessDenied);
        assert_eq!(err.to_string(), "access_denied (0x80070005): OpenProcess");
    }

    #[test]
    fn test_display_without_code() {
        let err = ProviderError::stale("window closed");
        assert_eq!(err.code, None);
        assert_eq!(err.to_string(), "stale: window closed");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
