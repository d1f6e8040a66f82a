use crate::diagnostics::Diagnostics;
use crate::failure::{FailureKind, ProviderError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {message}")]
    ElementNotFound {
        message: String,
        diagnostics: Option<Box<Diagnostics>>,
    },

    #[error("Element is stale: {0}")]
    Stale(String),

    #[error("Access denied (target may be elevated): {0}")]
    AccessDenied(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation timed out: {message}")]
    Timeout {
        message: String,
        diagnostics: Option<Box<Diagnostics>>,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Serializable error taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Stale,
    AccessDenied,
    Unsupported,
    InvalidParameter,
    Timeout,
    Cancelled,
    Internal,
}

impl AutomationError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AutomationError::ElementNotFound {
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn not_found_with(message: impl Into<String>, diagnostics: Diagnostics) -> Self {
        AutomationError::ElementNotFound {
            message: message.into(),
            diagnostics: Some(Box::new(diagnostics)),
        }
    }

    pub fn timeout(message: impl Into<String>, diagnostics: Option<Diagnostics>) -> Self {
        AutomationError::Timeout {
            message: message.into(),
            diagnostics: diagnostics.map(Box::new),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::ElementNotFound { .. } => ErrorKind::NotFound,
            AutomationError::Stale(_) => ErrorKind::Stale,
            AutomationError::AccessDenied(_) => ErrorKind::AccessDenied,
            AutomationError::UnsupportedOperation(_) | AutomationError::UnsupportedPlatform(_) => {
                ErrorKind::Unsupported
            }
            AutomationError::InvalidArgument(_) => ErrorKind::InvalidParameter,
            AutomationError::Timeout { .. } => ErrorKind::Timeout,
            AutomationError::Cancelled(_) => ErrorKind::Cancelled,
            AutomationError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Diagnostics attached to not-found and timeout failures.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            AutomationError::ElementNotFound { diagnostics, .. }
            | AutomationError::Timeout { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }

    /// Recovery hint synthesized when the failure was produced.
    pub fn hint(&self) -> Option<&str> {
        self.diagnostics().and_then(|d| d.hint.as_deref())
    }
}

impl From<ProviderError> for AutomationError {
    fn from(error: ProviderError) -> Self {
        match error.kind {
            FailureKind::Stale => AutomationError::Stale(error.to_string()),
            FailureKind::AccessDenied => AutomationError::AccessDenied(error.to_string()),
            FailureKind::Unsupported => AutomationError::UnsupportedOperation(error.to_string()),
            FailureKind::Transient => AutomationError::Internal(error.to_string()),
        }
    }
}
