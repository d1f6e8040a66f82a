use crate::strategy::Framework;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Facts about how an operation ran, returned next to its data and attached
/// to not-found and timeout failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Diagnostics {
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements_scanned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    /// The scan budget ran out; results are partial but valid.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_native_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bulk_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn started(start: Instant) -> Self {
        Self {
            elapsed_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_elapsed(mut self, start: Instant) -> Self {
        self.elapsed_ms = start.elapsed().as_millis() as u64;
        self
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
