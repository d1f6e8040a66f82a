use crate::element_id::IdMode;
use crate::strategy::FilterMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Tunables of the engine. Every field has a default; `from_env` overlays
/// `SPYGLASS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum elements visited by one walk before it is truncated.
    pub scan_budget: usize,
    /// Result cap when a query sets neither a limit nor a match index.
    pub max_results: usize,
    pub wait_poll_initial_ms: u64,
    pub wait_poll_max_ms: u64,
    pub wait_poll_growth: u32,
    pub default_wait_timeout_ms: u64,
    /// Compiled size limit for name regexes, in bytes.
    pub regex_size_limit: usize,
    pub bulk_cache: bool,
    /// Overrides the filter mode picked from the detected framework.
    pub filter_mode: Option<FilterMode>,
    /// Id flavour minted for search results.
    pub id_mode: IdMode,
    pub highlight_duration_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_budget: 5000,
            max_results: 20,
            wait_poll_initial_ms: 50,
            wait_poll_max_ms: 1000,
            wait_poll_growth: 2,
            default_wait_timeout_ms: 5000,
            regex_size_limit: 1 << 20,
            bulk_cache: true,
            filter_mode: None,
            id_mode: IdMode::Full,
            highlight_duration_ms: 2000,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `SPYGLASS_*` environment variables. Unparseable
    /// values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key/value source.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse::<T>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("ignoring {}={:?}: not a valid value", key, raw);
                    None
                }
            }
        }

        if let Some(v) = parsed("SPYGLASS_SCAN_BUDGET", lookup("SPYGLASS_SCAN_BUDGET")) {
            self.scan_budget = v;
        }
        if let Some(v) = parsed("SPYGLASS_MAX_RESULTS", lookup("SPYGLASS_MAX_RESULTS")) {
            self.max_results = v;
        }
        if let Some(v) = parsed("SPYGLASS_WAIT_POLL_MS", lookup("SPYGLASS_WAIT_POLL_MS")) {
            self.wait_poll_initial_ms = v;
        }
        if let Some(v) = parsed("SPYGLASS_WAIT_POLL_MAX_MS", lookup("SPYGLASS_WAIT_POLL_MAX_MS")) {
            self.wait_poll_max_ms = v;
        }
        if let Some(v) = parsed("SPYGLASS_WAIT_TIMEOUT_MS", lookup("SPYGLASS_WAIT_TIMEOUT_MS")) {
            self.default_wait_timeout_ms = v;
        }
        if let Some(v) = parsed("SPYGLASS_BULK_CACHE", lookup("SPYGLASS_BULK_CACHE")) {
            self.bulk_cache = v;
        }
        if let Some(raw) = lookup("SPYGLASS_FILTER_MODE") {
            match raw.parse::<FilterMode>() {
                Ok(mode) => self.filter_mode = Some(mode),
                Err(e) => warn!("ignoring SPYGLASS_FILTER_MODE: {}", e),
            }
        }
        if let Some(raw) = lookup("SPYGLASS_ID_MODE") {
            match raw.trim().to_lowercase().as_str() {
                "full" => self.id_mode = IdMode::Full,
                "fast" => self.id_mode = IdMode::Fast,
                other => warn!("ignoring SPYGLASS_ID_MODE={:?}", other),
            }
        }
        self
    }

    /// Sleep intervals for wait polling: geometric growth up to the ceiling.
    pub fn poll_intervals(&self) -> impl Iterator<Item = Duration> {
        let ceiling = self.wait_poll_max_ms.max(1);
        let growth = u64::from(self.wait_poll_growth.max(1));
        let mut next = self.wait_poll_initial_ms.clamp(1, ceiling);
        std::iter::from_fn(move || {
            let current = next;
            next = next.saturating_mul(growth).min(ceiling);
            Some(Duration::from_millis(current))
        })
    }

    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scan_budget, 5000);
        assert_eq!(config.max_results, 20);
        assert!(config.bulk_cache);
        assert!(config.filter_mode.is_none());
    }

    #[test]
    fn test_overlay_parses_and_ignores_garbage() {
        let env: HashMap<&str, &str> = [
            ("SPYGLASS_SCAN_BUDGET", "100"),
            ("SPYGLASS_MAX_RESULTS", "many"),
            ("SPYGLASS_BULK_CACHE", "false"),
            ("SPYGLASS_FILTER_MODE", "inline"),
            ("SPYGLASS_ID_MODE", "fast"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default().overlay(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.scan_budget, 100);
        assert_eq!(config.max_results, 20);
        assert!(!config.bulk_cache);
        assert_eq!(config.filter_mode, Some(FilterMode::Inline));
        assert_eq!(config.id_mode, IdMode::Fast);
    }

    #[test]
    fn test_poll_intervals_grow_geometrically_to_ceiling() {
        let config = EngineConfig::default();
        let intervals: Vec<u64> = config
            .poll_intervals()
            .take(8)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(intervals, vec![50, 100, 200, 400, 800, 1000, 1000, 1000]);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"scanBudget": 42, "filterMode": "post_hoc"}"#).unwrap();
        assert_eq!(config.scan_budget, 42);
        assert_eq!(config.filter_mode, Some(FilterMode::PostHoc));
        assert_eq!(config.max_results, 20);
    }
}
