//! Recovery suggestions attached to failed lookups

use crate::diagnostics::Diagnostics;
use crate::errors::ErrorKind;
use crate::query::{NameMatch, Query};
use crate::strategy::Framework;

/// Scanned-element count above which a Chromium search is considered broad.
const BROAD_CHROMIUM_SCAN: usize = 500;

/// Picks the single most useful suggestion for a failure, from its category,
/// what the walk observed and the shape of the query.
pub fn synthesize(kind: ErrorKind, query: Option<&Query>, diagnostics: &Diagnostics) -> Option<String> {
    match kind {
        ErrorKind::Stale => {
            return Some(
                "The element or its scope no longer exists. Run find again to get a fresh id."
                    .to_string(),
            )
        }
        ErrorKind::AccessDenied => {
            return Some(
                "The target window belongs to an elevated process. Run with matching privileges."
                    .to_string(),
            )
        }
        ErrorKind::NotFound | ErrorKind::Timeout => {}
        _ => return None,
    }

    let scanned = diagnostics.elements_scanned.unwrap_or(0);

    if diagnostics.truncated {
        return Some(format!(
            "The scan budget ran out after {scanned} elements. Narrow the root with 'within:' or 'window:', or raise the scan budget."
        ));
    }

    if let Some(query) = query {
        if let Some(depth) = query.exact_depth {
            return Some(format!(
                "Only depth {depth} was searched. Drop 'depth:{depth}' to search every level."
            ));
        }
        if let Some(NameMatch::Exact(name)) = &query.name {
            return Some(format!(
                "No element is named exactly '{name}'. Try 'contains:{name}' since visible names often carry extra text."
            ));
        }
        if diagnostics.framework == Some(Framework::Chromium)
            && scanned > BROAD_CHROMIUM_SCAN
            && query.within.is_none()
        {
            return Some(
                "Chromium content is nested deeply. Scope the search with 'within:<id>' of a nearby container."
                    .to_string(),
            );
        }
        if query.max_depth.is_some() {
            return Some("The search stopped at 'maxdepth'. Raise or drop it.".to_string());
        }
    }

    if scanned == 0 {
        return Some(
            "Nothing was scanned. Check that the window or scope element still exists.".to_string(),
        );
    }

    if kind == ErrorKind::Timeout {
        Some("The element did not appear in time. Check the selector or raise the timeout.".to_string())
    } else {
        Some(format!(
            "{scanned} elements were scanned without a match. Inspect the window with get_tree to check names and roles."
        ))
    }
}
