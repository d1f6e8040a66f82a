//! Query resolution: native filtered search or a manual depth-first walk,
//! followed by region filtering, ordering and selection.

use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::element::{convert, ElementProperties, ElementRecord};
use crate::element_id::{ElementId, IdCodec};
use crate::errors::ErrorKind;
use crate::hint;
use crate::platforms::{AccessibilityProvider, NativeCondition, RawElement};
use crate::query::{NameMatch, Query, RootSelector};
use crate::services::CoordinateService;
use crate::strategy;
use crate::tree_builder::{LiveNode, WalkContext, WalkNode};
use crate::types::Rect;
use crate::AutomationError;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

/// Everything a search needs besides the query.
pub struct SearchEnv<'a> {
    pub provider: &'a dyn AccessibilityProvider,
    pub coordinates: &'a dyn CoordinateService,
    pub config: &'a EngineConfig,
}

/// Converted matches plus how they were found.
#[derive(Debug)]
pub struct SearchOutcome {
    pub elements: Vec<ElementRecord>,
    pub diagnostics: Diagnostics,
}

struct Candidate {
    element: RawElement,
    properties: ElementProperties,
}

/// Per-node predicate for manual walks.
struct Matcher {
    native: NativeCondition,
    name: Option<NamePredicate>,
    query: Query,
}

enum NamePredicate {
    Contains(String),
    Regex(Regex),
}

impl Matcher {
    fn new(query: &Query, config: &EngineConfig) -> Result<Self, AutomationError> {
        let name = match &query.name {
            Some(NameMatch::Contains(fragment)) => Some(NamePredicate::Contains(fragment.to_lowercase())),
            Some(NameMatch::Regex(pattern)) => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .size_limit(config.regex_size_limit)
                    .build()
                    .map_err(|e| {
                        AutomationError::InvalidArgument(format!("invalid name regex '{pattern}': {e}"))
                    })?;
                Some(NamePredicate::Regex(regex))
            }
            _ => None,
        };
        Ok(Self {
            native: query.native_condition(),
            name,
            query: query.clone(),
        })
    }

    fn matches(&self, properties: &ElementProperties) -> bool {
        if !self.native.matches(properties) || !self.query.matches_class(properties) {
            return false;
        }
        let name_ok = match &self.name {
            Some(NamePredicate::Contains(fragment)) => properties.name.to_lowercase().contains(fragment),
            Some(NamePredicate::Regex(regex)) => regex.is_match(&properties.name),
            None => true,
        };
        name_ok && self.query.region.map_or(true, |region| in_region(properties, &region))
    }
}

fn in_region(properties: &ElementProperties, region: &Rect) -> bool {
    properties.bounds.map_or(false, |b| b.intersects(region))
}

/// Resolves a root selector to a live element.
pub fn resolve_root(
    provider: &dyn AccessibilityProvider,
    selector: &RootSelector,
) -> Result<RawElement, AutomationError> {
    match selector {
        RootSelector::Desktop => Ok(provider.root()?),
        RootSelector::Window(handle) => provider.element_from_handle(*handle).map_err(|e| {
            if e.is_stale() {
                AutomationError::not_found(format!("no window with handle {handle}"))
            } else {
                e.into()
            }
        }),
        RootSelector::Element(id) => {
            let parsed: ElementId = id.parse()?;
            IdCodec::new(provider)
                .resolve(&parsed)
                .ok_or_else(|| AutomationError::Stale(format!("scope element {id} is no longer available")))
        }
    }
}

/// Runs one search. Must be called on the UI worker.
pub fn find(env: &SearchEnv<'_>, query: &Query) -> Result<SearchOutcome, AutomationError> {
    query.validate()?;
    let matcher = Matcher::new(query, env.config)?;

    let mut diagnostics = Diagnostics::default();
    let scope = match resolve_root(env.provider, &query.root_selector()) {
        Ok(scope) => scope,
        Err(e) => {
            let kind = e.kind();
            return Err(match kind {
                ErrorKind::Stale | ErrorKind::NotFound => {
                    diagnostics.elements_scanned = Some(0);
                    diagnostics.hint = hint::synthesize(ErrorKind::Stale, Some(query), &diagnostics);
                    AutomationError::not_found_with(e.to_string(), diagnostics)
                }
                _ => e,
            });
        }
    };

    let strategy = strategy::detect(&scope);
    diagnostics.framework = Some(strategy.framework);

    let (candidates, scanned, truncated, native) = collect(env, &scope, query, &matcher, strategy.max_depth)?;
    diagnostics.elements_scanned = Some(scanned);
    diagnostics.truncated = truncated;
    diagnostics.used_native_search = Some(native);
    if truncated {
        diagnostics.warn(format!(
            "scan budget of {} elements exhausted; results may be incomplete",
            env.config.scan_budget
        ));
    }

    let mut candidates = candidates;
    if let Some(region) = &query.region {
        candidates.retain(|c| in_region(&c.properties, region));
    }
    order(env, query, &mut candidates, &mut diagnostics);

    let total = candidates.len();
    let selected: Vec<Candidate> = match query.match_index {
        Some(n) => candidates.into_iter().nth(n - 1).into_iter().collect(),
        None => candidates
            .into_iter()
            .take(query.limit.unwrap_or(env.config.max_results))
            .collect(),
    };

    if selected.is_empty() {
        diagnostics.hint = hint::synthesize(ErrorKind::NotFound, Some(query), &diagnostics);
        let message = match query.match_index {
            Some(n) if total > 0 => format!("'{query}' has {total} matches; match {n} does not exist"),
            _ => format!("no element matches '{query}'"),
        };
        debug!("{} (scanned {})", message, scanned);
        return Err(AutomationError::not_found_with(message, diagnostics));
    }

    let codec = IdCodec::new(env.provider);
    let desktop = env.provider.root()?;
    let desktop_handle = desktop
        .properties()
        .map(|p| p.native_window_handle)
        .unwrap_or_default();
    let elements = selected
        .iter()
        .map(|c| {
            let id = codec.generate_with(&c.element, &c.properties, &desktop, desktop_handle, env.config.id_mode);
            convert(&c.properties, &id, env.coordinates)
        })
        .collect::<Vec<_>>();

    info!(
        "'{}' matched {} element(s), returning {}",
        query,
        total,
        elements.len()
    );
    Ok(SearchOutcome {
        elements,
        diagnostics,
    })
}

/// Gathers every match below `scope`: (candidates, scanned, truncated, used native search).
fn collect(
    env: &SearchEnv<'_>,
    scope: &RawElement,
    query: &Query,
    matcher: &Matcher,
    profile_depth: usize,
) -> Result<(Vec<Candidate>, usize, bool, bool), AutomationError> {
    if query.is_simple() {
        match scope.find_all(&matcher.native) {
            Ok(found) => {
                let scanned = found.len();
                let candidates = found
                    .into_iter()
                    .map(|c| Candidate {
                        element: c.element,
                        properties: c.properties,
                    })
                    .collect();
                return Ok((candidates, scanned, false, true));
            }
            Err(e) if e.is_stale() => return Err(e.into()),
            Err(e) => debug!("native search failed, walking manually: {}", e),
        }
    }

    let limit = query
        .exact_depth
        .unwrap_or_else(|| query.max_depth.unwrap_or(profile_depth));
    // Without reordering, matches past the requested one are never needed.
    let stop_after = if query.near.is_some() || query.prominent {
        None
    } else {
        query.match_index.or(query.limit)
    };
    let walk = ManualWalk {
        matcher,
        exact_depth: query.exact_depth,
        limit,
        stop_after,
    };
    let mut ctx = WalkContext::new(env.config.scan_budget);
    let mut out = Vec::new();

    if env.config.bulk_cache && env.provider.supports_bulk_cache() {
        match scope.cache_subtree(limit) {
            Ok(cached) => {
                walk.descend(&cached, 0, &mut ctx, &mut out);
                return Ok((out, ctx.scanned, ctx.truncated, false));
            }
            Err(e) if e.is_stale() => return Err(e.into()),
            Err(e) => debug!("bulk cache unavailable for search, walking live: {}", e),
        }
    }
    walk.descend(LiveNode(scope.clone()), 0, &mut ctx, &mut out);
    Ok((out, ctx.scanned, ctx.truncated, false))
}

struct ManualWalk<'m> {
    matcher: &'m Matcher,
    exact_depth: Option<usize>,
    limit: usize,
    stop_after: Option<usize>,
}

impl ManualWalk<'_> {
    fn done(&self, ctx: &WalkContext, out: &[Candidate]) -> bool {
        ctx.stopped() || self.stop_after.map_or(false, |n| out.len() >= n)
    }

    /// Visits the descendants of `node`, which sits at `depth`.
    fn descend<N: WalkNode>(&self, node: N, depth: usize, ctx: &mut WalkContext, out: &mut Vec<Candidate>) {
        if depth >= self.limit {
            return;
        }
        let children = match node.children() {
            Ok(children) => children,
            Err(e) => {
                ctx.record_error("children unavailable during search", &e);
                return;
            }
        };
        let child_depth = depth + 1;
        for child in children {
            if self.done(ctx, out) || !ctx.visit() {
                return;
            }
            ctx.reached(child_depth);

            let evaluate = self.exact_depth.map_or(true, |d| d == child_depth);
            if evaluate {
                match child.properties() {
                    Ok(properties) => {
                        if self.matcher.matches(&properties) {
                            out.push(Candidate {
                                element: child.element(),
                                properties,
                            });
                        }
                    }
                    Err(e) => {
                        ctx.record_error("skipping unreadable element", &e);
                        continue;
                    }
                }
            }
            if self.exact_depth.map_or(true, |d| child_depth < d) {
                self.descend(child, child_depth, ctx, out);
            }
        }
    }
}

/// Orders candidates by distance to the near reference, or by area.
fn order(env: &SearchEnv<'_>, query: &Query, candidates: &mut [Candidate], diagnostics: &mut Diagnostics) {
    if let Some(reference) = &query.near {
        let center = IdCodec::new(env.provider)
            .resolve_str(reference)
            .and_then(|e| e.properties().ok())
            .and_then(|p| p.bounds)
            .map(|b| b.center());
        match center {
            Some(center) => {
                candidates.sort_by_key(|c| {
                    c.properties
                        .bounds
                        .map(|b| b.center().distance_squared(&center))
                        .unwrap_or(i64::MAX)
                });
                return;
            }
            None => diagnostics.warn(format!(
                "near reference {reference} could not be resolved; results are not ordered by distance"
            )),
        }
    }
    if query.prominent {
        candidates.sort_by_key(|c| std::cmp::Reverse(c.properties.area()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ControlType;
    use crate::platforms::memory::{ElementSpec, MemoryDesktop};
    use crate::services::MonitorLayout;
    use crate::strategy::Framework;

    fn form() -> MemoryDesktop {
        let desktop = MemoryDesktop::new();
        desktop.add_window(
            ElementSpec::window("Form").bounds(0, 0, 800, 600).children([
                ElementSpec::new(ControlType::Button, "Save")
                    .automation_id("btnSave")
                    .bounds(10, 10, 20, 20),
                ElementSpec::new(ControlType::Button, "Save As")
                    .bounds(500, 500, 20, 20),
                ElementSpec::new(ControlType::Pane, "Panel")
                    .bounds(100, 100, 300, 300)
                    .class_name("Panel")
                    .child(ElementSpec::new(ControlType::Edit, "Username").bounds(110, 110, 200, 30)),
            ]),
        );
        desktop
    }

    fn run(desktop: &MemoryDesktop, query: Query) -> Result<SearchOutcome, AutomationError> {
        let provider = desktop.provider();
        let layout = MonitorLayout::default();
        let config = EngineConfig::default();
        let env = SearchEnv {
            provider: &provider,
            coordinates: &layout,
            config: &config,
        };
        find(&env, &query)
    }

    fn names(outcome: &SearchOutcome) -> Vec<&str> {
        outcome.elements.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_simple_query_uses_native_search() {
        let desktop = form();
        let outcome = run(&desktop, Query::new().name("save")).unwrap();
        assert_eq!(names(&outcome), vec!["Save"]);
        assert_eq!(outcome.diagnostics.used_native_search, Some(true));
    }

    #[test]
    fn test_contains_walks_manually() {
        let desktop = form();
        let outcome = run(&desktop, Query::new().name_contains("SAVE")).unwrap();
        assert_eq!(names(&outcome), vec!["Save", "Save As"]);
        assert_eq!(outcome.diagnostics.used_native_search, Some(false));
    }

    #[test]
    fn test_regex_and_invalid_regex() {
        let desktop = form();
        let outcome = run(&desktop, Query::new().name_regex("^user")).unwrap();
        assert_eq!(names(&outcome), vec!["Username"]);

        let err = run(&desktop, Query::new().name_regex("(unclosed")).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
    }

    #[test]
    fn test_region_keeps_only_intersecting() {
        let desktop = form();
        let query = Query::new()
            .control_type(ControlType::Button)
            .region(Rect::new(0, 0, 100, 100));
        let outcome = run(&desktop, query).unwrap();
        assert_eq!(names(&outcome), vec!["Save"]);
    }

    #[test]
    fn test_prominent_and_match_index() {
        let desktop = form();
        let outcome = run(&desktop, Query::new().name_contains("a").prominent()).unwrap();
        assert_eq!(names(&outcome)[0], "Panel");

        let outcome = run(&desktop, Query::new().control_type(ControlType::Button).nth(2)).unwrap();
        assert_eq!(names(&outcome), vec!["Save As"]);
    }

    #[test]
    fn test_not_found_carries_diagnostics_and_hint() {
        let desktop = form();
        let err = run(&desktop, Query::new().name("Cancel")).unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.framework, Some(Framework::Unknown));
        assert!(err.hint().unwrap().contains("contains:Cancel"));

        let err = run(&desktop, Query::new().control_type(ControlType::Button).nth(5)).unwrap_err();
        assert!(err.to_string().contains("2 matches"));
    }

    #[test]
    fn test_class_name_and_scope() {
        let desktop = form();
        let panel = run(&desktop, Query::new().class_name("panel")).unwrap();
        assert_eq!(names(&panel), vec!["Panel"]);

        let inside = run(&desktop, Query::new().within(panel.elements[0].id.clone())).unwrap();
        assert_eq!(names(&inside), vec!["Username"]);
    }

    #[test]
    fn test_stale_scope_is_not_found_with_hint() {
        let desktop = form();
        let query = Query::new().within("4096:42.999:0");
        let err = run(&desktop, query).unwrap_err();
        assert!(matches!(err, AutomationError::ElementNotFound { .. }));
        assert!(err.hint().unwrap().contains("find again"));
    }
}
