//! Element addressing and tree traversal over desktop accessibility trees
//!
//! Every provider call runs on one dedicated UI worker thread. Elements are
//! handed out as snapshots stamped with an opaque id; later calls re-identify
//! the live element from that id before doing anything else.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub mod actions;
pub mod config;
pub mod diagnostics;
pub mod element;
pub mod element_id;
pub mod errors;
pub mod executor;
pub mod failure;
pub mod hint;
pub mod highlight;
pub mod locator;
pub mod platforms;
pub mod query;
pub mod search;
pub mod services;
pub mod strategy;
#[cfg(test)]
mod tests;
pub mod tree_builder;
pub mod types;

pub use actions::{Action, ActionResult, Strategy};
pub use config::EngineConfig;
pub use diagnostics::Diagnostics;
pub use element::{Capability, ControlType, ElementProperties, ElementRecord, ToggleState};
pub use element_id::{ElementId, IdMode, RuntimeId, TreePath};
pub use errors::{AutomationError, ErrorKind};
pub use executor::UiWorker;
pub use highlight::HighlightHandle;
pub use locator::Locator;
pub use platforms::Platform;
pub use query::{NameMatch, Query, RootSelector};
pub use strategy::{FilterMode, Framework};
pub use types::{Point, Rect, WindowHandle};

use element_id::IdCodec;
use search::SearchEnv;
use tree_builder::TreeRequest;

/// Matches of a search.
#[derive(Debug, Serialize)]
pub struct FindResult {
    pub elements: Vec<ElementRecord>,
    pub diagnostics: Diagnostics,
}

/// Snapshot of a subtree.
#[derive(Debug, Serialize)]
pub struct TreeResult {
    pub tree: ElementRecord,
    pub diagnostics: Diagnostics,
}

/// First match of a wait.
#[derive(Debug, Serialize)]
pub struct WaitResult {
    pub element: ElementRecord,
    pub diagnostics: Diagnostics,
}

/// Re-identified element, or `None` when the id no longer resolves.
#[derive(Debug, Serialize)]
pub struct ResolveResult {
    pub element: Option<ElementRecord>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Serialize)]
pub struct ActionReport {
    #[serde(flatten)]
    pub result: ActionResult,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Serialize)]
pub struct HighlightResult {
    pub handle: HighlightHandle,
    pub diagnostics: Diagnostics,
}

/// The main entry point: a provider, its collaborators and the worker that
/// serialises access to them.
#[derive(Debug, Clone)]
pub struct Spyglass {
    worker: UiWorker,
    platform: Platform,
    config: Arc<EngineConfig>,
}

impl Spyglass {
    /// Native platform with configuration from the environment.
    #[instrument]
    pub fn new() -> Result<Self, AutomationError> {
        Self::with_platform(platforms::create_platform()?, EngineConfig::from_env())
    }

    /// Starts the UI worker and initialises the provider on it.
    #[instrument(skip(platform, config), fields(provider = platform.provider.name()))]
    pub fn with_platform(platform: Platform, config: EngineConfig) -> Result<Self, AutomationError> {
        let provider = platform.provider.clone();
        let worker = UiWorker::spawn("spyglass-ui", move || {
            provider.initialize().map_err(AutomationError::from)
        })?;
        Ok(Self {
            worker,
            platform,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn worker(&self) -> &UiWorker {
        &self.worker
    }

    pub fn locator(&self, query: Query) -> Locator {
        Locator::new(self.clone(), query)
    }

    /// Resolves a query into ranked, capped elements.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn find(&self, query: &Query) -> Result<FindResult, AutomationError> {
        self.find_with_cancel(query, CancellationToken::new()).await
    }

    /// Like [`Spyglass::find`], giving up when `token` is cancelled.
    pub async fn find_with_cancel(
        &self,
        query: &Query,
        token: CancellationToken,
    ) -> Result<FindResult, AutomationError> {
        let start = Instant::now();
        let platform = self.platform.clone();
        let config = self.config.clone();
        let owned = query.clone();

        let result = self
            .worker
            .submit_with_cancel(
                move || {
                    let env = SearchEnv {
                        provider: platform.provider.as_ref(),
                        coordinates: platform.coordinates.as_ref(),
                        config: &config,
                    };
                    search::find(&env, &owned)
                },
                token,
            )
            .await;

        match result {
            Ok(outcome) => Ok(FindResult {
                elements: outcome.elements,
                diagnostics: outcome.diagnostics.with_elapsed(start),
            }),
            Err(e) => Err(stamp_elapsed(e, start)),
        }
    }

    /// Snapshot of the subtree under `root`.
    ///
    /// `max_depth` defaults to the detected framework's profile; an empty
    /// `control_types` keeps every node.
    #[instrument(skip(self, root, control_types), fields(root = %root))]
    pub async fn get_tree(
        &self,
        root: RootSelector,
        max_depth: Option<usize>,
        control_types: Vec<ControlType>,
    ) -> Result<TreeResult, AutomationError> {
        let start = Instant::now();
        let platform = self.platform.clone();
        let config = self.config.clone();

        let (tree, mut diagnostics) = self
            .worker
            .submit(move || {
                let provider = platform.provider.as_ref();
                let root_element = search::resolve_root(provider, &root)?;
                let desktop = provider.root()?;
                let root_id = IdCodec::new(provider).generate(&root_element, &desktop, IdMode::Full);

                let profile = strategy::detect(&root_element);
                let request = TreeRequest {
                    max_depth: max_depth.unwrap_or(profile.max_depth),
                    control_types,
                    filter_mode: config.filter_mode.unwrap_or(profile.filter_mode),
                    scan_budget: config.scan_budget,
                    use_bulk_cache: config.bulk_cache && provider.supports_bulk_cache(),
                };
                debug!("building tree under {} with {:?}", root_id, request);
                let outcome = tree_builder::build_tree(&root_element, &root_id, &request)?;

                let mut diagnostics = Diagnostics {
                    elements_scanned: Some(outcome.scanned),
                    framework: Some(profile.framework),
                    truncated: outcome.truncated,
                    used_bulk_cache: Some(outcome.used_bulk_cache),
                    ..Default::default()
                };
                if outcome.truncated {
                    diagnostics.warn(format!(
                        "scan budget of {} elements exhausted; the tree is partial",
                        config.scan_budget
                    ));
                }
                if outcome.errors > 0 {
                    diagnostics.warn(format!("{} elements could not be read and were skipped", outcome.errors));
                }
                Ok((outcome.root.into_record(platform.coordinates.as_ref()), diagnostics))
            })
            .await?;

        diagnostics.elapsed_ms = start.elapsed().as_millis() as u64;
        info!("tree with {} nodes built in {}ms", tree.subtree_len(), diagnostics.elapsed_ms);
        Ok(TreeResult { tree, diagnostics })
    }

    /// Polls `query` until it matches or `timeout` elapses.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn wait_for(
        &self,
        query: &Query,
        timeout: Option<Duration>,
    ) -> Result<WaitResult, AutomationError> {
        self.wait_for_with_cancel(query, timeout, CancellationToken::new())
            .await
    }

    /// Like [`Spyglass::wait_for`], giving up when `token` is cancelled.
    ///
    /// Each poll is one short worker submission; between polls the caller
    /// sleeps with geometric backoff, so the worker stays available.
    pub async fn wait_for_with_cancel(
        &self,
        query: &Query,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<WaitResult, AutomationError> {
        query.validate()?;
        let start = Instant::now();
        let timeout = timeout.unwrap_or_else(|| self.config.default_wait_timeout());
        let deadline = start + timeout;
        let mut intervals = self.config.poll_intervals();
        let mut last = Diagnostics::default();
        let mut polls = 0usize;

        loop {
            polls += 1;
            match self.find_with_cancel(query, token.clone()).await {
                Ok(FindResult {
                    elements,
                    diagnostics,
                }) => {
                    if let Some(element) = elements.into_iter().next() {
                        debug!("'{}' appeared after {} polls", query, polls);
                        return Ok(WaitResult {
                            element,
                            diagnostics: diagnostics.with_elapsed(start),
                        });
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if let Some(diagnostics) = e.diagnostics() {
                        last = diagnostics.clone();
                    }
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let pause = intervals
                .next()
                .unwrap_or(Duration::from_millis(self.config.wait_poll_max_ms))
                .min(deadline - now);
            tokio::select! {
                _ = token.cancelled() => {
                    return Err(AutomationError::Cancelled(format!("wait for '{query}' cancelled")));
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        last.hint = hint::synthesize(ErrorKind::Timeout, Some(query), &last);
        let last = last.with_elapsed(start);
        warn!("'{}' did not appear within {:?} ({} polls)", query, timeout, polls);
        Err(AutomationError::timeout(
            format!("'{query}' did not appear within {}ms", timeout.as_millis()),
            Some(last),
        ))
    }

    /// Re-identifies an element from its id. Never fails for unresolvable
    /// ids; those yield `element: None`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, id: &str) -> Result<ResolveResult, AutomationError> {
        let start = Instant::now();
        let platform = self.platform.clone();
        let id = id.to_string();

        let element = self
            .worker
            .submit(move || {
                let provider = platform.provider.as_ref();
                let parsed: ElementId = match id.parse() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!("resolve: {}", e);
                        return Ok(None);
                    }
                };
                let codec = IdCodec::new(provider);
                let Some(live) = codec.resolve(&parsed) else {
                    return Ok(None);
                };
                let properties = match live.properties() {
                    Ok(properties) => properties,
                    Err(e) => {
                        debug!("resolve {}: element unreadable: {}", parsed, e);
                        return Ok(None);
                    }
                };
                let mode = if parsed.path == TreePath::Fast {
                    IdMode::Fast
                } else {
                    IdMode::Full
                };
                let desktop = provider.root()?;
                let desktop_handle = desktop
                    .properties()
                    .map(|p| p.native_window_handle)
                    .unwrap_or_default();
                let fresh = codec.generate_with(&live, &properties, &desktop, desktop_handle, mode);
                Ok(Some(element::convert(&properties, &fresh, platform.coordinates.as_ref())))
            })
            .await?;

        Ok(ResolveResult {
            element,
            diagnostics: Diagnostics::started(start),
        })
    }

    #[instrument(skip(self))]
    pub async fn click(&self, id: &str) -> Result<ActionReport, AutomationError> {
        self.act(id, ActionKind::Click).await
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn type_text(&self, id: &str, text: &str) -> Result<ActionReport, AutomationError> {
        self.act(id, ActionKind::TypeText(text.to_string())).await
    }

    #[instrument(skip(self))]
    pub async fn toggle(&self, id: &str) -> Result<ActionReport, AutomationError> {
        self.act(id, ActionKind::Toggle).await
    }

    async fn act(&self, id: &str, kind: ActionKind) -> Result<ActionReport, AutomationError> {
        let start = Instant::now();
        let platform = self.platform.clone();
        let id = id.to_string();

        let result = self
            .worker
            .submit(move || {
                let (live, properties, parsed) = resolve_live(&platform, &id)?;
                let window = if properties.native_window_handle.is_none() {
                    parsed.window
                } else {
                    properties.native_window_handle
                };
                let target = actions::ActionTarget {
                    element: &live,
                    properties: &properties,
                    window,
                };
                let services = actions::ActionServices {
                    activator: platform.activator.as_ref(),
                    input: platform.input.as_ref(),
                };
                let action = match &kind {
                    ActionKind::Click => Action::Click,
                    ActionKind::TypeText(text) => Action::TypeText(text),
                    ActionKind::Toggle => Action::Toggle,
                };
                actions::perform(action, &target, &services)
            })
            .await?;

        Ok(ActionReport {
            result,
            diagnostics: Diagnostics::started(start),
        })
    }

    /// Draws a frame around the element. The frame stays until the returned
    /// handle is hidden or dropped, or `duration` elapses.
    #[instrument(skip(self))]
    pub async fn highlight(
        &self,
        id: &str,
        duration: Option<Duration>,
    ) -> Result<HighlightResult, AutomationError> {
        let start = Instant::now();
        let platform = self.platform.clone();
        let owned = id.to_string();

        let bounds = self
            .worker
            .submit(move || {
                let (_, properties, _) = resolve_live(&platform, &owned)?;
                properties.bounds.filter(|b| !b.is_empty()).ok_or_else(|| {
                    AutomationError::UnsupportedOperation(format!("element {owned} has no on-screen bounds"))
                })
            })
            .await?;

        let duration = duration.or_else(|| {
            Some(self.config.highlight_duration_ms)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        });
        let handle = highlight::highlight(bounds, self.platform.overlay.as_ref(), duration)?;
        Ok(HighlightResult {
            handle,
            diagnostics: Diagnostics::started(start),
        })
    }

    /// Removes a frame shown by [`Spyglass::highlight`].
    pub fn hide(&self, handle: HighlightHandle) -> Diagnostics {
        let start = Instant::now();
        highlight::hide(handle);
        Diagnostics::started(start)
    }
}

enum ActionKind {
    Click,
    TypeText(String),
    Toggle,
}

/// Resolves an id to its live element and fresh properties, on the worker.
fn resolve_live(
    platform: &Platform,
    id: &str,
) -> Result<(platforms::RawElement, ElementProperties, ElementId), AutomationError> {
    let parsed: ElementId = id.parse()?;
    let live = IdCodec::new(platform.provider.as_ref())
        .resolve(&parsed)
        .ok_or_else(|| AutomationError::Stale(format!("element {id} no longer exists; run find again")))?;
    let properties = live.properties()?;
    Ok((live, properties, parsed))
}

/// Fills in elapsed time on the diagnostics a failure carries.
fn stamp_elapsed(error: AutomationError, start: Instant) -> AutomationError {
    match error {
        AutomationError::ElementNotFound {
            message,
            diagnostics,
        } => AutomationError::ElementNotFound {
            message,
            diagnostics: diagnostics.map(|d| Box::new((*d).with_elapsed(start))),
        },
        other => other,
    }
}
