//! Durable, opaque element identifiers
//!
//! An [`ElementId`] lets a caller come back to an element in a later call even
//! though the provider object it was minted from is long gone. The text form is
//! `<window-handle>:<runtime-id>:<tree-path>`:
//!
//! - `window-handle`: native handle of the element that anchors the path
//! - `runtime-id`: dot-joined provider runtime id, or `0` when unavailable
//! - `tree-path`: dot-joined sibling indices from the anchor (empty for the
//!   anchor itself), or one of the sentinels `fast`, `stale`, `error`
//!
//! The anchor is the element itself when it owns a native handle, otherwise
//! its nearest ancestor that owns one, otherwise the designated root.

use crate::element::ElementProperties;
use crate::failure::{ProviderError, ProviderResult};
use crate::platforms::{AccessibilityProvider, NativeCondition, RawElement};
use crate::types::WindowHandle;
use crate::AutomationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Upper bound on ancestor hops while computing a tree path.
const MAX_ANCESTOR_DEPTH: usize = 256;

/// Provider-assigned integer sequence identifying a live element.
///
/// Never empty and never the single value `0`, which the text form reserves
/// for "no runtime id".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct RuntimeId(Vec<i32>);

impl RuntimeId {
    /// `None` for the values that cannot be told apart from a missing id.
    pub fn new(values: Vec<i32>) -> Option<RuntimeId> {
        match values.as_slice() {
            [] | [0] => None,
            _ => Some(RuntimeId(values)),
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

impl TryFrom<Vec<i32>> for RuntimeId {
    type Error = String;

    fn try_from(values: Vec<i32>) -> Result<Self, Self::Error> {
        RuntimeId::new(values).ok_or_else(|| "runtime id must not be empty or 0".to_string())
    }
}

impl From<RuntimeId> for Vec<i32> {
    fn from(rid: RuntimeId) -> Self {
        rid.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Location of an element relative to its anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreePath {
    Indices(Vec<usize>),
    /// Minted on hot listing paths; only the runtime id is usable.
    Fast,
    /// The element went away while its id was being computed.
    Stale,
    /// Some other failure prevented computing the path.
    Error,
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreePath::Indices(indices) => {
                let parts: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
                f.write_str(&parts.join("."))
            }
            TreePath::Fast => f.write_str("fast"),
            TreePath::Stale => f.write_str("stale"),
            TreePath::Error => f.write_str("error"),
        }
    }
}

impl TreePath {
    fn for_failure(error: &ProviderError) -> TreePath {
        if error.is_stale() {
            TreePath::Stale
        } else {
            TreePath::Error
        }
    }
}

/// How much work to spend minting an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    /// Records the tree path by walking ancestors.
    #[default]
    Full,
    /// Skips the path. Falls back to `Full` when the element has no runtime id.
    Fast,
}

/// Opaque, immutable element identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId {
    pub window: WindowHandle,
    pub runtime_id: Option<RuntimeId>,
    pub path: TreePath,
}

impl ElementId {
    pub fn new(window: WindowHandle, runtime_id: Option<RuntimeId>, path: TreePath) -> Self {
        Self {
            window,
            runtime_id,
            path,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.runtime_id {
            Some(rid) => write!(f, "{}:{}:{}", self.window, rid, self.path),
            None => write!(f, "{}:0:{}", self.window, self.path),
        }
    }
}

impl FromStr for ElementId {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AutomationError::InvalidArgument(format!("malformed element id '{s}'"));

        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 3 {
            return Err(malformed());
        }

        let window = fields[0].parse::<i64>().map_err(|_| malformed())?;

        let runtime_id = match fields[1] {
            "0" => None,
            "" => return Err(malformed()),
            rid => {
                let values = rid
                    .split('.')
                    .map(|v| v.parse::<i32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| malformed())?;
                Some(RuntimeId::new(values).ok_or_else(malformed)?)
            }
        };

        let path = match fields[2] {
            "fast" => TreePath::Fast,
            "stale" => TreePath::Stale,
            "error" => TreePath::Error,
            "" => TreePath::Indices(Vec::new()),
            path => TreePath::Indices(
                path.split('.')
                    .map(|v| v.parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| malformed())?,
            ),
        };

        Ok(ElementId::new(WindowHandle(window), runtime_id, path))
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Mints ids during a walk from the walk root's id plus sibling indices, so
/// no ancestor walks are needed per node.
#[derive(Debug, Clone)]
pub struct IdScope {
    handle: WindowHandle,
    /// `None` when the anchor's own path could not be computed; such scopes
    /// can only mint runtime-id based ids.
    path: Option<Vec<usize>>,
}

impl IdScope {
    /// Scope anchored at an already minted id.
    pub fn from_id(id: &ElementId) -> IdScope {
        let path = match &id.path {
            TreePath::Indices(indices) => Some(indices.clone()),
            _ => None,
        };
        IdScope {
            handle: id.window,
            path,
        }
    }

    /// Id for the element at this scope position, and the scope its children continue from.
    pub fn mint(&self, properties: &ElementProperties) -> (ElementId, IdScope) {
        let rid = properties.runtime_id.clone();
        let own = properties.native_window_handle;

        match &self.path {
            Some(_) if !own.is_none() => {
                let scope = IdScope {
                    handle: own,
                    path: Some(Vec::new()),
                };
                (
                    ElementId::new(own, rid, TreePath::Indices(Vec::new())),
                    scope,
                )
            }
            Some(path) => (
                ElementId::new(self.handle, rid, TreePath::Indices(path.clone())),
                self.clone(),
            ),
            None => {
                let handle = if own.is_none() { self.handle } else { own };
                let path = if rid.is_some() {
                    TreePath::Fast
                } else {
                    TreePath::Error
                };
                (ElementId::new(handle, rid, path), self.clone())
            }
        }
    }

    /// Scope of the child at `index`.
    pub fn child(&self, index: usize) -> IdScope {
        IdScope {
            handle: self.handle,
            path: self.path.as_ref().map(|p| {
                let mut next = p.clone();
                next.push(index);
                next
            }),
        }
    }
}

/// Mints and resolves element ids against a provider.
///
/// Must be used from the UI worker thread, like any other provider access.
pub struct IdCodec<'a> {
    provider: &'a dyn AccessibilityProvider,
}

impl<'a> IdCodec<'a> {
    pub fn new(provider: &'a dyn AccessibilityProvider) -> Self {
        Self { provider }
    }

    /// Mints an id for `element`, with `root` as the designated root.
    ///
    /// Never fails: a failure while reading produces a sentinel path.
    pub fn generate(&self, element: &RawElement, root: &RawElement, mode: IdMode) -> ElementId {
        let root_handle = root
            .properties()
            .map(|p| p.native_window_handle)
            .unwrap_or_default();
        match element.properties() {
            Ok(properties) => self.generate_with(element, &properties, root, root_handle, mode),
            Err(e) => {
                debug!("id generation: element unreadable: {}", e);
                ElementId::new(root_handle, None, TreePath::for_failure(&e))
            }
        }
    }

    /// Same as [`IdCodec::generate`] when the property bundle is already at hand.
    pub fn generate_with(
        &self,
        element: &RawElement,
        properties: &ElementProperties,
        root: &RawElement,
        root_handle: WindowHandle,
        mode: IdMode,
    ) -> ElementId {
        let rid = properties.runtime_id.clone();
        let own = properties.native_window_handle;

        if mode == IdMode::Fast && rid.is_some() {
            let handle = if own.is_none() { root_handle } else { own };
            return ElementId::new(handle, rid, TreePath::Fast);
        }
        if !own.is_none() {
            return ElementId::new(own, rid, TreePath::Indices(Vec::new()));
        }

        match path_to_anchor(element, root, root_handle) {
            Ok((anchor, indices)) => ElementId::new(anchor, rid, TreePath::Indices(indices)),
            Err(e) => {
                debug!("id generation: ancestor walk failed: {}", e);
                ElementId::new(root_handle, rid, TreePath::for_failure(&e))
            }
        }
    }

    /// Parses and resolves an id string; malformed ids resolve to `None`.
    pub fn resolve_str(&self, id: &str) -> Option<RawElement> {
        match id.parse::<ElementId>() {
            Ok(parsed) => self.resolve(&parsed),
            Err(e) => {
                debug!("resolve: {}", e);
                None
            }
        }
    }

    /// Re-identifies the element an id was minted for.
    ///
    /// A runtime id match is taken as authoritative, even though the provider
    /// gives no guarantee that a destroyed element's runtime id is never reused.
    pub fn resolve(&self, id: &ElementId) -> Option<RawElement> {
        let scope = match self.provider.element_from_handle(id.window) {
            Ok(scope) => scope,
            Err(e) => {
                debug!("resolve {}: window unavailable: {}", id, e);
                return None;
            }
        };

        if let Some(rid) = &id.runtime_id {
            return match find_by_runtime_id(&scope, rid) {
                Ok(found) => found,
                Err(e) => {
                    debug!("resolve {}: runtime id search failed: {}", id, e);
                    None
                }
            };
        }

        match &id.path {
            TreePath::Indices(indices) => match descend(&scope, indices) {
                Ok(found) => found,
                Err(e) => {
                    debug!("resolve {}: path descent failed: {}", id, e);
                    None
                }
            },
            _ => None,
        }
    }
}

fn find_by_runtime_id(scope: &RawElement, rid: &RuntimeId) -> ProviderResult<Option<RawElement>> {
    if scope.properties()?.runtime_id.as_ref() == Some(rid) {
        return Ok(Some(scope.clone()));
    }
    let found = scope.find_all(&NativeCondition::RuntimeId(rid.clone()))?;
    Ok(found.into_iter().next().map(|c| c.element))
}

fn descend(scope: &RawElement, indices: &[usize]) -> ProviderResult<Option<RawElement>> {
    let mut current = scope.clone();
    for &index in indices {
        let children = current.children()?;
        match children.get(index) {
            Some(child) => current = child.clone(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Walks from `element` up to its anchor, recording sibling indices.
fn path_to_anchor(
    element: &RawElement,
    root: &RawElement,
    root_handle: WindowHandle,
) -> ProviderResult<(WindowHandle, Vec<usize>)> {
    let mut indices = Vec::new();
    let mut current = element.clone();

    for _ in 0..MAX_ANCESTOR_DEPTH {
        if current.same_as(root.as_ref()) {
            indices.reverse();
            return Ok((root_handle, indices));
        }
        let parent = current
            .parent()?
            .ok_or_else(|| ProviderError::transient("element is not below the designated root"))?;
        let siblings = parent.children()?;
        let index = siblings
            .iter()
            .position(|s| s.same_as(current.as_ref()))
            .ok_or_else(|| ProviderError::stale("element is no longer among its parent's children"))?;
        indices.push(index);

        let parent_handle = parent.properties()?.native_window_handle;
        if !parent_handle.is_none() {
            indices.reverse();
            return Ok((parent_handle, indices));
        }
        current = parent;
    }

    Err(ProviderError::transient("ancestor chain exceeds the supported depth"))
}
