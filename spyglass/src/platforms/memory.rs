//! In-memory accessibility provider
//!
//! Simulates a desktop of windows and nested elements behind the same trait
//! seam the native providers implement. Windows can be closed, elements can
//! be inserted or removed, and failures can be injected per element, which
//! makes every engine path reproducible without a live desktop. Each provider
//! call is recorded with the thread it ran on so callers can check that
//! access was serialised.

use crate::element::{Capability, ControlType, ElementProperties, ToggleState};
use crate::element_id::RuntimeId;
use crate::failure::{FailureKind, ProviderError, ProviderResult};
use crate::platforms::{AccessibilityProvider, CachedElement, NativeCondition, ProviderElement, RawElement};
use crate::types::{Rect, WindowHandle};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;
use tracing::trace;

const ROOT_KEY: u64 = 0;
const FIRST_WINDOW_HANDLE: i64 = 0x1000;
/// Only the most recent calls are kept; the total is still counted.
const MAX_RECORDED_CALLS: usize = 4096;

/// Declarative description of one simulated element and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSpec {
    pub name: String,
    pub automation_id: String,
    pub control_type: ControlType,
    pub class_name: String,
    pub framework_id: String,
    pub bounds: Option<Rect>,
    pub is_enabled: bool,
    pub is_offscreen: bool,
    /// Native handle; top-level windows get one assigned when absent.
    pub handle: Option<i64>,
    pub capabilities: Vec<Capability>,
    pub value: Option<String>,
    pub toggle_state: Option<ToggleState>,
    /// Simulates providers that expose no runtime id for this element.
    pub without_runtime_id: bool,
    pub children: Vec<ElementSpec>,
}

impl Default for ElementSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            automation_id: String::new(),
            control_type: ControlType::Unknown,
            class_name: String::new(),
            framework_id: String::new(),
            bounds: None,
            is_enabled: true,
            is_offscreen: false,
            handle: None,
            capabilities: Vec::new(),
            value: None,
            toggle_state: None,
            without_runtime_id: false,
            children: Vec::new(),
        }
    }
}

impl ElementSpec {
    pub fn new(control_type: ControlType, name: &str) -> Self {
        Self {
            control_type,
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn window(name: &str) -> Self {
        Self::new(ControlType::Window, name)
    }

    pub fn automation_id(mut self, id: &str) -> Self {
        self.automation_id = id.to_string();
        self
    }

    pub fn class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn framework(mut self, framework_id: &str) -> Self {
        self.framework_id = framework_id.to_string();
        self
    }

    pub fn bounds(mut self, x: i32, y: i32, width: i32, height: i32) -> Self {
        self.bounds = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn handle(mut self, handle: i64) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn toggle_state(mut self, state: ToggleState) -> Self {
        self.toggle_state = Some(state);
        self
    }

    pub fn without_runtime_id(mut self) -> Self {
        self.without_runtime_id = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = ElementSpec>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A whole simulated desktop, as loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesktopSpec {
    pub windows: Vec<ElementSpec>,
    /// Absolute monitor rectangles, primary first.
    pub monitors: Vec<Rect>,
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub operation: &'static str,
    pub thread: ThreadId,
}

/// One pattern action performed against a simulated element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformedAction {
    pub runtime_id: Option<RuntimeId>,
    pub action: String,
}

#[derive(Debug)]
struct Node {
    properties: ElementProperties,
    parent: Option<u64>,
    children: Vec<u64>,
    alive: bool,
    failure: Option<FailureKind>,
}

#[derive(Debug, Default)]
struct DesktopState {
    nodes: HashMap<u64, Node>,
    next_key: u64,
    next_handle: i64,
    bulk_cache: bool,
    calls: VecDeque<ProviderCall>,
    total_calls: usize,
    actions: Vec<PerformedAction>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<DesktopState>,
    in_flight: AtomicUsize,
    overlaps: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

/// Handle on a simulated desktop. Clones share the same desktop.
#[derive(Debug, Clone)]
pub struct MemoryDesktop {
    shared: Arc<Shared>,
}

impl Default for MemoryDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDesktop {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_KEY,
            Node {
                properties: ElementProperties {
                    name: "Desktop".to_string(),
                    control_type: ControlType::Pane,
                    class_name: "#32769".to_string(),
                    is_enabled: true,
                    runtime_id: RuntimeId::new(vec![42, 0]),
                    ..Default::default()
                },
                parent: None,
                children: Vec::new(),
                alive: true,
                failure: None,
            },
        );
        let state = DesktopState {
            nodes,
            next_key: ROOT_KEY + 1,
            next_handle: FIRST_WINDOW_HANDLE,
            bulk_cache: true,
            ..Default::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                ..Default::default()
            }),
        }
    }

    /// Builds a desktop from a [`DesktopSpec`].
    pub fn from_spec(spec: &DesktopSpec) -> Self {
        let desktop = Self::new();
        for window in &spec.windows {
            desktop.add_window(window.clone());
        }
        desktop
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let spec: DesktopSpec = serde_json::from_str(json)?;
        Ok(Self::from_spec(&spec))
    }

    /// Provider view of this desktop.
    pub fn provider(&self) -> MemoryProvider {
        MemoryProvider {
            shared: Arc::clone(&self.shared),
        }
    }

    fn state(&self) -> MutexGuard<'_, DesktopState> {
        lock(&self.shared)
    }

    /// Adds a top-level window and returns its native handle.
    pub fn add_window(&self, mut spec: ElementSpec) -> WindowHandle {
        let mut state = self.state();
        let handle = match spec.handle {
            Some(h) => h,
            None => {
                let h = state.next_handle;
                state.next_handle += 0x10;
                h
            }
        };
        spec.handle = Some(handle);
        let key = state.insert(&spec, ROOT_KEY);
        if let Some(root) = state.nodes.get_mut(&ROOT_KEY) {
            root.children.push(key);
        }
        WindowHandle(handle)
    }

    /// Closes a window: every element in it becomes stale.
    pub fn close_window(&self, handle: WindowHandle) -> bool {
        let mut state = self.state();
        let key = match state.key_for_handle(handle) {
            Some(key) => key,
            None => return false,
        };
        state.detach(key);
        state.kill(key);
        true
    }

    /// Inserts a subtree below the element with `parent` runtime id.
    pub fn insert_child(&self, parent: &RuntimeId, index: usize, spec: ElementSpec) -> Option<RuntimeId> {
        let mut state = self.state();
        let parent_key = state.key_for_runtime_id(parent)?;
        let key = state.insert(&spec, parent_key);
        let node = state.nodes.get_mut(&parent_key)?;
        let index = index.min(node.children.len());
        node.children.insert(index, key);
        state.nodes.get(&key).and_then(|n| n.properties.runtime_id.clone())
    }

    /// Removes an element and its subtree; they become stale.
    pub fn remove_element(&self, runtime_id: &RuntimeId) -> bool {
        let mut state = self.state();
        match state.key_for_runtime_id(runtime_id) {
            Some(key) if key != ROOT_KEY => {
                state.detach(key);
                state.kill(key);
                true
            }
            _ => false,
        }
    }

    /// Runtime id of the first live element (pre-order) with this name.
    pub fn runtime_id_of(&self, name: &str) -> Option<RuntimeId> {
        let state = self.state();
        state
            .preorder(ROOT_KEY)
            .into_iter()
            .filter_map(|key| state.nodes.get(&key))
            .find(|node| node.properties.name == name)
            .and_then(|node| node.properties.runtime_id.clone())
    }

    /// Current properties of a live element.
    pub fn properties_of(&self, runtime_id: &RuntimeId) -> Option<ElementProperties> {
        let state = self.state();
        let key = state.key_for_runtime_id(runtime_id)?;
        state.nodes.get(&key).map(|n| n.properties.clone())
    }

    /// Makes every provider call on this element fail with `kind`.
    pub fn inject_failure(&self, runtime_id: &RuntimeId, kind: Option<FailureKind>) -> bool {
        let mut state = self.state();
        match state.key_for_runtime_id(runtime_id) {
            Some(key) => {
                if let Some(node) = state.nodes.get_mut(&key) {
                    node.failure = kind;
                }
                true
            }
            None => false,
        }
    }

    pub fn set_bulk_cache(&self, enabled: bool) {
        self.state().bulk_cache = enabled;
    }

    /// Artificial duration of each provider call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.shared.latency.lock() {
            *guard = latency;
        }
    }

    /// Most recent provider calls, oldest first.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.iter().cloned().collect()
    }

    /// Provider calls made since creation or the last [`MemoryDesktop::clear_calls`].
    pub fn call_count(&self) -> usize {
        self.state().total_calls
    }

    pub fn clear_calls(&self) {
        let mut state = self.state();
        state.calls.clear();
        state.total_calls = 0;
    }

    /// Number of provider calls that started while another was running.
    pub fn overlapping_calls(&self) -> usize {
        self.shared.overlaps.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<PerformedAction> {
        self.state().actions.clone()
    }
}

fn lock(shared: &Shared) -> MutexGuard<'_, DesktopState> {
    shared.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DesktopState {
    fn record(&mut self, call: ProviderCall) {
        if self.calls.len() == MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
        self.total_calls += 1;
    }

    fn insert(&mut self, spec: &ElementSpec, parent: u64) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        let properties = ElementProperties {
            name: spec.name.clone(),
            automation_id: spec.automation_id.clone(),
            control_type: spec.control_type,
            class_name: spec.class_name.clone(),
            framework_id: spec.framework_id.clone(),
            bounds: spec.bounds,
            is_enabled: spec.is_enabled,
            is_offscreen: spec.is_offscreen,
            native_window_handle: spec.handle.map(WindowHandle).unwrap_or_default(),
            runtime_id: if spec.without_runtime_id {
                None
            } else {
                RuntimeId::new(vec![42, key as i32])
            },
            process_id: Some(4000),
            capabilities: spec.capabilities.clone(),
            value: spec.value.clone(),
            toggle_state: spec.toggle_state,
        };
        self.nodes.insert(
            key,
            Node {
                properties,
                parent: Some(parent),
                children: Vec::new(),
                alive: true,
                failure: None,
            },
        );
        let children: Vec<u64> = spec.children.iter().map(|child| self.insert(child, key)).collect();
        if let Some(node) = self.nodes.get_mut(&key) {
            node.children = children;
        }
        key
    }

    fn detach(&mut self, key: u64) {
        let parent = self.nodes.get(&key).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != key);
        }
    }

    fn kill(&mut self, key: u64) {
        for k in self.preorder(key) {
            if let Some(node) = self.nodes.get_mut(&k) {
                node.alive = false;
            }
        }
    }

    fn preorder(&self, key: u64) -> Vec<u64> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            if let Some(node) = self.nodes.get(&k) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn key_for_handle(&self, handle: WindowHandle) -> Option<u64> {
        self.preorder(ROOT_KEY).into_iter().find(|k| {
            self.nodes
                .get(k)
                .map(|n| n.alive && n.properties.native_window_handle == handle)
                .unwrap_or(false)
        })
    }

    fn key_for_runtime_id(&self, runtime_id: &RuntimeId) -> Option<u64> {
        self.preorder(ROOT_KEY).into_iter().find(|k| {
            self.nodes
                .get(k)
                .map(|n| n.alive && n.properties.runtime_id.as_ref() == Some(runtime_id))
                .unwrap_or(false)
        })
    }

    /// Live node or the failure a provider would report for it.
    fn live(&self, key: u64) -> ProviderResult<&Node> {
        let node = self
            .nodes
            .get(&key)
            .filter(|n| n.alive)
            .ok_or_else(|| ProviderError::stale("element is not available"))?;
        match node.failure {
            Some(kind) => Err(ProviderError::new(kind, "injected failure")),
            None => Ok(node),
        }
    }

    fn live_mut(&mut self, key: u64) -> ProviderResult<&mut Node> {
        self.live(key)?;
        self.nodes
            .get_mut(&key)
            .ok_or_else(|| ProviderError::stale("element is not available"))
    }

    fn cache(&self, shared: &Arc<Shared>, key: u64, depth_left: usize) -> ProviderResult<CachedElement> {
        let node = self.live(key)?;
        let mut children = Vec::new();
        if depth_left > 0 {
            for child in &node.children {
                match self.cache(shared, *child, depth_left - 1) {
                    Ok(cached) => children.push(cached),
                    Err(e) => trace!("bulk cache skipping child: {}", e),
                }
            }
        }
        Ok(CachedElement {
            element: element(shared, key),
            properties: node.properties.clone(),
            children,
        })
    }
}

fn element(shared: &Arc<Shared>, key: u64) -> RawElement {
    Arc::new(MemoryElement {
        shared: Arc::clone(shared),
        key,
    })
}

/// Records the call and detects overlap with other calls in flight.
struct CallGuard<'a> {
    shared: &'a Shared,
}

impl<'a> CallGuard<'a> {
    fn enter(shared: &'a Shared, operation: &'static str) -> Self {
        if shared.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            shared.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        lock(shared).record(ProviderCall {
            operation,
            thread: std::thread::current().id(),
        });
        let latency = shared.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        CallGuard { shared }
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`AccessibilityProvider`] over a [`MemoryDesktop`].
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    shared: Arc<Shared>,
}

impl MemoryProvider {
    pub fn desktop(&self) -> MemoryDesktop {
        MemoryDesktop {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl AccessibilityProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn root(&self) -> ProviderResult<RawElement> {
        let _call = CallGuard::enter(&self.shared, "root");
        Ok(element(&self.shared, ROOT_KEY))
    }

    fn element_from_handle(&self, handle: WindowHandle) -> ProviderResult<RawElement> {
        let _call = CallGuard::enter(&self.shared, "element_from_handle");
        if handle.is_none() {
            return Ok(element(&self.shared, ROOT_KEY));
        }
        let state = lock(&self.shared);
        let key = state
            .key_for_handle(handle)
            .ok_or_else(|| ProviderError::stale(format!("no window with handle {handle}")))?;
        state.live(key)?;
        Ok(element(&self.shared, key))
    }

    fn supports_bulk_cache(&self) -> bool {
        lock(&self.shared).bulk_cache
    }
}

/// One simulated element.
pub struct MemoryElement {
    shared: Arc<Shared>,
    key: u64,
}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryElement").field("key", &self.key).finish()
    }
}

impl MemoryElement {
    fn act(&self, operation: &'static str, required: Capability, apply: impl FnOnce(&mut Node)) -> ProviderResult<()> {
        let _call = CallGuard::enter(&self.shared, operation);
        let mut state = lock(&self.shared);
        let node = state.live_mut(self.key)?;
        if !node.properties.has_capability(required) {
            return Err(ProviderError::unsupported(format!(
                "{operation} is not supported by this element"
            )));
        }
        if !node.properties.is_enabled {
            return Err(ProviderError::new(FailureKind::Unsupported, "element is not enabled"));
        }
        apply(node);
        let runtime_id = node.properties.runtime_id.clone();
        state.actions.push(PerformedAction {
            runtime_id,
            action: operation.to_string(),
        });
        Ok(())
    }
}

impl ProviderElement for MemoryElement {
    fn properties(&self) -> ProviderResult<ElementProperties> {
        let _call = CallGuard::enter(&self.shared, "properties");
        let state = lock(&self.shared);
        Ok(state.live(self.key)?.properties.clone())
    }

    fn children(&self) -> ProviderResult<Vec<RawElement>> {
        let _call = CallGuard::enter(&self.shared, "children");
        let state = lock(&self.shared);
        let node = state.live(self.key)?;
        Ok(node
            .children
            .iter()
            .filter(|k| state.nodes.get(k).map(|n| n.alive).unwrap_or(false))
            .map(|k| element(&self.shared, *k))
            .collect())
    }

    fn parent(&self) -> ProviderResult<Option<RawElement>> {
        let _call = CallGuard::enter(&self.shared, "parent");
        let state = lock(&self.shared);
        let node = state.live(self.key)?;
        Ok(node.parent.map(|p| element(&self.shared, p)))
    }

    fn find_all(&self, condition: &NativeCondition) -> ProviderResult<Vec<CachedElement>> {
        let _call = CallGuard::enter(&self.shared, "find_all");
        let state = lock(&self.shared);
        state.live(self.key)?;
        Ok(state
            .preorder(self.key)
            .into_iter()
            .skip(1)
            .filter_map(|k| state.live(k).ok().map(|n| (k, n)))
            .filter(|(_, node)| condition.matches(&node.properties))
            .map(|(k, node)| CachedElement::leaf(element(&self.shared, k), node.properties.clone()))
            .collect())
    }

    fn cache_subtree(&self, max_depth: usize) -> ProviderResult<CachedElement> {
        let _call = CallGuard::enter(&self.shared, "cache_subtree");
        let state = lock(&self.shared);
        if !state.bulk_cache {
            return Err(ProviderError::unsupported("bulk caching is disabled"));
        }
        state.cache(&self.shared, self.key, max_depth)
    }

    fn invoke(&self) -> ProviderResult<()> {
        self.act("invoke", Capability::Invoke, |_| {})
    }

    fn toggle(&self) -> ProviderResult<()> {
        self.act("toggle", Capability::Toggle, |node| {
            node.properties.toggle_state = Some(match node.properties.toggle_state {
                Some(ToggleState::On) => ToggleState::Off,
                _ => ToggleState::On,
            });
        })
    }

    fn select(&self) -> ProviderResult<()> {
        self.act("select", Capability::SelectionItem, |_| {})
    }

    fn expand_collapse(&self) -> ProviderResult<()> {
        self.act("expand_collapse", Capability::ExpandCollapse, |_| {})
    }

    fn set_value(&self, value: &str) -> ProviderResult<()> {
        self.act("set_value", Capability::Value, |node| {
            node.properties.value = Some(value.to_string());
        })
    }

    fn focus(&self) -> ProviderResult<()> {
        let _call = CallGuard::enter(&self.shared, "focus");
        let mut state = lock(&self.shared);
        let node = state.live(self.key)?;
        let runtime_id = node.properties.runtime_id.clone();
        state.actions.push(PerformedAction {
            runtime_id,
            action: "focus".to_string(),
        });
        Ok(())
    }

    fn same_as(&self, other: &dyn ProviderElement) -> bool {
        other
            .as_any()
            .downcast_ref::<MemoryElement>()
            .map(|o| Arc::ptr_eq(&o.shared, &self.shared) && o.key == self.key)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop() -> (MemoryDesktop, WindowHandle) {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(
            ElementSpec::window("Editor").children([
                ElementSpec::new(ControlType::Button, "Save").capability(Capability::Invoke),
                ElementSpec::new(ControlType::Edit, "Body").capability(Capability::Value),
            ]),
        );
        (desktop, handle)
    }

    #[test]
    fn test_window_lookup_and_children() {
        let (desktop, handle) = desktop();
        let provider = desktop.provider();
        let window = provider.element_from_handle(handle).unwrap();
        let children = window.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].properties().unwrap().name, "Save");
        assert!(children[0].parent().unwrap().unwrap().same_as(window.as_ref()));
    }

    #[test]
    fn test_closed_window_is_stale() {
        let (desktop, handle) = desktop();
        let provider = desktop.provider();
        let window = provider.element_from_handle(handle).unwrap();
        let button = window.children().unwrap().remove(0);

        assert!(desktop.close_window(handle));
        assert!(button.properties().unwrap_err().is_stale());
        assert!(provider.element_from_handle(handle).unwrap_err().is_stale());
    }

    #[test]
    fn test_patterns_require_capabilities() {
        let (desktop, handle) = desktop();
        let window = desktop.provider().element_from_handle(handle).unwrap();
        let children = window.children().unwrap();

        children[0].invoke().unwrap();
        assert_eq!(
            children[1].invoke().unwrap_err().kind,
            FailureKind::Unsupported
        );
        children[1].set_value("hello").unwrap();
        assert_eq!(children[1].properties().unwrap().value.as_deref(), Some("hello"));
        assert_eq!(desktop.actions().len(), 2);
    }

    #[test]
    fn test_find_all_excludes_self() {
        let (desktop, handle) = desktop();
        let window = desktop.provider().element_from_handle(handle).unwrap();
        let all = window.find_all(&NativeCondition::True).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_injected_failure_and_json_fixture() {
        let desktop = MemoryDesktop::from_json(
            r#"{"windows":[{"name":"Calc","controlType":"Window","children":[{"name":"1","controlType":"Button"}]}]}"#,
        )
        .unwrap();
        let rid = desktop.runtime_id_of("1").unwrap();
        desktop.inject_failure(&rid, Some(FailureKind::AccessDenied));
        let provider = desktop.provider();
        let window = provider.root().unwrap().children().unwrap().remove(0);
        let button = window.children().unwrap().remove(0);
        assert_eq!(button.properties().unwrap_err().kind, FailureKind::AccessDenied);
        assert!(desktop.call_count() > 0);
        assert_eq!(desktop.overlapping_calls(), 0);
    }

    #[test]
    fn test_call_log_is_bounded_but_counted() {
        let (desktop, handle) = desktop();
        let window = desktop.provider().element_from_handle(handle).unwrap();
        desktop.clear_calls();
        for _ in 0..MAX_RECORDED_CALLS + 10 {
            window.properties().unwrap();
        }
        assert_eq!(desktop.calls().len(), MAX_RECORDED_CALLS);
        assert_eq!(desktop.call_count(), MAX_RECORDED_CALLS + 10);
        desktop.clear_calls();
        assert_eq!(desktop.call_count(), 0);
    }

    #[test]
    fn test_element_without_runtime_id() {
        let desktop = MemoryDesktop::new();
        let handle = desktop.add_window(
            ElementSpec::window("Legacy").child(ElementSpec::new(ControlType::Text, "label").without_runtime_id()),
        );
        let window = desktop.provider().element_from_handle(handle).unwrap();
        let label = window.children().unwrap().remove(0);
        assert_eq!(label.properties().unwrap().runtime_id, None);
        assert!(window.properties().unwrap().runtime_id.is_some());
    }
}
