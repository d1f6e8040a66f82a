//! Windows UI Automation element behind the provider element trait

use super::types::{ThreadSafeWinUIAutomation, ThreadSafeWinUIElement};
use super::utils::{read_properties, runtime_id_to_variant, uia_error};
use crate::element::{Capability, ControlType, ElementProperties, ToggleState};
use crate::failure::ProviderResult;
use crate::platforms::{CachedElement, NativeCondition, ProviderElement, RawElement};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use uiautomation::core::UICacheRequest;
use uiautomation::filters::UICondition;
use uiautomation::patterns;
use uiautomation::types::{ExpandCollapseState, PropertyConditionFlags, TreeScope, UIProperty};
use uiautomation::variants::Variant;
use uiautomation::UIElement;

/// Pattern availability properties and the capability each one advertises.
const PATTERN_FLAGS: &[(UIProperty, Capability)] = &[
    (UIProperty::IsInvokePatternAvailable, Capability::Invoke),
    (UIProperty::IsTogglePatternAvailable, Capability::Toggle),
    (UIProperty::IsValuePatternAvailable, Capability::Value),
    (UIProperty::IsSelectionItemPatternAvailable, Capability::SelectionItem),
    (UIProperty::IsExpandCollapsePatternAvailable, Capability::ExpandCollapse),
    (UIProperty::IsRangeValuePatternAvailable, Capability::RangeValue),
    (UIProperty::IsScrollPatternAvailable, Capability::Scroll),
    (UIProperty::IsTextPatternAvailable, Capability::Text),
    (UIProperty::IsWindowPatternAvailable, Capability::Window),
];

/// Property set fetched by one bulk subtree request.
const CACHED_PROPERTIES: &[UIProperty] = &[
    UIProperty::Name,
    UIProperty::AutomationId,
    UIProperty::ControlType,
    UIProperty::ClassName,
    UIProperty::FrameworkId,
    UIProperty::BoundingRectangle,
    UIProperty::IsEnabled,
    UIProperty::IsOffscreen,
    UIProperty::NativeWindowHandle,
    UIProperty::ProcessId,
    UIProperty::RuntimeId,
    UIProperty::ValueValue,
    UIProperty::ToggleToggleState,
];

pub struct WindowsUIElement {
    pub(crate) element: ThreadSafeWinUIElement,
    pub(crate) automation: Arc<ThreadSafeWinUIAutomation>,
    /// Properties come from a prior bulk fetch instead of live reads.
    pub(crate) cached: bool,
}

impl Debug for WindowsUIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsUIElement")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .field("cached", &self.cached)
            .finish()
    }
}

impl WindowsUIElement {
    pub(crate) fn wrap(element: UIElement, automation: &Arc<ThreadSafeWinUIAutomation>) -> RawElement {
        #[allow(clippy::arc_with_non_send_sync)]
        let inner = Arc::new(element);
        Arc::new(WindowsUIElement {
            element: ThreadSafeWinUIElement(inner),
            automation: Arc::clone(automation),
            cached: false,
        })
    }

    fn raw(&self) -> &UIElement {
        &self.element.0
    }

    fn condition(&self, condition: &NativeCondition) -> ProviderResult<UICondition> {
        let automation = &self.automation.0;
        let built = match condition {
            NativeCondition::True => automation.create_true_condition(),
            NativeCondition::RuntimeId(rid) => match runtime_id_to_variant(rid) {
                Some(value) => automation.create_property_condition(UIProperty::RuntimeId, value, None),
                None => {
                    debug!("runtime id {} not encodable, matching client-side", rid);
                    automation.create_true_condition()
                }
            },
            NativeCondition::Name(name) => automation.create_property_condition(
                UIProperty::Name,
                Variant::from(name.as_str()),
                Some(PropertyConditionFlags::IgnoreCase),
            ),
            NativeCondition::AutomationId(id) => automation.create_property_condition(
                UIProperty::AutomationId,
                Variant::from(id.as_str()),
                None,
            ),
            NativeCondition::ControlType(ControlType::Unknown) => automation.create_false_condition(),
            NativeCondition::ControlType(ct) => automation.create_property_condition(
                UIProperty::ControlType,
                Variant::from(ct.uia_id().unwrap_or_default()),
                None,
            ),
            NativeCondition::And(parts) => {
                let mut combined = automation
                    .create_true_condition()
                    .map_err(|e| uia_error("true condition", e))?;
                for part in parts {
                    let next = self.condition(part)?;
                    combined = automation
                        .create_and_condition(combined, next)
                        .map_err(|e| uia_error("and condition", e))?;
                }
                return Ok(combined);
            }
        };
        built.map_err(|e| uia_error("property condition", e))
    }

    fn cache_request(&self) -> ProviderResult<UICacheRequest> {
        let automation = &self.automation.0;
        let request = automation
            .create_cache_request()
            .map_err(|e| uia_error("create_cache_request", e))?;
        for property in CACHED_PROPERTIES
            .iter()
            .chain(PATTERN_FLAGS.iter().map(|(p, _)| p))
        {
            request
                .add_property(*property)
                .map_err(|e| uia_error("cache add_property", e))?;
        }
        let control_view = automation
            .get_control_view_condition()
            .map_err(|e| uia_error("control view condition", e))?;
        request
            .set_tree_filter(control_view)
            .map_err(|e| uia_error("cache tree filter", e))?;
        request
            .set_tree_scope(TreeScope::Subtree)
            .map_err(|e| uia_error("cache tree scope", e))?;
        Ok(request)
    }

    fn snapshot(&self, element: UIElement, depth: usize, max_depth: usize) -> ProviderResult<CachedElement> {
        let properties = read_properties(&element, true)?;
        let mut children = Vec::new();
        if depth < max_depth {
            for child in element.get_cached_children().unwrap_or_default() {
                match self.snapshot(child, depth + 1, max_depth) {
                    Ok(node) => children.push(node),
                    Err(e) => debug!("skipping unreadable cached element: {}", e),
                }
            }
        }
        Ok(CachedElement {
            element: WindowsUIElement::wrap(element, &self.automation),
            properties,
            children,
        })
    }
}

/// Fills capabilities, value and toggle state from pattern availability.
pub(crate) fn read_patterns(element: &UIElement, cached: bool, properties: &mut ElementProperties) {
    let read = |property: UIProperty| -> Option<Variant> {
        if cached {
            element.get_cached_property_value(property).ok()
        } else {
            element.get_property_value(property).ok()
        }
    };

    for (property, capability) in PATTERN_FLAGS {
        let available = read(*property)
            .and_then(|v| bool::try_from(v).ok())
            .unwrap_or(false);
        if available {
            properties.capabilities.push(*capability);
        }
    }

    if properties.has_capability(Capability::Value) {
        properties.value = read(UIProperty::ValueValue)
            .and_then(|v| v.get_string().ok())
            .filter(|s| !s.is_empty());
    }
    if properties.has_capability(Capability::Toggle) {
        properties.toggle_state = read(UIProperty::ToggleToggleState)
            .and_then(|v| i32::try_from(v).ok())
            .and_then(|state| match state {
                0 => Some(ToggleState::Off),
                1 => Some(ToggleState::On),
                2 => Some(ToggleState::Indeterminate),
                _ => None,
            });
    }
}

impl ProviderElement for WindowsUIElement {
    fn properties(&self) -> ProviderResult<ElementProperties> {
        read_properties(self.raw(), self.cached)
    }

    fn children(&self) -> ProviderResult<Vec<RawElement>> {
        let walker = self
            .automation
            .0
            .get_control_view_walker()
            .map_err(|e| uia_error("control view walker", e))?;

        let mut children = Vec::new();
        let mut next = match walker.get_first_child(self.raw()) {
            Ok(child) => Some(child),
            Err(_) => {
                // No first child, unless the element itself is gone.
                self.raw()
                    .get_control_type()
                    .map_err(|e| uia_error("children", e))?;
                None
            }
        };
        while let Some(child) = next {
            next = walker.get_next_sibling(&child).ok();
            children.push(WindowsUIElement::wrap(child, &self.automation));
        }
        Ok(children)
    }

    fn parent(&self) -> ProviderResult<Option<RawElement>> {
        let walker = self
            .automation
            .0
            .get_control_view_walker()
            .map_err(|e| uia_error("control view walker", e))?;
        match walker.get_parent(self.raw()) {
            Ok(parent) => Ok(Some(WindowsUIElement::wrap(parent, &self.automation))),
            Err(e) => {
                debug!("TreeWalker get_parent failed: {}", e);
                Ok(None)
            }
        }
    }

    fn find_all(&self, condition: &NativeCondition) -> ProviderResult<Vec<CachedElement>> {
        let uia_condition = self.condition(condition)?;
        let found = self
            .raw()
            .find_all(TreeScope::Descendants, &uia_condition)
            .map_err(|e| uia_error("find_all", e))?;

        let mut matches = Vec::new();
        for element in found {
            // Rechecked here for the client-side fallback condition.
            if let NativeCondition::RuntimeId(rid) = condition {
                match element.get_runtime_id() {
                    Ok(actual) if actual.as_slice() == rid.as_slice() => {}
                    _ => continue,
                }
            }
            match read_properties(&element, false) {
                Ok(properties) => matches.push(CachedElement::leaf(
                    WindowsUIElement::wrap(element, &self.automation),
                    properties,
                )),
                Err(e) => debug!("skipping unreadable search result: {}", e),
            }
            if matches!(condition, NativeCondition::RuntimeId(_)) && !matches.is_empty() {
                break;
            }
        }
        Ok(matches)
    }

    fn cache_subtree(&self, max_depth: usize) -> ProviderResult<CachedElement> {
        let request = self.cache_request()?;
        let updated = self
            .raw()
            .build_updated_cache(&request)
            .map_err(|e| uia_error("build_updated_cache", e))?;
        self.snapshot(updated, 0, max_depth)
    }

    fn invoke(&self) -> ProviderResult<()> {
        self.raw()
            .get_pattern::<patterns::UIInvokePattern>()
            .map_err(|e| uia_error("InvokePattern", e))?
            .invoke()
            .map_err(|e| uia_error("invoke", e))
    }

    fn toggle(&self) -> ProviderResult<()> {
        self.raw()
            .get_pattern::<patterns::UITogglePattern>()
            .map_err(|e| uia_error("TogglePattern", e))?
            .toggle()
            .map_err(|e| uia_error("toggle", e))
    }

    fn select(&self) -> ProviderResult<()> {
        self.raw()
            .get_pattern::<patterns::UISelectionItemPattern>()
            .map_err(|e| uia_error("SelectionItemPattern", e))?
            .select()
            .map_err(|e| uia_error("select", e))
    }

    fn expand_collapse(&self) -> ProviderResult<()> {
        let pattern = self
            .raw()
            .get_pattern::<patterns::UIExpandCollapsePattern>()
            .map_err(|e| uia_error("ExpandCollapsePattern", e))?;
        let result = match pattern.get_state() {
            Ok(ExpandCollapseState::Expanded) => pattern.collapse(),
            _ => pattern.expand(),
        };
        result.map_err(|e| uia_error("expand/collapse", e))
    }

    fn set_value(&self, value: &str) -> ProviderResult<()> {
        self.raw()
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| uia_error("ValuePattern", e))?
            .set_value(value)
            .map_err(|e| uia_error("set_value", e))
    }

    fn focus(&self) -> ProviderResult<()> {
        self.raw()
            .set_focus()
            .map_err(|e| uia_error("set_focus", e))
    }

    fn same_as(&self, other: &dyn ProviderElement) -> bool {
        match other.as_any().downcast_ref::<WindowsUIElement>() {
            Some(other) => self
                .automation
                .0
                .compare_elements(self.raw(), other.raw())
                .unwrap_or(false),
            None => false,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
