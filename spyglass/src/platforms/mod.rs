use crate::element::{ControlType, ElementProperties};
use crate::element_id::RuntimeId;
use crate::failure::ProviderResult;
use crate::services::{CoordinateService, InputService, OverlayService, WindowActivator};
use crate::types::WindowHandle;
use crate::AutomationError;
use std::fmt::Debug;
use std::sync::Arc;

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// Reference to one live element owned by the accessibility provider.
pub type RawElement = Arc<dyn ProviderElement>;

/// A single element of the provider's live tree.
///
/// Every method is a round trip into the provider and must only be called
/// from the UI worker thread.
pub trait ProviderElement: Send + Sync + Debug {
    /// Reads the full property bundle in one request.
    fn properties(&self) -> ProviderResult<ElementProperties>;

    /// Direct children, in provider order.
    fn children(&self) -> ProviderResult<Vec<RawElement>>;

    fn parent(&self) -> ProviderResult<Option<RawElement>>;

    /// Native filtered search over all descendants (excluding this element),
    /// returning each match with its property bundle.
    fn find_all(&self, condition: &NativeCondition) -> ProviderResult<Vec<CachedElement>>;

    /// Bulk fetch of this element and its descendants down to `max_depth`
    /// levels below it. Providers without bulk support return `Unsupported`.
    fn cache_subtree(&self, max_depth: usize) -> ProviderResult<CachedElement>;

    fn invoke(&self) -> ProviderResult<()>;
    fn toggle(&self) -> ProviderResult<()>;
    fn select(&self) -> ProviderResult<()>;
    fn expand_collapse(&self) -> ProviderResult<()>;
    fn set_value(&self, value: &str) -> ProviderResult<()>;
    fn focus(&self) -> ProviderResult<()>;

    /// Provider-level identity comparison.
    fn same_as(&self, other: &dyn ProviderElement) -> bool;

    fn as_any(&self) -> &dyn std::any::Any;
}

/// Entry point into the host accessibility provider.
pub trait AccessibilityProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Runs once on the UI worker thread before any other call.
    fn initialize(&self) -> ProviderResult<()> {
        Ok(())
    }

    /// Desktop root element.
    fn root(&self) -> ProviderResult<RawElement>;

    /// Element owning a native window handle. [`WindowHandle::NONE`] maps to the root.
    fn element_from_handle(&self, handle: WindowHandle) -> ProviderResult<RawElement>;

    /// Whether [`ProviderElement::cache_subtree`] is available.
    fn supports_bulk_cache(&self) -> bool;
}

/// One element together with properties (and optionally children) fetched
/// in a single provider call.
#[derive(Debug, Clone)]
pub struct CachedElement {
    pub element: RawElement,
    pub properties: ElementProperties,
    pub children: Vec<CachedElement>,
}

impl CachedElement {
    pub fn leaf(element: RawElement, properties: ElementProperties) -> Self {
        Self {
            element,
            properties,
            children: Vec::new(),
        }
    }
}

/// Condition the provider can evaluate natively. Conjunctions only.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCondition {
    True,
    /// Case-insensitive exact name match.
    Name(String),
    AutomationId(String),
    ControlType(ControlType),
    RuntimeId(RuntimeId),
    And(Vec<NativeCondition>),
}

impl NativeCondition {
    /// AND-combines conditions, flattening nested conjunctions and dropping `True`.
    pub fn all(conditions: Vec<NativeCondition>) -> NativeCondition {
        let mut flat = Vec::new();
        for condition in conditions {
            match condition {
                NativeCondition::True => {}
                NativeCondition::And(inner) => match NativeCondition::all(inner) {
                    NativeCondition::True => {}
                    NativeCondition::And(parts) => flat.extend(parts),
                    other => flat.push(other),
                },
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => NativeCondition::True,
            1 => flat.remove(0),
            _ => NativeCondition::And(flat),
        }
    }

    /// Evaluates the condition against an already fetched property bundle.
    pub fn matches(&self, properties: &ElementProperties) -> bool {
        match self {
            NativeCondition::True => true,
            NativeCondition::Name(name) => properties.name.to_lowercase() == name.to_lowercase(),
            NativeCondition::AutomationId(id) => properties.automation_id == *id,
            NativeCondition::ControlType(ct) => properties.control_type == *ct,
            NativeCondition::RuntimeId(rid) => properties.runtime_id.as_ref() == Some(rid),
            NativeCondition::And(parts) => parts.iter().all(|c| c.matches(properties)),
        }
    }
}

/// Provider plus the external collaborators used alongside it.
#[derive(Debug, Clone)]
pub struct Platform {
    pub provider: Arc<dyn AccessibilityProvider>,
    pub coordinates: Arc<dyn CoordinateService>,
    pub activator: Arc<dyn WindowActivator>,
    pub input: Arc<dyn InputService>,
    pub overlay: Arc<dyn OverlayService>,
}

impl Platform {
    /// Platform over a simulated desktop, with recording input and overlay
    /// services and a single 1920x1080 monitor.
    pub fn in_memory(desktop: &memory::MemoryDesktop) -> Platform {
        let input = Arc::new(crate::services::RecordingInput::default());
        Platform {
            provider: Arc::new(desktop.provider()),
            coordinates: Arc::new(crate::services::MonitorLayout::default()),
            activator: input.clone(),
            input,
            overlay: Arc::new(crate::services::RecordingOverlay::default()),
        }
    }
}

/// Create the platform for the current operating system
pub fn create_platform() -> Result<Platform, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        windows::create_platform()
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "no native accessibility provider for this platform; use the in-memory provider"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_flattens_and_drops_true() {
        let condition = NativeCondition::all(vec![
            NativeCondition::True,
            NativeCondition::Name("Save".into()),
            NativeCondition::And(vec![
                NativeCondition::ControlType(ControlType::Button),
                NativeCondition::True,
            ]),
        ]);
        assert_eq!(
            condition,
            NativeCondition::And(vec![
                NativeCondition::Name("Save".into()),
                NativeCondition::ControlType(ControlType::Button),
            ])
        );
        assert_eq!(NativeCondition::all(vec![]), NativeCondition::True);
    }

    #[test]
    fn test_matches_name_case_insensitively() {
        let props = ElementProperties {
            name: "Save As".into(),
            control_type: ControlType::Button,
            ..Default::default()
        };
        assert!(NativeCondition::Name("save as".into()).matches(&props));
        assert!(!NativeCondition::Name("save".into()).matches(&props));
        assert!(NativeCondition::all(vec![
            NativeCondition::Name("SAVE AS".into()),
            NativeCondition::ControlType(ControlType::Button),
        ])
        .matches(&props));
    }
}
