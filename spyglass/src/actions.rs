//! Interaction actions run as an ordered list of strategies
//!
//! Each action maps the element's control type to a fixed list of
//! strategies, tried in order. A strategy either completes the action,
//! does not apply to the element, or fails. Failures the classifier marks
//! retryable move on to the next strategy; anything else stops the run.

use crate::element::{Capability, ControlType, ElementProperties};
use crate::failure::ProviderError;
use crate::platforms::RawElement;
use crate::services::{InputService, WindowActivator};
use crate::types::{Point, WindowHandle};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One way of carrying out an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Invoke,
    Toggle,
    Select,
    ExpandCollapse,
    SetValue,
    /// Focus the element, then type through the input service.
    FocusAndType,
    /// Click the centre of the element through the input service.
    PhysicalClick,
}

/// What a single strategy attempt produced.
#[derive(Debug)]
pub enum StrategyOutcome {
    Done { coordinates: Option<Point> },
    NotApplicable(String),
    Retryable(AutomationError),
    Fatal(AutomationError),
}

impl StrategyOutcome {
    fn from_provider(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => StrategyOutcome::Done { coordinates: None },
            Err(e) if e.is_retryable() => StrategyOutcome::Retryable(e.into()),
            Err(e) => StrategyOutcome::Fatal(e.into()),
        }
    }
}

/// Action requested on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    Click,
    TypeText(&'a str),
    Toggle,
}

impl Action<'_> {
    fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::TypeText(_) => "type_text",
            Action::Toggle => "toggle",
        }
    }

    /// Strategy list for this action on an element of `control_type`.
    pub fn strategies(&self, control_type: ControlType) -> &'static [Strategy] {
        match self {
            Action::Click => click_strategies(control_type),
            Action::TypeText(_) => &[Strategy::SetValue, Strategy::FocusAndType],
            Action::Toggle => &[Strategy::Toggle, Strategy::PhysicalClick],
        }
    }
}

/// Precomputed click strategies per control type.
pub fn click_strategies(control_type: ControlType) -> &'static [Strategy] {
    use Strategy::*;
    match control_type {
        ControlType::CheckBox => &[Toggle, Invoke, PhysicalClick],
        ControlType::RadioButton
        | ControlType::ListItem
        | ControlType::TabItem
        | ControlType::TreeItem
        | ControlType::DataItem => &[Select, Invoke, PhysicalClick],
        ControlType::ComboBox => &[ExpandCollapse, PhysicalClick],
        _ => &[Invoke, PhysicalClick],
    }
}

/// Record of one attempted strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub strategy: Strategy,
    pub outcome: String,
}

/// How an action was carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub method: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Point>,
    pub attempted: Vec<Attempt>,
}

/// Collaborators used by the physical fallbacks.
pub struct ActionServices<'a> {
    pub activator: &'a dyn WindowActivator,
    pub input: &'a dyn InputService,
}

/// Element an action targets, with the properties read just before.
pub struct ActionTarget<'a> {
    pub element: &'a RawElement,
    pub properties: &'a ElementProperties,
    /// Window to bring forward before physical input.
    pub window: WindowHandle,
}

/// Runs the strategy list for `action` until one completes or one fails hard.
pub fn perform(
    action: Action<'_>,
    target: &ActionTarget<'_>,
    services: &ActionServices<'_>,
) -> Result<ActionResult, AutomationError> {
    if !target.properties.is_enabled {
        return Err(AutomationError::UnsupportedOperation(format!(
            "cannot {} '{}': element is disabled",
            action.name(),
            target.properties.name
        )));
    }

    let mut attempted = Vec::new();
    let mut last_error = None;

    for &strategy in action.strategies(target.properties.control_type) {
        let outcome = run(strategy, action, target, services);
        debug!("{} via {:?}: {:?}", action.name(), strategy, outcome);
        match outcome {
            StrategyOutcome::Done { coordinates } => {
                attempted.push(Attempt {
                    strategy,
                    outcome: "done".to_string(),
                });
                info!("{} on '{}' completed via {:?}", action.name(), target.properties.name, strategy);
                return Ok(ActionResult {
                    method: strategy,
                    coordinates,
                    attempted,
                });
            }
            StrategyOutcome::NotApplicable(reason) => attempted.push(Attempt {
                strategy,
                outcome: format!("not applicable: {reason}"),
            }),
            StrategyOutcome::Retryable(e) => {
                attempted.push(Attempt {
                    strategy,
                    outcome: format!("failed: {e}"),
                });
                last_error = Some(e);
            }
            StrategyOutcome::Fatal(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        AutomationError::UnsupportedOperation(format!(
            "no strategy can {} '{}' ({})",
            action.name(),
            target.properties.name,
            target.properties.control_type
        ))
    }))
}

fn require(properties: &ElementProperties, capability: Capability) -> Option<StrategyOutcome> {
    if properties.has_capability(capability) {
        None
    } else {
        Some(StrategyOutcome::NotApplicable(format!(
            "element does not support {capability:?}"
        )))
    }
}

fn run(
    strategy: Strategy,
    action: Action<'_>,
    target: &ActionTarget<'_>,
    services: &ActionServices<'_>,
) -> StrategyOutcome {
    let element = target.element;
    let properties = target.properties;
    match strategy {
        Strategy::Invoke => require(properties, Capability::Invoke)
            .unwrap_or_else(|| StrategyOutcome::from_provider(element.invoke())),
        Strategy::Toggle => require(properties, Capability::Toggle)
            .unwrap_or_else(|| StrategyOutcome::from_provider(element.toggle())),
        Strategy::Select => require(properties, Capability::SelectionItem)
            .unwrap_or_else(|| StrategyOutcome::from_provider(element.select())),
        Strategy::ExpandCollapse => require(properties, Capability::ExpandCollapse)
            .unwrap_or_else(|| StrategyOutcome::from_provider(element.expand_collapse())),
        Strategy::SetValue => {
            let text = match action {
                Action::TypeText(text) => text,
                _ => return StrategyOutcome::NotApplicable("no text to set".to_string()),
            };
            require(properties, Capability::Value)
                .unwrap_or_else(|| StrategyOutcome::from_provider(element.set_value(text)))
        }
        Strategy::FocusAndType => {
            let text = match action {
                Action::TypeText(text) => text,
                _ => return StrategyOutcome::NotApplicable("no text to type".to_string()),
            };
            if let Err(e) = element.focus() {
                return StrategyOutcome::from_provider(Err(e));
            }
            activate(target, services);
            match services.input.type_text(text) {
                Ok(()) => StrategyOutcome::Done { coordinates: None },
                Err(e) => StrategyOutcome::Retryable(e),
            }
        }
        Strategy::PhysicalClick => {
            let point = match properties.bounds.filter(|b| !b.is_empty()) {
                Some(bounds) if !properties.is_offscreen => bounds.center(),
                _ => {
                    return StrategyOutcome::NotApplicable(
                        "element has no on-screen clickable point".to_string(),
                    )
                }
            };
            activate(target, services);
            match services.input.click_at(point) {
                Ok(()) => StrategyOutcome::Done {
                    coordinates: Some(point),
                },
                Err(e) => StrategyOutcome::Retryable(e),
            }
        }
    }
}

/// Best effort; physical input still goes ahead when activation fails.
fn activate(target: &ActionTarget<'_>, services: &ActionServices<'_>) {
    if target.window.is_none() {
        return;
    }
    if !services.activator.activate(target.window) {
        debug!("could not activate window {}; continuing", target.window);
    }
}
