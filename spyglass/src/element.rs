//! Element property bundles and the external element record
//!
//! [`ElementProperties`] is what a provider hands back for one element in a
//! single read (or out of a bulk cache). [`ElementRecord`] is the snapshot
//! returned to callers; it is derived from exactly one property bundle.

use crate::element_id::{ElementId, RuntimeId};
use crate::services::CoordinateService;
use crate::types::{Point, Rect, WindowHandle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of control types exposed by the accessibility provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControlType {
    AppBar,
    Button,
    Calendar,
    CheckBox,
    ComboBox,
    Custom,
    DataGrid,
    DataItem,
    Document,
    Edit,
    Group,
    Header,
    HeaderItem,
    Hyperlink,
    Image,
    List,
    ListItem,
    Menu,
    MenuBar,
    MenuItem,
    Pane,
    ProgressBar,
    RadioButton,
    ScrollBar,
    SemanticZoom,
    Separator,
    Slider,
    Spinner,
    SplitButton,
    StatusBar,
    Tab,
    TabItem,
    Table,
    Text,
    Thumb,
    TitleBar,
    ToolBar,
    ToolTip,
    Tree,
    TreeItem,
    Window,
    #[default]
    Unknown,
}

const UIA_CONTROL_TYPES: &[(i32, ControlType)] = &[
    (50000, ControlType::Button),
    (50001, ControlType::Calendar),
    (50002, ControlType::CheckBox),
    (50003, ControlType::ComboBox),
    (50004, ControlType::Edit),
    (50005, ControlType::Hyperlink),
    (50006, ControlType::Image),
    (50007, ControlType::ListItem),
    (50008, ControlType::List),
    (50009, ControlType::Menu),
    (50010, ControlType::MenuBar),
    (50011, ControlType::MenuItem),
    (50012, ControlType::ProgressBar),
    (50013, ControlType::RadioButton),
    (50014, ControlType::ScrollBar),
    (50015, ControlType::Slider),
    (50016, ControlType::Spinner),
    (50017, ControlType::StatusBar),
    (50018, ControlType::Tab),
    (50019, ControlType::TabItem),
    (50020, ControlType::Text),
    (50021, ControlType::ToolBar),
    (50022, ControlType::ToolTip),
    (50023, ControlType::Tree),
    (50024, ControlType::TreeItem),
    (50025, ControlType::Custom),
    (50026, ControlType::Group),
    (50027, ControlType::Thumb),
    (50028, ControlType::DataGrid),
    (50029, ControlType::DataItem),
    (50030, ControlType::Document),
    (50031, ControlType::SplitButton),
    (50032, ControlType::Window),
    (50033, ControlType::Pane),
    (50034, ControlType::Header),
    (50035, ControlType::HeaderItem),
    (50036, ControlType::Table),
    (50037, ControlType::TitleBar),
    (50038, ControlType::Separator),
    (50039, ControlType::SemanticZoom),
    (50040, ControlType::AppBar),
];

impl ControlType {
    /// Maps a UI Automation control type identifier.
    pub fn from_uia_id(id: i32) -> ControlType {
        UIA_CONTROL_TYPES
            .iter()
            .find(|(uia_id, _)| *uia_id == id)
            .map(|(_, ct)| *ct)
            .unwrap_or(ControlType::Unknown)
    }

    /// UI Automation control type identifier, `None` for [`ControlType::Unknown`].
    pub fn uia_id(&self) -> Option<i32> {
        UIA_CONTROL_TYPES
            .iter()
            .find(|(_, ct)| ct == self)
            .map(|(id, _)| *id)
    }

    /// Parses a control type name, case-insensitively, accepting common role aliases.
    pub fn parse(name: &str) -> Option<ControlType> {
        let ct = match name.trim().to_lowercase().as_str() {
            "appbar" => ControlType::AppBar,
            "button" => ControlType::Button,
            "calendar" => ControlType::Calendar,
            "checkbox" => ControlType::CheckBox,
            "combobox" | "dropdown" => ControlType::ComboBox,
            "custom" => ControlType::Custom,
            "datagrid" => ControlType::DataGrid,
            "data" | "dataitem" => ControlType::DataItem,
            "document" => ControlType::Document,
            "edit" | "textbox" | "textfield" | "input" => ControlType::Edit,
            "group" => ControlType::Group,
            "header" => ControlType::Header,
            "headeritem" => ControlType::HeaderItem,
            "hyperlink" | "link" => ControlType::Hyperlink,
            "image" => ControlType::Image,
            "list" => ControlType::List,
            "listitem" => ControlType::ListItem,
            "menu" => ControlType::Menu,
            "menubar" => ControlType::MenuBar,
            "menuitem" => ControlType::MenuItem,
            "pane" => ControlType::Pane,
            "progressbar" => ControlType::ProgressBar,
            "radiobutton" | "radio" => ControlType::RadioButton,
            "scrollbar" => ControlType::ScrollBar,
            "semanticzoom" => ControlType::SemanticZoom,
            "separator" => ControlType::Separator,
            "slider" => ControlType::Slider,
            "spinner" => ControlType::Spinner,
            "splitbutton" => ControlType::SplitButton,
            "statusbar" => ControlType::StatusBar,
            "tab" => ControlType::Tab,
            "tabitem" => ControlType::TabItem,
            "table" => ControlType::Table,
            "text" | "label" => ControlType::Text,
            "thumb" => ControlType::Thumb,
            "titlebar" | "title" => ControlType::TitleBar,
            "toolbar" => ControlType::ToolBar,
            "tooltip" => ControlType::ToolTip,
            "tree" => ControlType::Tree,
            "treeitem" => ControlType::TreeItem,
            "window" | "dialog" => ControlType::Window,
            _ => return None,
        };
        Some(ct)
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Interaction capabilities (provider patterns) an element advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Invoke,
    Toggle,
    Value,
    SelectionItem,
    ExpandCollapse,
    RangeValue,
    Scroll,
    Text,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Off,
    On,
    Indeterminate,
}

/// Property bundle read from the provider for one element.
///
/// Once fetched, every read during a traversal goes through this bundle
/// rather than back to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementProperties {
    pub name: String,
    pub automation_id: String,
    pub control_type: ControlType,
    pub class_name: String,
    pub framework_id: String,
    pub bounds: Option<Rect>,
    pub is_enabled: bool,
    pub is_offscreen: bool,
    pub native_window_handle: WindowHandle,
    pub runtime_id: Option<RuntimeId>,
    pub process_id: Option<u32>,
    pub capabilities: Vec<Capability>,
    pub value: Option<String>,
    pub toggle_state: Option<ToggleState>,
}

impl ElementProperties {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Bounding box area, zero when bounds are missing or degenerate.
    pub fn area(&self) -> i64 {
        self.bounds.map(|b| b.area()).unwrap_or(0)
    }
}

/// Snapshot of one element returned to callers.
///
/// It may be stale the instant it is returned; `id` is the only part that
/// stays meaningful across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub automation_id: Option<String>,
    pub control_type: ControlType,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_bounds: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clickable_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "is_empty_string")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_state: Option<ToggleState>,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_offscreen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ElementRecord>>,
}

fn is_empty_string(opt: &Option<String>) -> bool {
    match opt {
        Some(s) => s.is_empty(),
        None => true,
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ElementRecord {
    /// Number of records in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map(|c| c.iter().map(|child| child.subtree_len()).sum::<usize>())
            .unwrap_or(0)
    }

    /// Depth of the deepest record below this one (0 for a leaf).
    pub fn depth(&self) -> usize {
        self.children
            .as_ref()
            .and_then(|c| c.iter().map(|child| child.depth() + 1).max())
            .unwrap_or(0)
    }

    /// Pre-order iteration over this record and all descendants.
    pub fn walk(&self) -> Vec<&ElementRecord> {
        let mut out = vec![self];
        if let Some(children) = &self.children {
            for child in children {
                out.extend(child.walk());
            }
        }
        out
    }
}

/// Turns a property bundle and its freshly minted id into the external record.
pub fn convert(
    properties: &ElementProperties,
    id: &ElementId,
    coordinates: &dyn CoordinateService,
) -> ElementRecord {
    let bounds = properties.bounds.filter(|b| !b.is_empty());
    let (monitor_bounds, monitor_index) = match bounds {
        Some(rect) => {
            let (relative, index) = coordinates.to_monitor_relative(&rect);
            (Some(relative), Some(index))
        }
        None => (None, None),
    };

    let mut capabilities = properties.capabilities.clone();
    capabilities.sort();
    capabilities.dedup();

    ElementRecord {
        id: id.to_string(),
        name: properties.name.clone(),
        automation_id: Some(properties.automation_id.clone()).filter(|s| !s.is_empty()),
        control_type: properties.control_type,
        class_name: Some(properties.class_name.clone()).filter(|s| !s.is_empty()),
        bounds,
        monitor_bounds,
        monitor_index,
        clickable_point: bounds.map(|b| b.center()),
        capabilities,
        value: properties.value.clone(),
        toggle_state: properties.toggle_state,
        is_enabled: properties.is_enabled,
        is_offscreen: properties.is_offscreen,
        children: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element_id::TreePath;
    use crate::services::MonitorLayout;

    fn button() -> ElementProperties {
        ElementProperties {
            name: "Save".to_string(),
            automation_id: "btnSave".to_string(),
            control_type: ControlType::Button,
            bounds: Some(Rect::new(2000, 10, 80, 20)),
            is_enabled: true,
            native_window_handle: WindowHandle(7),
            runtime_id: RuntimeId::new(vec![42, 7, 1]),
            capabilities: vec![Capability::Invoke, Capability::Invoke],
            ..Default::default()
        }
    }

    #[test]
    fn test_control_type_uia_mapping_round_trips() {
        for (id, ct) in UIA_CONTROL_TYPES {
            assert_eq!(ControlType::from_uia_id(*id), *ct);
            assert_eq!(ct.uia_id(), Some(*id));
        }
        assert_eq!(ControlType::from_uia_id(1), ControlType::Unknown);
    }

    #[test]
    fn test_control_type_parse_aliases() {
        assert_eq!(ControlType::parse("Button"), Some(ControlType::Button));
        assert_eq!(ControlType::parse("textbox"), Some(ControlType::Edit));
        assert_eq!(ControlType::parse("dialog"), Some(ControlType::Window));
        assert_eq!(ControlType::parse("gizmo"), None);
    }

    #[test]
    fn test_convert_fills_geometry_and_dedups_capabilities() {
        let layout = MonitorLayout::new(vec![
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1920, 1080),
        ]);
        let id = ElementId::new(
            WindowHandle(7),
            RuntimeId::new(vec![42, 7, 1]),
            TreePath::Indices(vec![0, 2]),
        );
        let record = convert(&button(), &id, &layout);

        assert_eq!(record.id, "7:42.7.1:0.2");
        assert_eq!(record.automation_id.as_deref(), Some("btnSave"));
        assert_eq!(record.monitor_index, Some(1));
        assert_eq!(record.monitor_bounds, Some(Rect::new(80, 10, 80, 20)));
        assert_eq!(record.clickable_point, Some(Point::new(2040, 20)));
        assert_eq!(record.capabilities, vec![Capability::Invoke]);
        assert!(record.class_name.is_none());
    }

    #[test]
    fn test_convert_without_bounds() {
        let mut props = button();
        props.bounds = Some(Rect::new(0, 0, 0, 0));
        let id = ElementId::new(WindowHandle(7), None, TreePath::Fast);
        let record = convert(&props, &id, &MonitorLayout::default());
        assert!(record.bounds.is_none());
        assert!(record.clickable_point.is_none());
        assert!(record.monitor_index.is_none());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let id = ElementId::new(WindowHandle(7), None, TreePath::Fast);
        let record = convert(&button(), &id, &MonitorLayout::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["controlType"], "Button");
        assert_eq!(json["automationId"], "btnSave");
        assert_eq!(json["isEnabled"], true);
        assert!(json.get("children").is_none());
    }
}
