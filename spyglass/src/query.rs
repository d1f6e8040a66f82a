use crate::element::{ControlType, ElementProperties};
use crate::platforms::NativeCondition;
use crate::types::{Rect, WindowHandle};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a query compares element names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum NameMatch {
    /// Case-insensitive equality.
    Exact(String),
    /// Case-insensitive substring.
    Contains(String),
    Regex(String),
}

/// Where a search or tree build starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RootSelector {
    #[default]
    Desktop,
    Window(WindowHandle),
    /// An element previously returned, by id.
    Element(String),
}

impl fmt::Display for RootSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootSelector::Desktop => f.write_str("desktop"),
            RootSelector::Window(handle) => write!(f, "window:{handle}"),
            RootSelector::Element(id) => write!(f, "within:{id}"),
        }
    }
}

/// Search request. Read-only for the duration of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub name: Option<NameMatch>,
    pub automation_id: Option<String>,
    pub control_type: Option<ControlType>,
    pub class_name: Option<String>,
    /// Id of the element to search under.
    pub within: Option<String>,
    pub window: Option<WindowHandle>,
    /// Only elements exactly this many levels below the root.
    pub exact_depth: Option<usize>,
    pub max_depth: Option<usize>,
    /// Only elements whose bounds intersect this rectangle.
    pub region: Option<Rect>,
    /// Id of a reference element; results are ordered by distance to it.
    pub near: Option<String>,
    /// Order results by descending area.
    pub prominent: bool,
    /// 1-based ordinal of the single match to return.
    pub match_index: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Exact(name.into()));
        self
    }

    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Contains(fragment.into()));
        self
    }

    pub fn name_regex(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Regex(pattern.into()));
        self
    }

    pub fn automation_id(mut self, id: impl Into<String>) -> Self {
        self.automation_id = Some(id.into());
        self
    }

    pub fn control_type(mut self, control_type: ControlType) -> Self {
        self.control_type = Some(control_type);
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn within(mut self, element_id: impl Into<String>) -> Self {
        self.within = Some(element_id.into());
        self
    }

    pub fn window(mut self, handle: WindowHandle) -> Self {
        self.window = Some(handle);
        self
    }

    pub fn exact_depth(mut self, depth: usize) -> Self {
        self.exact_depth = Some(depth);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    pub fn near(mut self, element_id: impl Into<String>) -> Self {
        self.near = Some(element_id.into());
        self
    }

    pub fn prominent(mut self) -> Self {
        self.prominent = true;
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.match_index = Some(index);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Scoping root; an element scope wins over a window scope.
    pub fn root_selector(&self) -> RootSelector {
        match (&self.within, self.window) {
            (Some(id), _) => RootSelector::Element(id.clone()),
            (None, Some(handle)) => RootSelector::Window(handle),
            (None, None) => RootSelector::Desktop,
        }
    }

    /// True when only predicates the provider can evaluate natively are set.
    pub fn is_simple(&self) -> bool {
        !matches!(
            self.name,
            Some(NameMatch::Contains(_)) | Some(NameMatch::Regex(_))
        ) && self.class_name.is_none()
            && self.exact_depth.is_none()
            && self.max_depth.is_none()
            && self.region.is_none()
    }

    /// AND of the simple predicates.
    pub fn native_condition(&self) -> NativeCondition {
        let mut parts = Vec::new();
        if let Some(NameMatch::Exact(name)) = &self.name {
            parts.push(NativeCondition::Name(name.clone()));
        }
        if let Some(id) = &self.automation_id {
            parts.push(NativeCondition::AutomationId(id.clone()));
        }
        if let Some(ct) = self.control_type {
            parts.push(NativeCondition::ControlType(ct));
        }
        NativeCondition::all(parts)
    }

    /// Class name predicate, checked during manual walks.
    pub fn matches_class(&self, properties: &ElementProperties) -> bool {
        match &self.class_name {
            Some(class_name) => properties.class_name.eq_ignore_ascii_case(class_name),
            None => true,
        }
    }

    /// Rejects queries that can never be satisfied as written.
    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.match_index == Some(0) {
            return Err(AutomationError::InvalidArgument(
                "match index is 1-based; 0 is not valid".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(AutomationError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }
        if let Some(region) = &self.region {
            if region.width < 0 || region.height < 0 {
                return Err(AutomationError::InvalidArgument(format!(
                    "region {region} has a negative size"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ct) = self.control_type {
            parts.push(format!("role:{ct}"));
        }
        match &self.name {
            Some(NameMatch::Exact(n)) => parts.push(format!("name:{n}")),
            Some(NameMatch::Contains(n)) => parts.push(format!("contains:{n}")),
            Some(NameMatch::Regex(n)) => parts.push(format!("regex:{n}")),
            None => {}
        }
        if let Some(id) = &self.automation_id {
            parts.push(format!("id:{id}"));
        }
        if let Some(class_name) = &self.class_name {
            parts.push(format!("classname:{class_name}"));
        }
        if let Some(id) = &self.within {
            parts.push(format!("within:{id}"));
        }
        if let Some(handle) = self.window {
            parts.push(format!("window:{handle}"));
        }
        if let Some(depth) = self.exact_depth {
            parts.push(format!("depth:{depth}"));
        }
        if let Some(depth) = self.max_depth {
            parts.push(format!("maxdepth:{depth}"));
        }
        if let Some(region) = &self.region {
            parts.push(format!("region:{region}"));
        }
        if let Some(id) = &self.near {
            parts.push(format!("near:{id}"));
        }
        if self.prominent {
            parts.push("prominent".to_string());
        }
        if let Some(index) = self.match_index {
            parts.push(format!("nth:{index}"));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit:{limit}"));
        }
        if parts.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&parts.join(" && "))
        }
    }
}

/// Parses selector strings such as `"role:Button && name:Save"`.
impl FromStr for Query {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut query = Query::new();
        for part in s.split("&&").map(str::trim) {
            if part.is_empty() || part == "*" {
                continue;
            }
            apply_part(&mut query, part)?;
        }
        query.validate()?;
        Ok(query)
    }
}

fn apply_part(query: &mut Query, part: &str) -> Result<(), AutomationError> {
    if part.eq_ignore_ascii_case("prominent") {
        query.prominent = true;
        return Ok(());
    }

    let (key, value) = match part.split_once(':') {
        Some((key, value)) => (key.trim().to_lowercase(), value.trim()),
        None => {
            // Bare role names such as "button" or "window".
            return match ControlType::parse(part) {
                Some(ct) => {
                    query.control_type = Some(ct);
                    Ok(())
                }
                None => Err(invalid(format!(
                    "Unknown selector format: \"{part}\". Use prefixes like 'role:', 'name:', 'contains:', 'regex:', 'id:', 'classname:', 'depth:', 'region:' or 'within:'."
                ))),
            };
        }
    };

    match key.as_str() {
        "role" | "controltype" => {
            let ct = ControlType::parse(value)
                .ok_or_else(|| invalid(format!("Unknown role '{value}'")))?;
            query.control_type = Some(ct);
        }
        "name" => query.name = Some(NameMatch::Exact(value.to_string())),
        "contains" => query.name = Some(NameMatch::Contains(value.to_string())),
        "regex" => query.name = Some(NameMatch::Regex(value.to_string())),
        "id" | "nativeid" | "automationid" => query.automation_id = Some(value.to_string()),
        "classname" => query.class_name = Some(value.to_string()),
        "depth" => query.exact_depth = Some(parse_number(&key, value)?),
        "maxdepth" => query.max_depth = Some(parse_number(&key, value)?),
        "nth" => query.match_index = Some(parse_number(&key, value)?),
        "limit" => query.limit = Some(parse_number(&key, value)?),
        "window" => {
            let handle = value
                .parse::<i64>()
                .map_err(|_| invalid(format!("Invalid window handle '{value}'")))?;
            query.window = Some(WindowHandle(handle));
        }
        "within" => query.within = Some(value.to_string()),
        "near" => query.near = Some(value.to_string()),
        "region" => {
            let region = value
                .parse::<Rect>()
                .map_err(|e| invalid(format!("Invalid region '{value}': {e}")))?;
            query.region = Some(region);
        }
        _ => return Err(invalid(format!("Unknown selector prefix '{key}:'"))),
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<usize, AutomationError> {
    value
        .parse::<usize>()
        .map_err(|_| invalid(format!("Invalid number for {key}: '{value}'")))
}

fn invalid(message: String) -> AutomationError {
    AutomationError::InvalidArgument(message)
}
