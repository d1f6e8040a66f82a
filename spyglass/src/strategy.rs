//! Framework detection and traversal profiles
//!
//! Different UI technologies publish very differently shaped trees. Chromium
//! based windows bury content fifteen levels deep behind anonymous groups,
//! while classic dialogs rarely go past five. The profile picked here bounds
//! the walk and decides how filtering composes results.

use crate::element::ElementProperties;
use crate::platforms::RawElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// UI technology that produced a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Chromium,
    Win32,
    WinForms,
    Wpf,
    Xaml,
    Unknown,
}

impl Framework {
    /// Lower rank wins when the root and its children disagree.
    fn rank(self) -> u8 {
        match self {
            Framework::Chromium => 0,
            Framework::Wpf => 1,
            Framework::Xaml => 2,
            Framework::WinForms => 3,
            Framework::Win32 => 4,
            Framework::Unknown => 5,
        }
    }

    pub fn profile(self) -> FrameworkStrategy {
        let (max_depth, filter_mode) = match self {
            Framework::Chromium | Framework::Unknown => (15, FilterMode::PostHoc),
            Framework::Win32 | Framework::WinForms => (5, FilterMode::Inline),
            Framework::Wpf | Framework::Xaml => (10, FilterMode::Inline),
        };
        FrameworkStrategy {
            framework: self,
            max_depth,
            filter_mode,
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Chromium => "chromium",
            Framework::Win32 => "win32",
            Framework::WinForms => "winforms",
            Framework::Wpf => "wpf",
            Framework::Xaml => "xaml",
            Framework::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// How a control-type filter composes the resulting tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Prune while descending; a non-matching node is replaced by its first
    /// matching descendant.
    Inline,
    /// Descend unconditionally and filter while composing, keeping
    /// containers that group several matches.
    PostHoc,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "inline" => Ok(FilterMode::Inline),
            "posthoc" => Ok(FilterMode::PostHoc),
            other => Err(format!("unknown filter mode '{other}'")),
        }
    }
}

/// Traversal profile for one root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkStrategy {
    pub framework: Framework,
    pub max_depth: usize,
    pub filter_mode: FilterMode,
}

impl Default for FrameworkStrategy {
    fn default() -> Self {
        Framework::Unknown.profile()
    }
}

/// Picks the traversal profile for `root` from its own metadata and that of
/// its immediate children. Read failures fall back to `Unknown`.
pub fn detect(root: &RawElement) -> FrameworkStrategy {
    detect_framework(root).profile()
}

pub fn detect_framework(root: &RawElement) -> Framework {
    let properties = match root.properties() {
        Ok(p) => p,
        Err(e) => {
            debug!("framework detection: root unreadable: {}", e);
            return Framework::Unknown;
        }
    };
    let mut best = classify(&properties);

    let children = match root.children() {
        Ok(children) => children,
        Err(e) => {
            debug!("framework detection: children unreadable: {}", e);
            return Framework::Unknown;
        }
    };
    for child in children {
        match child.properties() {
            Ok(p) => {
                let candidate = classify(&p);
                if candidate.rank() < best.rank() {
                    best = candidate;
                }
            }
            Err(e) => {
                debug!("framework detection: child unreadable: {}", e);
                return Framework::Unknown;
            }
        }
    }
    best
}

/// Classifies a single element from its framework id and class name.
pub fn classify(properties: &ElementProperties) -> Framework {
    let framework_id = properties.framework_id.to_lowercase();
    let class_name = properties.class_name.as_str();

    if framework_id == "chrome"
        || class_name.starts_with("Chrome_")
        || class_name == "Intermediate D3D Window"
    {
        return Framework::Chromium;
    }
    if framework_id == "wpf" || class_name.starts_with("HwndWrapper") {
        return Framework::Wpf;
    }
    if framework_id == "xaml"
        || framework_id == "directui"
        || class_name == "Windows.UI.Core.CoreWindow"
        || class_name == "ApplicationFrameWindow"
    {
        return Framework::Xaml;
    }
    if framework_id == "winform" || class_name.starts_with("WindowsForms10") {
        return Framework::WinForms;
    }
    if framework_id == "win32" || class_name == "#32770" {
        return Framework::Win32;
    }
    Framework::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(framework_id: &str, class_name: &str) -> ElementProperties {
        ElementProperties {
            framework_id: framework_id.to_string(),
            class_name: class_name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_by_class_and_framework_id() {
        assert_eq!(classify(&props("Win32", "Chrome_WidgetWin_1")), Framework::Chromium);
        assert_eq!(classify(&props("", "HwndWrapper[App;;1]")), Framework::Wpf);
        assert_eq!(
            classify(&props("", "WindowsForms10.Window.8.app.0.141b42a_r6_ad1")),
            Framework::WinForms
        );
        assert_eq!(classify(&props("XAML", "")), Framework::Xaml);
        assert_eq!(classify(&props("", "#32770")), Framework::Win32);
        assert_eq!(classify(&props("", "SomethingElse")), Framework::Unknown);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(Framework::Chromium.profile().max_depth, 15);
        assert_eq!(Framework::Chromium.profile().filter_mode, FilterMode::PostHoc);
        assert_eq!(Framework::Win32.profile().max_depth, 5);
        assert_eq!(Framework::WinForms.profile().filter_mode, FilterMode::Inline);
        assert_eq!(Framework::Wpf.profile().max_depth, 10);
        assert_eq!(FrameworkStrategy::default().framework, Framework::Unknown);
        assert_eq!(FrameworkStrategy::default().filter_mode, FilterMode::PostHoc);
    }

    #[test]
    fn test_filter_mode_parsing() {
        assert_eq!("inline".parse::<FilterMode>(), Ok(FilterMode::Inline));
        assert_eq!("post-hoc".parse::<FilterMode>(), Ok(FilterMode::PostHoc));
        assert_eq!("POST_HOC".parse::<FilterMode>(), Ok(FilterMode::PostHoc));
        assert!("sideways".parse::<FilterMode>().is_err());
    }
}
