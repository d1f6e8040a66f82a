//! Windows platform implementation
//!
//! This module provides the accessibility provider over the Windows UI
//! Automation API through the uiautomation crate, plus the input, overlay
//! and monitor services used next to it.

pub mod element;
pub mod highlighting;
pub mod input;
pub mod provider;
pub(crate) mod types;
pub(crate) mod utils;

pub use element::WindowsUIElement;
pub use highlighting::GdiOverlay;
pub use input::{DesktopInput, DisplayMonitors};
pub use provider::WindowsProvider;

use crate::platforms::Platform;
use crate::AutomationError;
use std::sync::Arc;

/// Native platform. The provider itself initialises later, on the UI worker.
pub fn create_platform() -> Result<Platform, AutomationError> {
    let input = Arc::new(DesktopInput);
    Ok(Platform {
        provider: Arc::new(WindowsProvider::new()),
        coordinates: Arc::new(DisplayMonitors::detect()?),
        activator: input.clone(),
        input,
        overlay: Arc::new(GdiOverlay),
    })
}
