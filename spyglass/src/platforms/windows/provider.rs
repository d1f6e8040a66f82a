//! UI Automation accessibility provider

use super::element::WindowsUIElement;
use super::types::ThreadSafeWinUIAutomation;
use super::utils::{create_ui_automation_with_com_init, handle_to_native, uia_error};
use crate::failure::{ProviderError, ProviderResult};
use crate::platforms::{AccessibilityProvider, RawElement};
use crate::types::WindowHandle;
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Provider over the Windows UI Automation client API.
///
/// The automation object is created by [`AccessibilityProvider::initialize`],
/// which runs on the UI worker thread, and is never touched elsewhere.
#[derive(Default)]
pub struct WindowsProvider {
    automation: OnceLock<Arc<ThreadSafeWinUIAutomation>>,
}

impl std::fmt::Debug for WindowsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsProvider")
            .field("initialized", &self.automation.get().is_some())
            .finish()
    }
}

impl WindowsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn automation(&self) -> ProviderResult<&Arc<ThreadSafeWinUIAutomation>> {
        self.automation
            .get()
            .ok_or_else(|| ProviderError::transient("UI Automation is not initialised on this thread"))
    }
}

impl AccessibilityProvider for WindowsProvider {
    fn name(&self) -> &'static str {
        "uiautomation"
    }

    fn initialize(&self) -> ProviderResult<()> {
        if self.automation.get().is_some() {
            return Ok(());
        }
        let automation = create_ui_automation_with_com_init()?;
        #[allow(clippy::arc_with_non_send_sync)]
        let automation = Arc::new(ThreadSafeWinUIAutomation(automation));
        let _ = self.automation.set(automation);
        info!("UI Automation initialised");
        Ok(())
    }

    fn root(&self) -> ProviderResult<RawElement> {
        let automation = self.automation()?;
        let root = automation
            .0
            .get_root_element()
            .map_err(|e| uia_error("get_root_element", e))?;
        Ok(WindowsUIElement::wrap(root, automation))
    }

    fn element_from_handle(&self, handle: WindowHandle) -> ProviderResult<RawElement> {
        if handle.is_none() {
            return self.root();
        }
        let automation = self.automation()?;
        let element = automation
            .0
            .element_from_handle(handle_to_native(handle))
            .map_err(|e| uia_error(&format!("element_from_handle({handle})"), e))?;
        Ok(WindowsUIElement::wrap(element, automation))
    }

    fn supports_bulk_cache(&self) -> bool {
        true
    }
}
