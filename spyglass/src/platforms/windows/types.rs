//! Send/Sync wrappers for UI Automation COM objects

use std::sync::Arc;
use uiautomation::UIAutomation;

/// Thread-safe wrapper for the UIAutomation COM object.
///
/// Only dereferenced on the UI worker thread that created it.
pub(crate) struct ThreadSafeWinUIAutomation(pub(crate) UIAutomation);

// Safety: every use goes through the single UI worker thread
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

/// Thread-safe wrapper for UIElement
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIElement(pub(crate) Arc<uiautomation::UIElement>);

// Safety: UIElement is only touched from the UI worker thread
unsafe impl Send for ThreadSafeWinUIElement {}
unsafe impl Sync for ThreadSafeWinUIElement {}
