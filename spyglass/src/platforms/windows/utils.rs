//! COM initialisation and error/handle conversions for UI Automation

use crate::element::{ControlType, ElementProperties};
use crate::element_id::RuntimeId;
use crate::failure::ProviderError;
use crate::types::{Rect, WindowHandle};
use uiautomation::types::{Handle, UIProperty};
use uiautomation::variants::{SafeArray, Variant};
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

/// RPC_E_CHANGED_MODE: COM is already initialised on this thread.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Helper function to create UIAutomation instance with proper COM initialization
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, ProviderError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(ProviderError::from_code(
                hr.0,
                format!("Failed to initialize COM: {hr}"),
            ));
        }
    }

    UIAutomation::new_direct().map_err(|e| uia_error("UIAutomation::new_direct", e))
}

/// Wraps a uiautomation error, classifying its HRESULT.
pub(crate) fn uia_error(context: &str, error: uiautomation::Error) -> ProviderError {
    ProviderError::from_code(error.code(), format!("{context}: {error}"))
}

pub(crate) fn handle_to_native(handle: WindowHandle) -> Handle {
    Handle::from(handle.0 as isize)
}

pub(crate) fn native_to_handle(handle: Handle) -> WindowHandle {
    let hwnd: HWND = handle.into();
    WindowHandle(hwnd.0 as isize as i64)
}

/// Decodes a `RuntimeId` property value (an `i32` SAFEARRAY).
pub(crate) fn runtime_id_from_variant(value: &Variant) -> Option<RuntimeId> {
    let array = SafeArray::try_from(value).ok()?;
    let values = Vec::<i32>::try_from(&array).ok()?;
    RuntimeId::new(values)
}

/// Encodes a runtime id for use in a `RuntimeId` property condition.
pub(crate) fn runtime_id_to_variant(rid: &RuntimeId) -> Option<Variant> {
    let array = SafeArray::try_from(rid.as_slice()).ok()?;
    Some(Variant::from(array))
}

/// Reads the full property bundle, from the cache when `cached` is set.
pub(crate) fn read_properties(
    element: &uiautomation::UIElement,
    cached: bool,
) -> Result<ElementProperties, ProviderError> {
    // Control type doubles as the liveness probe: if it fails, the element is gone.
    let control_type = if cached {
        element.get_cached_control_type()
    } else {
        element.get_control_type()
    }
    .map_err(|e| uia_error("control type", e))?;

    let name = if cached {
        element.get_cached_name()
    } else {
        element.get_name()
    };
    let automation_id = if cached {
        element.get_cached_automation_id()
    } else {
        element.get_automation_id()
    };
    let class_name = if cached {
        element.get_cached_classname()
    } else {
        element.get_classname()
    };
    let framework_id = if cached {
        element.get_cached_framework_id()
    } else {
        element.get_framework_id()
    };
    let bounds = if cached {
        element.get_cached_bounding_rectangle()
    } else {
        element.get_bounding_rectangle()
    };
    let is_enabled = if cached {
        element.is_cached_enabled()
    } else {
        element.is_enabled()
    };
    let is_offscreen = if cached {
        element.is_cached_offscreen()
    } else {
        element.is_offscreen()
    };
    let handle = if cached {
        element.get_cached_native_window_handle()
    } else {
        element.get_native_window_handle()
    };
    let runtime_id = if cached {
        element
            .get_cached_property_value(UIProperty::RuntimeId)
            .ok()
            .and_then(|v| runtime_id_from_variant(&v))
    } else {
        element.get_runtime_id().ok().and_then(RuntimeId::new)
    };
    let process_id = if cached {
        element
            .get_cached_property_value(UIProperty::ProcessId)
            .ok()
            .and_then(|v| i32::try_from(v).ok())
            .map(|pid| pid as u32)
    } else {
        element.get_process_id().ok().map(|pid| pid as u32)
    };

    let mut properties = ElementProperties {
        name: name.unwrap_or_default(),
        automation_id: automation_id.unwrap_or_default(),
        control_type: ControlType::from_uia_id(control_type as i32),
        class_name: class_name.unwrap_or_default(),
        framework_id: framework_id.unwrap_or_default(),
        bounds: bounds
            .ok()
            .map(|r| Rect::new(r.get_left(), r.get_top(), r.get_width(), r.get_height())),
        is_enabled: is_enabled.unwrap_or(false),
        is_offscreen: is_offscreen.unwrap_or(false),
        native_window_handle: handle.map(native_to_handle).unwrap_or_default(),
        runtime_id,
        process_id,
        ..Default::default()
    };
    super::element::read_patterns(element, cached, &mut properties);
    Ok(properties)
}
