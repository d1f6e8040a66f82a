//! Physical input, window activation and monitor geometry for Windows

use crate::services::{CoordinateService, InputService, WindowActivator};
use crate::types::{Point, Rect, WindowHandle};
use crate::AutomationError;
use tracing::debug;
use uiautomation::inputs::{Keyboard, Mouse};
use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOF_PRIMARY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

/// Mouse and keyboard through `SendInput`, and foreground activation.
#[derive(Debug, Default)]
pub struct DesktopInput;

impl InputService for DesktopInput {
    fn click_at(&self, point: Point) -> Result<(), AutomationError> {
        debug!("clicking at ({}, {})", point.x, point.y);
        Mouse::default()
            .click(uiautomation::types::Point::new(point.x, point.y))
            .map_err(|e| AutomationError::Internal(format!("mouse click failed: {e}")))
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        Keyboard::default()
            .interval(10)
            .send_text(text)
            .map_err(|e| AutomationError::Internal(format!("keyboard input failed: {e}")))
    }
}

impl WindowActivator for DesktopInput {
    fn activate(&self, handle: WindowHandle) -> bool {
        if handle.is_none() {
            return false;
        }
        unsafe {
            let hwnd = HWND(handle.0 as isize as *mut core::ffi::c_void);

            // Check if the window is minimized and restore it if needed
            if IsIconic(hwnd).as_bool() {
                debug!("Window is minimized, restoring it");
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
            let _ = BringWindowToTop(hwnd);
            let activated = SetForegroundWindow(hwnd).as_bool();
            if !activated {
                debug!("SetForegroundWindow failed, but continuing");
            }
            activated
        }
    }
}

/// Monitor rectangles read once through `EnumDisplayMonitors`, primary first.
#[derive(Debug, Clone)]
pub struct DisplayMonitors {
    layout: crate::services::MonitorLayout,
}

impl DisplayMonitors {
    pub fn detect() -> Result<Self, AutomationError> {
        let mut monitors: Vec<(Rect, bool)> = Vec::new();
        unsafe {
            let ok = EnumDisplayMonitors(
                None,
                None,
                Some(collect_monitor),
                LPARAM(&mut monitors as *mut Vec<(Rect, bool)> as isize),
            );
            if !ok.as_bool() {
                return Err(AutomationError::Internal(
                    "EnumDisplayMonitors failed".to_string(),
                ));
            }
        }
        // Stable sort keeps enumeration order among non-primary monitors
        monitors.sort_by_key(|(_, primary)| !*primary);
        debug!("detected {} monitor(s)", monitors.len());
        Ok(Self {
            layout: crate::services::MonitorLayout::new(monitors.into_iter().map(|(r, _)| r).collect()),
        })
    }
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let monitors = &mut *(data.0 as *mut Vec<(Rect, bool)>);
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if GetMonitorInfoW(monitor, &mut info).as_bool() {
        let r = info.rcMonitor;
        monitors.push((
            Rect::new(r.left, r.top, r.right - r.left, r.bottom - r.top),
            info.dwFlags & MONITORINFOF_PRIMARY != 0,
        ));
    }
    BOOL(1)
}

impl CoordinateService for DisplayMonitors {
    fn to_monitor_relative(&self, rect: &Rect) -> (Rect, usize) {
        self.layout.to_monitor_relative(rect)
    }

    fn monitor_origin(&self, index: usize) -> Point {
        self.layout.monitor_origin(index)
    }
}
