//! Frame overlay drawn with GDI on a layered, click-through window

use crate::services::OverlayService;
use crate::types::Rect;
use crate::AutomationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreatePen, CreateSolidBrush, DeleteObject, FillRect, GetDC, Rectangle, ReleaseDC,
    SelectObject, HBRUSH, HGDIOBJ, PS_SOLID,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect, LoadCursorW,
    PeekMessageW, RegisterClassExW, SetLayeredWindowAttributes, ShowWindow, TranslateMessage,
    HICON, IDC_ARROW, LWA_COLORKEY, MSG, PM_REMOVE, SW_SHOWNOACTIVATE, WM_DESTROY, WM_PAINT,
    WNDCLASSEXW, WNDCLASS_STYLES, WS_EX_LAYERED, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

const OVERLAY_CLASS_NAME: PCWSTR = w!("SpyglassHighlightOverlay");
const BORDER_COLOR_BGR: u32 = 0x0000FF;
const BORDER_WIDTH: i32 = 6;

/// Overlay service drawing a red frame in its own thread until closed.
#[derive(Debug, Default)]
pub struct GdiOverlay;

impl OverlayService for GdiOverlay {
    fn show(
        &self,
        bounds: Rect,
        should_close: Arc<AtomicBool>,
    ) -> Result<Option<thread::JoinHandle<()>>, AutomationError> {
        debug!("Highlight coordinates (physical pixels): {}", bounds);
        let handle = thread::Builder::new()
            .name("spyglass-overlay".to_string())
            .spawn(move || {
                let hwnd = match create_and_show_overlay(bounds) {
                    Ok(hwnd) => hwnd,
                    Err(e) => {
                        error!("could not show frame at {}: {}", bounds, e);
                        return;
                    }
                };
                while !should_close.load(Ordering::SeqCst) {
                    pump_messages();
                    thread::sleep(Duration::from_millis(50));
                }
                unsafe {
                    let _ = DestroyWindow(hwnd);
                }
            })
            .map_err(|e| AutomationError::Internal(format!("failed to start overlay thread: {e}")))?;
        Ok(Some(handle))
    }
}

fn pump_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

/// Creates and shows a transparent overlay window covering `bounds` and draws the frame
fn create_and_show_overlay(bounds: Rect) -> Result<HWND, AutomationError> {
    unsafe {
        let instance = GetModuleHandleW(None)
            .map_err(|e| AutomationError::Internal(format!("GetModuleHandleW failed: {e}")))?;

        // A second registration fails harmlessly; the class is process-wide
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: WNDCLASS_STYLES::default(),
            lpfnWndProc: Some(frame_window_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: instance.into(),
            hIcon: HICON::default(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: HBRUSH::default(),
            lpszMenuName: PCWSTR::null(),
            lpszClassName: OVERLAY_CLASS_NAME,
            hIconSm: HICON::default(),
        };
        if RegisterClassExW(&wc) == 0 {
            debug!("frame window class already registered");
        }

        let hwnd = CreateWindowExW(
            WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            OVERLAY_CLASS_NAME,
            w!("Spyglass Frame"),
            WS_POPUP,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
            None,
            None,
            Some(instance.into()),
            None,
        )
        .map_err(|e| AutomationError::Internal(format!("CreateWindowExW failed: {e}")))?;

        // Black is the colour key, so only the frame stays visible
        SetLayeredWindowAttributes(hwnd, COLORREF(0x000000), 255, LWA_COLORKEY).map_err(|e| {
            AutomationError::Internal(format!("SetLayeredWindowAttributes failed: {e}"))
        })?;

        let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        draw_frame(hwnd);
        Ok(hwnd)
    }
}

/// Draw the frame over the whole client area
fn draw_frame(hwnd: HWND) {
    unsafe {
        let hdc = GetDC(Some(hwnd));
        if hdc.is_invalid() {
            return;
        }

        let mut client = RECT::default();
        let _ = GetClientRect(hwnd, &mut client);
        let black_brush = CreateSolidBrush(COLORREF(0x000000));
        let _ = FillRect(hdc, &client, black_brush);

        let hpen = CreatePen(PS_SOLID, BORDER_WIDTH, COLORREF(BORDER_COLOR_BGR));
        let old_pen = SelectObject(hdc, HGDIOBJ(hpen.0));
        let old_brush = SelectObject(hdc, HGDIOBJ(black_brush.0));
        let _ = Rectangle(hdc, 2, 2, client.right - 2, client.bottom - 2);

        SelectObject(hdc, old_brush);
        SelectObject(hdc, old_pen);
        let _ = DeleteObject(black_brush.into());
        let _ = DeleteObject(hpen.into());
        let _ = ReleaseDC(Some(hwnd), hdc);
    }
}

unsafe extern "system" fn frame_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_DESTROY => LRESULT(0),
        WM_PAINT => {
            draw_frame(hwnd);
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
