//! Interfaces of the external collaborators this crate consumes
//!
//! Monitor geometry, window activation, input injection and on-screen
//! overlays belong to other subsystems. The engine only talks to them through
//! these traits; platform modules provide the concrete implementations.

use crate::types::{Point, Rect, WindowHandle};
use crate::AutomationError;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Pure coordinate conversions between absolute and monitor-relative space.
pub trait CoordinateService: Send + Sync + Debug {
    /// Converts an absolute rectangle into one relative to the monitor that
    /// contains its centre, returning the monitor index alongside.
    fn to_monitor_relative(&self, rect: &Rect) -> (Rect, usize);

    /// Absolute origin of the monitor with the given index.
    fn monitor_origin(&self, index: usize) -> Point;
}

/// Best-effort foreground activation of a window.
pub trait WindowActivator: Send + Sync + Debug {
    fn activate(&self, handle: WindowHandle) -> bool;
}

/// Last-resort physical input, used only when no interaction pattern applies.
pub trait InputService: Send + Sync + Debug {
    fn click_at(&self, point: Point) -> Result<(), AutomationError>;
    fn type_text(&self, text: &str) -> Result<(), AutomationError>;
}

/// Draws and removes a frame around a screen rectangle.
pub trait OverlayService: Send + Sync + Debug {
    /// Shows a frame until `should_close` flips to true. Implementations may
    /// spawn a thread and return its handle so the caller can join it.
    fn show(
        &self,
        bounds: Rect,
        should_close: Arc<AtomicBool>,
    ) -> Result<Option<std::thread::JoinHandle<()>>, AutomationError>;
}

/// Monitor layout given as a list of absolute monitor rectangles.
///
/// The first monitor is the primary one. Used on platforms without a native
/// implementation and by tests.
#[derive(Debug, Clone)]
pub struct MonitorLayout {
    monitors: Vec<Rect>,
}

impl MonitorLayout {
    pub fn new(monitors: Vec<Rect>) -> Self {
        Self { monitors }
    }

    pub fn single(width: i32, height: i32) -> Self {
        Self::new(vec![Rect::new(0, 0, width, height)])
    }
}

impl Default for MonitorLayout {
    fn default() -> Self {
        Self::single(1920, 1080)
    }
}

impl CoordinateService for MonitorLayout {
    fn to_monitor_relative(&self, rect: &Rect) -> (Rect, usize) {
        let center = rect.center();
        let index = self
            .monitors
            .iter()
            .position(|m| m.contains_point(&center))
            .unwrap_or(0);
        let origin = self.monitor_origin(index);
        (rect.offset(origin.x.saturating_neg(), origin.y.saturating_neg()), index)
    }

    fn monitor_origin(&self, index: usize) -> Point {
        self.monitors
            .get(index)
            .map(|m| Point::new(m.x, m.y))
            .unwrap_or_default()
    }
}

/// Input and activation sink that performs nothing but remembers requests.
#[derive(Debug, Default)]
pub struct RecordingInput {
    clicks: Mutex<Vec<Point>>,
    typed: Mutex<Vec<String>>,
    activations: Mutex<Vec<WindowHandle>>,
}

impl RecordingInput {
    pub fn clicks(&self) -> Vec<Point> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn activations(&self) -> Vec<WindowHandle> {
        self.activations.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl InputService for RecordingInput {
    fn click_at(&self, point: Point) -> Result<(), AutomationError> {
        self.clicks
            .lock()
            .map_err(|e| AutomationError::Internal(format!("input log poisoned: {e}")))?
            .push(point);
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.typed
            .lock()
            .map_err(|e| AutomationError::Internal(format!("input log poisoned: {e}")))?
            .push(text.to_string());
        Ok(())
    }
}

impl WindowActivator for RecordingInput {
    fn activate(&self, handle: WindowHandle) -> bool {
        match self.activations.lock() {
            Ok(mut log) => {
                log.push(handle);
                true
            }
            Err(_) => false,
        }
    }
}

/// Overlay that keeps track of the frames currently shown instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    shown: Mutex<Vec<(Rect, Arc<AtomicBool>)>>,
}

impl RecordingOverlay {
    /// Rectangles whose handles have not been closed yet.
    pub fn visible(&self) -> Vec<Rect> {
        self.shown
            .lock()
            .map(|shown| {
                shown
                    .iter()
                    .filter(|(_, closed)| !closed.load(Ordering::SeqCst))
                    .map(|(rect, _)| *rect)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl OverlayService for RecordingOverlay {
    fn show(
        &self,
        bounds: Rect,
        should_close: Arc<AtomicBool>,
    ) -> Result<Option<std::thread::JoinHandle<()>>, AutomationError> {
        self.shown
            .lock()
            .map_err(|e| AutomationError::Internal(format!("overlay log poisoned: {e}")))?
            .push((bounds, should_close));
        Ok(None)
    }
}
