//! Highlight frames owned by explicit handles
//!
//! A frame stays on screen until its [`HighlightHandle`] is closed, dropped
//! or its duration elapses. There is no process-wide "current highlight":
//! callers hold as many handles as they like.

use crate::services::OverlayService;
use crate::types::Rect;
use crate::AutomationError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Owner of one visible frame. The frame is removed when the handle is
/// closed or dropped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightHandle {
    pub id: Uuid,
    pub bounds: Rect,
    #[serde(skip)]
    should_close: Arc<AtomicBool>,
    #[serde(skip)]
    handle: Option<thread::JoinHandle<()>>,
}

impl HighlightHandle {
    pub fn is_closed(&self) -> bool {
        self.should_close.load(Ordering::SeqCst)
    }

    /// Removes the frame and waits for the overlay thread, if any.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.should_close.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HighlightHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Shows a frame around `bounds`. With a duration, a timer thread closes the
/// frame once it elapses even if the handle is still held.
pub fn highlight(
    bounds: Rect,
    overlay: &dyn OverlayService,
    duration: Option<Duration>,
) -> Result<HighlightHandle, AutomationError> {
    if bounds.is_empty() {
        return Err(AutomationError::InvalidArgument(format!(
            "cannot highlight an empty rectangle ({bounds})"
        )));
    }

    let should_close = Arc::new(AtomicBool::new(false));
    let overlay_thread = overlay.show(bounds, should_close.clone())?;

    if let Some(duration) = duration {
        let flag = should_close.clone();
        thread::Builder::new()
            .name("spyglass-highlight-timer".to_string())
            .spawn(move || {
                thread::sleep(duration);
                flag.store(true, Ordering::SeqCst);
            })
            .map_err(|e| AutomationError::Internal(format!("failed to start highlight timer: {e}")))?;
    }

    let handle = HighlightHandle {
        id: Uuid::new_v4(),
        bounds,
        should_close,
        handle: overlay_thread,
    };
    debug!("highlight {} shown at {}", handle.id, bounds);
    Ok(handle)
}

/// Removes a frame. Hiding an already closed frame is a no-op.
pub fn hide(handle: HighlightHandle) {
    debug!("hiding highlight {}", handle.id);
    handle.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RecordingOverlay;

    #[test]
    fn test_handles_are_independent() {
        let overlay = RecordingOverlay::default();
        let first = highlight(Rect::new(0, 0, 10, 10), &overlay, None).unwrap();
        let second = highlight(Rect::new(20, 20, 10, 10), &overlay, None).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(overlay.visible().len(), 2);

        hide(first);
        assert_eq!(overlay.visible(), vec![Rect::new(20, 20, 10, 10)]);
        assert!(!second.is_closed());
    }

    #[test]
    fn test_drop_closes_frame() {
        let overlay = RecordingOverlay::default();
        {
            let _handle = highlight(Rect::new(0, 0, 10, 10), &overlay, None).unwrap();
            assert_eq!(overlay.visible().len(), 1);
        }
        assert!(overlay.visible().is_empty());
    }

    #[test]
    fn test_duration_expires() {
        let overlay = RecordingOverlay::default();
        let handle = highlight(Rect::new(0, 0, 10, 10), &overlay, Some(Duration::from_millis(20))).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_closed() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_closed());
        assert!(overlay.visible().is_empty());
    }

    #[test]
    fn test_empty_bounds_rejected() {
        let overlay = RecordingOverlay::default();
        let err = highlight(Rect::new(0, 0, 0, 10), &overlay, None).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
    }

    #[test]
    fn test_handle_serializes_id_and_bounds() {
        let overlay = RecordingOverlay::default();
        let handle = highlight(Rect::new(1, 2, 3, 4), &overlay, None).unwrap();
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["id"], handle.id.to_string());
        assert_eq!(json["bounds"]["width"], 3);
    }
}
