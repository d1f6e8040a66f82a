
use crate::platforms::memory::{ElementSpec, MemoryDesktop};
use crate::services::{MonitorLayout, RecordingInput, RecordingOverlay};
use crate::{Capability, ControlType, EngineConfig, Platform, Spyglass, ToggleState, WindowHandle};
use std::sync::Arc;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_thread_ids(true)
        .with_test_writer()
        .try_init();
}

/// Engine over a simulated desktop, with the recording services kept at hand.
pub struct Harness {
    pub desktop: MemoryDesktop,
    pub spyglass: Spyglass,
    pub input: Arc<RecordingInput>,
    pub overlay: Arc<RecordingOverlay>,
    pub window: WindowHandle,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            wait_poll_initial_ms: 10,
            wait_poll_max_ms: 50,
            highlight_duration_ms: 0,
            ..Default::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let desktop = MemoryDesktop::new();
        let window = desktop.add_window(settings_window());
        let input = Arc::new(RecordingInput::default());
        let overlay = Arc::new(RecordingOverlay::default());
        let platform = Platform {
            provider: Arc::new(desktop.provider()),
            coordinates: Arc::new(MonitorLayout::default()),
            activator: input.clone(),
            input: input.clone(),
            overlay: overlay.clone(),
        };
        let spyglass = Spyglass::with_platform(platform, config).unwrap();
        Self {
            desktop,
            spyglass,
            input,
            overlay,
            window,
        }
    }
}

/// A small settings dialog covering every action path.
pub fn settings_window() -> ElementSpec {
    ElementSpec::window("Settings")
        .bounds(100, 100, 600, 420)
        .children([
            ElementSpec::new(ControlType::Edit, "Display name")
                .automation_id("txtName")
                .bounds(120, 140, 300, 24)
                .capability(Capability::Value)
                .value("guest"),
            ElementSpec::new(ControlType::CheckBox, "Remember me")
                .bounds(120, 180, 150, 20)
                .capability(Capability::Toggle)
                .toggle_state(ToggleState::Off),
            ElementSpec::new(ControlType::Text, "Status")
                .bounds(120, 220, 200, 20),
            ElementSpec::new(ControlType::Pane, "Buttons")
                .bounds(100, 440, 600, 60)
                .children([
                    ElementSpec::new(ControlType::Button, "OK")
                        .automation_id("btnOk")
                        .bounds(480, 450, 80, 30)
                        .capability(Capability::Invoke),
                    ElementSpec::new(ControlType::Button, "Apply")
                        .bounds(390, 450, 80, 30)
                        .disabled(),
                ]),
        ])
}
