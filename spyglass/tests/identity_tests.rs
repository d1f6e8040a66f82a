//! Element ids survive a round trip and go stale with their window.

use spyglass::platforms::memory::{ElementSpec, MemoryDesktop};
use spyglass::{ControlType, EngineConfig, IdMode, Platform, Query, RootSelector, Spyglass};

fn notepad() -> ElementSpec {
    ElementSpec::window("Untitled - Notepad")
        .class_name("Notepad")
        .bounds(0, 0, 800, 600)
        .children([
            ElementSpec::new(ControlType::MenuBar, "Application").children([
                ElementSpec::new(ControlType::MenuItem, "File"),
                ElementSpec::new(ControlType::MenuItem, "Edit"),
                ElementSpec::new(ControlType::MenuItem, "Format"),
            ]),
            ElementSpec::new(ControlType::Document, "Text Editor").bounds(0, 40, 800, 540),
            ElementSpec::new(ControlType::StatusBar, "Status Bar")
                .child(ElementSpec::new(ControlType::Text, "Ln 1, Col 1")),
        ])
}

fn engine(desktop: &MemoryDesktop, config: EngineConfig) -> Spyglass {
    Spyglass::with_platform(Platform::in_memory(desktop), config).unwrap()
}

#[tokio::test]
async fn every_tree_node_round_trips_through_resolve() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(notepad());
    let spyglass = engine(&desktop, EngineConfig::default());

    let tree = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert_eq!(tree.tree.subtree_len(), 8);

    for node in tree.tree.walk() {
        let resolved = spyglass.resolve(&node.id).await.unwrap();
        let element = resolved.element.unwrap_or_else(|| panic!("{} did not resolve", node.id));
        assert_eq!(element.id, node.id);
        assert_eq!(element.name, node.name);
    }
}

#[tokio::test]
async fn fast_ids_round_trip_in_fast_mode() {
    let desktop = MemoryDesktop::new();
    desktop.add_window(notepad());
    let config = EngineConfig {
        id_mode: IdMode::Fast,
        ..Default::default()
    };
    let spyglass = engine(&desktop, config);

    let found = spyglass
        .find(&Query::new().control_type(ControlType::MenuItem))
        .await
        .unwrap();
    assert_eq!(found.elements.len(), 3);
    for element in &found.elements {
        assert!(element.id.ends_with(":fast"), "{}", element.id);
        let resolved = spyglass.resolve(&element.id).await.unwrap().element.unwrap();
        assert_eq!(resolved.id, element.id);
    }
}

#[tokio::test]
async fn ids_go_stale_when_their_window_closes() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(notepad());
    let other = desktop.add_window(ElementSpec::window("Calculator"));
    let spyglass = engine(&desktop, EngineConfig::default());

    let tree = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert!(desktop.close_window(window));

    for node in tree.tree.walk() {
        let resolved = spyglass.resolve(&node.id).await.unwrap();
        assert!(resolved.element.is_none(), "{} still resolves", node.id);
    }

    // Other windows are untouched.
    let found = spyglass.find(&Query::new().name("Calculator")).await.unwrap();
    assert_eq!(found.elements.len(), 1);
    assert!(found.elements[0].id.starts_with(&format!("{other}:")));
}

#[tokio::test]
async fn malformed_ids_resolve_to_nothing() {
    let desktop = MemoryDesktop::new();
    desktop.add_window(notepad());
    let spyglass = engine(&desktop, EngineConfig::default());

    for id in ["not-a-valid-id", "", "1:2", "abc:42.1:0", "4096:42.1:bogus"] {
        let resolved = spyglass.resolve(id).await.unwrap();
        assert!(resolved.element.is_none(), "{id:?} resolved");
    }
}

#[tokio::test]
async fn runtime_id_wins_over_a_shifted_path() {
    let desktop = MemoryDesktop::new();
    desktop.add_window(notepad());
    let spyglass = engine(&desktop, EngineConfig::default());

    let status = spyglass.find(&Query::new().name("Status Bar")).await.unwrap();
    let before = status.elements[0].clone();

    // Shift the status bar one sibling to the right.
    let window_rid = desktop.runtime_id_of("Untitled - Notepad").unwrap();
    desktop
        .insert_child(&window_rid, 0, ElementSpec::new(ControlType::ToolBar, "Ribbon"))
        .unwrap();

    let resolved = spyglass.resolve(&before.id).await.unwrap().element.unwrap();
    assert_eq!(resolved.name, "Status Bar");
    assert_ne!(resolved.id, before.id);
}

/// Notepad as a provider that only exposes runtime ids on the window.
fn notepad_without_runtime_ids() -> ElementSpec {
    ElementSpec::window("Untitled - Notepad").children([
        ElementSpec::new(ControlType::MenuBar, "Application").without_runtime_id(),
        ElementSpec::new(ControlType::Document, "Text Editor").without_runtime_id(),
        ElementSpec::new(ControlType::StatusBar, "Status Bar").without_runtime_id(),
    ])
}

#[tokio::test]
async fn path_only_ids_resolve_by_descending_the_tree() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(notepad_without_runtime_ids());
    let spyglass = engine(&desktop, EngineConfig::default());

    let found = spyglass.find(&Query::new().name("Text Editor")).await.unwrap();
    let id = found.elements[0].id.clone();
    assert_eq!(id, format!("{window}:0:1"));

    let resolved = spyglass.resolve(&id).await.unwrap().element.unwrap();
    assert_eq!(resolved.name, "Text Editor");
    assert_eq!(resolved.id, id);

    for missing in [format!("{window}:0:9"), format!("{window}:0:1.0"), format!("{window}:0:fast")] {
        let resolved = spyglass.resolve(&missing).await.unwrap();
        assert!(resolved.element.is_none(), "{missing} resolved");
    }
}

#[tokio::test]
async fn path_only_ids_follow_the_position_not_the_element() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(notepad_without_runtime_ids());
    let spyglass = engine(&desktop, EngineConfig::default());

    let id = format!("{window}:0:1");
    let before = spyglass.resolve(&id).await.unwrap().element.unwrap();
    assert_eq!(before.name, "Text Editor");

    let window_rid = desktop.runtime_id_of("Untitled - Notepad").unwrap();
    desktop.insert_child(&window_rid, 0, ElementSpec::new(ControlType::ToolBar, "Ribbon").without_runtime_id());

    let after = spyglass.resolve(&id).await.unwrap().element.unwrap();
    assert_eq!(after.name, "Application");
}

#[tokio::test]
async fn fast_mode_falls_back_to_paths_without_a_runtime_id() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(notepad_without_runtime_ids());
    let config = EngineConfig {
        id_mode: IdMode::Fast,
        ..Default::default()
    };
    let spyglass = engine(&desktop, config);

    let found = spyglass
        .find(&Query::new().control_type(ControlType::StatusBar))
        .await
        .unwrap();
    let id = &found.elements[0].id;
    assert_eq!(id, &format!("{window}:0:2"));
    let resolved = spyglass.resolve(id).await.unwrap().element.unwrap();
    assert_eq!(resolved.name, "Status Bar");
}
