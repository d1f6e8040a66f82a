//! Tree snapshots and searches over a simulated desktop.

use spyglass::platforms::memory::{ElementSpec, MemoryDesktop};
use spyglass::{
    ControlType, ElementRecord, EngineConfig, FilterMode, Platform, Query, Rect, RootSelector,
    Spyglass, WindowHandle,
};

fn engine(desktop: &MemoryDesktop, config: EngineConfig) -> Spyglass {
    Spyglass::with_platform(Platform::in_memory(desktop), config).unwrap()
}

/// `levels` nested panes below the window, each with one button.
fn ladder(levels: usize) -> ElementSpec {
    let mut inner = ElementSpec::new(ControlType::Pane, &format!("pane {levels}"));
    for level in (1..levels).rev() {
        inner = ElementSpec::new(ControlType::Pane, &format!("pane {level}"))
            .child(ElementSpec::new(ControlType::Button, &format!("button {level}")))
            .child(inner);
    }
    ElementSpec::window("Ladder").child(inner)
}

fn names_of(records: &[&ElementRecord], control_type: ControlType) -> Vec<String> {
    let mut names: Vec<String> = records
        .iter()
        .filter(|r| r.control_type == control_type)
        .map(|r| r.name.clone())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn repeated_tree_snapshots_are_identical() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(ladder(6));
    let spyglass = engine(&desktop, EngineConfig::default());

    let first = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    let second = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert_eq!(first.tree, second.tree);
    assert_eq!(first.diagnostics.elements_scanned, second.diagnostics.elements_scanned);
}

#[tokio::test]
async fn bulk_and_incremental_snapshots_agree() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(ladder(5));
    let spyglass = engine(&desktop, EngineConfig::default());

    let bulk = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert_eq!(bulk.diagnostics.used_bulk_cache, Some(true));

    // The bulk fetch is the last provider call; every node is read from it.
    desktop.clear_calls();
    spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    let operations: Vec<&str> = desktop.calls().iter().map(|c| c.operation).collect();
    assert_eq!(operations.last(), Some(&"cache_subtree"));
    assert_eq!(operations.iter().filter(|op| **op == "cache_subtree").count(), 1);

    desktop.set_bulk_cache(false);
    let walked = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert_eq!(walked.diagnostics.used_bulk_cache, Some(false));
    assert_eq!(bulk.tree, walked.tree);
}

#[tokio::test]
async fn inline_and_post_hoc_agree_when_matches_never_share_an_ancestor_branch() {
    // Every container holds at most one matching descendant.
    let spec = ElementSpec::window("Form").children([
        ElementSpec::new(ControlType::Group, "name group")
            .child(ElementSpec::new(ControlType::Pane, "wrapper").child(
                ElementSpec::new(ControlType::Edit, "First name"),
            )),
        ElementSpec::new(ControlType::Edit, "Last name"),
        ElementSpec::new(ControlType::Pane, "decoration")
            .child(ElementSpec::new(ControlType::Image, "logo")),
    ]);

    let mut trees = Vec::new();
    for mode in [FilterMode::Inline, FilterMode::PostHoc] {
        let desktop = MemoryDesktop::new();
        let window = desktop.add_window(spec.clone());
        let config = EngineConfig {
            filter_mode: Some(mode),
            ..Default::default()
        };
        let spyglass = engine(&desktop, config);
        let tree = spyglass
            .get_tree(RootSelector::Window(window), None, vec![ControlType::Edit])
            .await
            .unwrap();
        trees.push(names_of(&tree.tree.walk(), ControlType::Edit));
    }
    assert_eq!(trees[0], vec!["First name", "Last name"]);
    assert_eq!(trees[0], trees[1]);
}

#[tokio::test]
async fn tree_depth_never_exceeds_the_requested_bound() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(ladder(8));
    let spyglass = engine(&desktop, EngineConfig::default());

    for depth in 0..6 {
        let tree = spyglass
            .get_tree(RootSelector::Window(window), Some(depth), vec![])
            .await
            .unwrap();
        assert!(tree.tree.depth() <= depth, "depth {} > {}", tree.tree.depth(), depth);
    }
    let full = spyglass
        .get_tree(RootSelector::Window(window), Some(50), vec![])
        .await
        .unwrap();
    assert_eq!(full.tree.depth(), 8);
}

#[tokio::test]
async fn region_keeps_only_intersecting_elements() {
    let desktop = MemoryDesktop::new();
    desktop.add_window(
        ElementSpec::window("Canvas")
            .bounds(0, 0, 1000, 1000)
            .children([
                ElementSpec::new(ControlType::Button, "near").bounds(10, 10, 20, 20),
                ElementSpec::new(ControlType::Button, "far").bounds(500, 500, 20, 20),
            ]),
    );
    let spyglass = engine(&desktop, EngineConfig::default());

    let found = spyglass
        .find(
            &Query::new()
                .control_type(ControlType::Button)
                .region(Rect::new(0, 0, 100, 100)),
        )
        .await
        .unwrap();
    let names: Vec<&str> = found.elements.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["near"]);
}

#[tokio::test]
async fn region_at_the_edge_of_the_coordinate_space_is_searchable() {
    let desktop = MemoryDesktop::new();
    desktop.add_window(
        ElementSpec::window("Edge")
            .bounds(i32::MAX - 200, 0, 200, 200)
            .child(ElementSpec::new(ControlType::Document, "page").bounds(i32::MAX - 60, 10, 50, 50)),
    );
    let spyglass = engine(&desktop, EngineConfig::default());

    let query: Query = "role:Document && region:2147483600,0,100,100".parse().unwrap();
    let found = spyglass.find(&query).await.unwrap();
    assert_eq!(found.elements.len(), 1);
    assert_eq!(found.elements[0].name, "page");
}

#[tokio::test]
async fn exact_depth_only_evaluates_that_level() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(
        ElementSpec::window("Levels").child(
            ElementSpec::new(ControlType::Pane, "target").child(
                ElementSpec::new(ControlType::Pane, "target").child(
                    ElementSpec::new(ControlType::Pane, "target")
                        .child(ElementSpec::new(ControlType::Pane, "target")),
                ),
            ),
        ),
    );
    let spyglass = engine(&desktop, EngineConfig::default());

    let found = spyglass
        .find(&Query::new().window(window).name_contains("target").exact_depth(2))
        .await
        .unwrap();
    assert_eq!(found.elements.len(), 1);
    // Only the path down to depth 2 is visited.
    assert_eq!(found.diagnostics.elements_scanned, Some(2));

    let depth_two = spyglass
        .get_tree(RootSelector::Window(window), Some(2), vec![])
        .await
        .unwrap();
    let deepest = depth_two.tree.walk().into_iter().last().unwrap().id.clone();
    assert_eq!(found.elements[0].id, deepest);
}

#[tokio::test]
async fn scan_budget_truncates_but_keeps_a_valid_tree() {
    let desktop = MemoryDesktop::new();
    let window = desktop.add_window(
        ElementSpec::window("Inbox").child(
            ElementSpec::new(ControlType::List, "Messages").children(
                (0..200).map(|i| ElementSpec::new(ControlType::ListItem, &format!("message {i}"))),
            ),
        ),
    );
    let config = EngineConfig {
        scan_budget: 50,
        ..Default::default()
    };
    let spyglass = engine(&desktop, config);

    let tree = spyglass
        .get_tree(RootSelector::Window(window), None, vec![])
        .await
        .unwrap();
    assert!(tree.diagnostics.truncated);
    assert!(!tree.diagnostics.warnings.is_empty());
    assert!(tree.tree.subtree_len() <= 51);
    for node in tree.tree.walk() {
        assert!(spyglass.resolve(&node.id).await.unwrap().element.is_some());
    }

    let search = spyglass
        .find(&Query::new().name_contains("message 19"))
        .await;
    match search {
        Ok(found) => assert!(found.diagnostics.truncated),
        Err(e) => assert!(e.diagnostics().unwrap().truncated),
    }
}

#[tokio::test]
async fn unknown_window_is_not_found() {
    let desktop = MemoryDesktop::new();
    let spyglass = engine(&desktop, EngineConfig::default());
    let err = spyglass
        .get_tree(RootSelector::Window(WindowHandle(0x7777)), None, vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), spyglass::ErrorKind::NotFound);
}
