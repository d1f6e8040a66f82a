//! Concurrent callers share one worker; provider calls never overlap.

use futures::future::join_all;
use spyglass::platforms::memory::{ElementSpec, MemoryDesktop};
use spyglass::{ControlType, EngineConfig, Platform, Query, RootSelector, Spyglass};
use std::collections::HashSet;
use std::time::Duration;

fn desktop_with_forms(count: usize) -> (MemoryDesktop, Vec<spyglass::WindowHandle>) {
    let desktop = MemoryDesktop::new();
    let handles = (0..count)
        .map(|i| {
            desktop.add_window(
                ElementSpec::window(&format!("Form {i}")).children([
                    ElementSpec::new(ControlType::Edit, &format!("field {i}")).bounds(0, 0, 100, 20),
                    ElementSpec::new(ControlType::Button, &format!("submit {i}")).bounds(0, 30, 60, 20),
                ]),
            )
        })
        .collect();
    (desktop, handles)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submitters_are_serialised() {
    let (desktop, handles) = desktop_with_forms(4);
    desktop.set_latency(Some(Duration::from_millis(2)));
    let spyglass = Spyglass::with_platform(Platform::in_memory(&desktop), EngineConfig::default()).unwrap();
    desktop.clear_calls();

    let finds = (0..8).map(|i| {
        let spyglass = spyglass.clone();
        tokio::spawn(async move {
            spyglass
                .find(&Query::new().name_contains(format!("submit {}", i % 4)))
                .await
                .map(|r| r.elements.len())
        })
    });
    let trees = handles.iter().map(|handle| {
        let spyglass = spyglass.clone();
        let handle = *handle;
        tokio::spawn(async move {
            spyglass
                .get_tree(RootSelector::Window(handle), None, vec![])
                .await
                .map(|r| r.tree.subtree_len())
        })
    });

    for found in join_all(finds).await {
        assert_eq!(found.unwrap().unwrap(), 1);
    }
    for size in join_all(trees).await {
        assert_eq!(size.unwrap().unwrap(), 3);
    }

    assert_eq!(desktop.overlapping_calls(), 0);
    let calls = desktop.calls();
    assert!(!calls.is_empty());
    let threads: HashSet<_> = calls.iter().map(|c| c.thread).collect();
    assert_eq!(threads.len(), 1, "provider was called from {} threads", threads.len());
    assert!(threads.contains(&spyglass.worker().thread_id()));
}

#[tokio::test]
async fn waits_do_not_starve_other_callers() {
    let (desktop, _) = desktop_with_forms(1);
    let spyglass = Spyglass::with_platform(
        Platform::in_memory(&desktop),
        EngineConfig {
            wait_poll_initial_ms: 20,
            wait_poll_max_ms: 100,
            ..Default::default()
        },
    )
    .unwrap();

    let waiter = {
        let spyglass = spyglass.clone();
        tokio::spawn(async move {
            spyglass
                .wait_for(&Query::new().name("Late"), Some(Duration::from_secs(3)))
                .await
        })
    };

    // Searches keep completing while the wait is polling.
    for _ in 0..5 {
        let found = spyglass.find(&Query::new().name("field 0")).await.unwrap();
        assert_eq!(found.elements.len(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    desktop.add_window(ElementSpec::window("Late"));
    let waited = waiter.await.unwrap().unwrap();
    assert_eq!(waited.element.name, "Late");
}
