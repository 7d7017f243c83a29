mod common;

use std::sync::Arc;

use sluice_core::ObjectUri;
use sluice_core::domain::workspace::Workspace;
use sluice_runner::WorkspaceStager;

use crate::common::{InMemoryObjectStore, init_tracing};

fn workspace() -> Workspace {
    let base = ObjectUri::parse("s3://bucket/ws").unwrap();
    Workspace::with_run_id(&base, "p", "r", "main.py")
}

#[tokio::test]
async fn test_destroy_follows_every_listing_page() {
    init_tracing();

    let store = InMemoryObjectStore::new();
    for i in 0..7 {
        store.insert(&format!("s3://bucket/ws/p/r/part-{i}"), "x");
    }
    store.insert("s3://bucket/ws/p/r2/keep", "sibling run");
    store.insert("s3://bucket/ws/logs/applications/a/jobs/r/SPARK_DRIVER/stdout", "log");

    WorkspaceStager::new(Arc::new(store.clone()))
        .destroy(&workspace())
        .await;

    assert!(store.keys("bucket", "ws/p/r/").is_empty());
    assert_eq!(store.keys("bucket", "ws/p/"), vec!["ws/p/r2/keep"]);
    assert_eq!(store.keys("bucket", "ws/logs/").len(), 1);
    assert_eq!(store.deleted().len(), 7);

    let listings = store
        .listed_prefixes()
        .iter()
        .filter(|prefix| prefix.as_str() == "ws/p/r/")
        .count();
    assert_eq!(listings, 4);
}

#[tokio::test]
async fn test_destroy_of_empty_workspace_is_a_noop() {
    let store = InMemoryObjectStore::new();
    store.insert("s3://bucket/ws/p/r2/keep", "sibling run");

    WorkspaceStager::new(Arc::new(store.clone()))
        .destroy(&workspace())
        .await;

    assert!(store.deleted().is_empty());
    assert_eq!(store.listed_prefixes(), vec!["ws/p/r/"]);
}

#[tokio::test]
async fn test_destroy_swallows_listing_failures() {
    let store = InMemoryObjectStore::new().failing_lists();
    store.insert("s3://bucket/ws/p/r/main.py", "print(1)");

    WorkspaceStager::new(Arc::new(store.clone()))
        .destroy(&workspace())
        .await;

    assert!(store.deleted().is_empty());
    assert_eq!(store.keys("bucket", "ws/p/r/"), vec!["ws/p/r/main.py"]);
}
