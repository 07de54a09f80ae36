//! Field-suggestion tests through the registry surface.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use workreg::model::{AgentKind, NewWorkItem, Status, WorkItemPatch};
use workreg::registry::{Registry, RegistryConfig};
use workreg::store::MemoryStore;

fn test_registry() -> Registry {
    Registry::new(
        AgentKind::Development,
        Arc::new(MemoryStore::new()),
        RegistryConfig::default(),
    )
}

fn module_context(module: &str) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("module".to_string(), json!(module));
    context
}

#[tokio::test]
async fn priority_comes_from_the_urgency_lexicon() {
    let registry = test_registry();
    let empty = Map::new();

    let cases = [
        ("critical data loss in exports", 4),
        ("Assign to Alice for urgent fix", 3),
        ("important but not blocking", 2),
        ("tidy up readme", 1),
    ];
    for (description, expected) in cases {
        let s = registry.suggest_fields(description, &empty).await.unwrap();
        assert_eq!(s.priority, expected, "for {description:?}");
    }
}

#[tokio::test]
async fn dependencies_come_from_similar_open_items() {
    let registry = test_registry();

    let similar = registry
        .create(NewWorkItem::new("fix login page redirect bug"))
        .await
        .unwrap();
    let unrelated = registry
        .create(NewWorkItem::new("refresh marketing banner artwork"))
        .await
        .unwrap();

    let s = registry
        .suggest_fields("another fix for the login page redirect bug", &Map::new())
        .await
        .unwrap();

    assert!(s.dependencies.contains(&similar));
    assert!(!s.dependencies.contains(&unrelated));
}

#[tokio::test]
async fn completed_items_are_not_suggested_as_dependencies() {
    let registry = test_registry();

    let done = registry
        .create(NewWorkItem::new("fix login page redirect bug"))
        .await
        .unwrap();
    registry
        .update(&done, WorkItemPatch::default().status(Status::Completed))
        .await
        .unwrap();

    let s = registry
        .suggest_fields("another fix for the login page redirect bug", &Map::new())
        .await
        .unwrap();
    assert!(s.dependencies.is_empty());
}

#[tokio::test]
async fn empty_corpus_yields_no_dependencies() {
    let registry = test_registry();
    let s = registry
        .suggest_fields("anything at all", &Map::new())
        .await
        .unwrap();
    assert!(s.dependencies.is_empty());
}

#[tokio::test]
async fn assignee_is_first_listed_maintainer() {
    let registry = test_registry();
    registry
        .set_module_maintainers("payments", "erin, frank, grace")
        .await
        .unwrap();

    let s = registry
        .suggest_fields("reconcile ledger drift", &module_context("payments"))
        .await
        .unwrap();
    assert_eq!(s.assigned_to.as_deref(), Some("erin"));
}

#[tokio::test]
async fn unmapped_or_absent_module_yields_no_assignee() {
    let registry = test_registry();

    let s = registry
        .suggest_fields("reconcile ledger drift", &module_context("unknown"))
        .await
        .unwrap();
    assert_eq!(s.assigned_to, None);

    let s = registry
        .suggest_fields("reconcile ledger drift", &Map::new())
        .await
        .unwrap();
    assert_eq!(s.assigned_to, None);
}
