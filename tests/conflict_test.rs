//! Conflict resolver arbitration tests.

use std::sync::Arc;

use chrono::Utc;
use workreg::conflict::{ConflictPolicy, ConflictResolver, ResolutionReason};
use workreg::error::{Error, Result};
use workreg::model::{Status, WorkItem};
use workreg::similarity::{SemanticIndex, TfIdfIndex};

fn resolver() -> ConflictResolver {
    ConflictResolver::new(Arc::new(TfIdfIndex::new()), ConflictPolicy::default())
}

fn item(id: &str, description: &str, status: Status, priority: i32, timestamp: f64) -> WorkItem {
    let now = Utc::now();
    WorkItem {
        id: id.to_string(),
        description: description.to_string(),
        assigned_to: None,
        status,
        created_at: now,
        updated_at: now,
        context: serde_json::Map::new(),
        dependencies: Vec::new(),
        priority,
        timestamp,
    }
}

// ---------------------------------------------------------------------------
// Completed preference
// ---------------------------------------------------------------------------

#[test]
fn completed_item_wins_regardless_of_other_fields() {
    let r = resolver();
    let a = item("a", "migrate billing tables", Status::Completed, 1, 100.0);
    let b = item("b", "redesign settings page", Status::Pending, 9, 9000.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "a");
    assert_eq!(res.reason, ResolutionReason::CompletedPreference);

    // Symmetric: b completed means b wins.
    let a = item("a", "migrate billing tables", Status::Pending, 9, 9000.0);
    let b = item("b", "redesign settings page", Status::Completed, 1, 100.0);
    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "b");
    assert_eq!(res.reason, ResolutionReason::CompletedPreference);
}

#[test]
fn two_completed_items_fall_through_to_similarity() {
    let r = resolver();
    let a = item("a", "fix login redirect bug", Status::Completed, 2, 100.0);
    let b = item("b", "fix login redirect bug", Status::Completed, 5, 100.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "b");
    assert_eq!(res.reason, ResolutionReason::SimilarPriority);
}

// ---------------------------------------------------------------------------
// Similar items: priority, then recency
// ---------------------------------------------------------------------------

#[test]
fn similar_items_prefer_higher_priority() {
    let r = resolver();
    let a = item("a", "fix login redirect bug", Status::Pending, 1, 9000.0);
    let b = item("b", "fix login redirect bug", Status::Pending, 5, 100.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "b");
    assert_eq!(res.reason, ResolutionReason::SimilarPriority);
    assert!(res.similarity >= 0.7);
}

#[test]
fn similar_items_with_equal_priority_prefer_recency() {
    let r = resolver();
    let a = item("a", "fix login redirect bug", Status::Pending, 2, 100.0);
    let b = item("b", "fix login redirect bug", Status::Pending, 2, 200.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "b");
    assert_eq!(res.reason, ResolutionReason::SimilarRecency);
}

#[test]
fn similar_recency_tie_breaks_toward_a() {
    let r = resolver();
    let a = item("a", "fix login redirect bug", Status::Pending, 2, 200.0);
    let b = item("b", "fix login redirect bug", Status::Pending, 2, 200.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "a");
    assert_eq!(res.reason, ResolutionReason::SimilarRecency);
}

// ---------------------------------------------------------------------------
// Dissimilar items: weighted score
// ---------------------------------------------------------------------------

#[test]
fn dissimilar_items_use_weighted_score() {
    let r = resolver();
    // A leads on both recency and priority.
    let a = item("a", "migrate billing tables", Status::Pending, 2, 1000.0);
    let b = item("b", "redesign settings page", Status::Pending, 1, 999.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "a");
    assert_eq!(res.reason, ResolutionReason::WeightedScore);
}

#[test]
fn weighted_score_rewards_recency_most() {
    let r = resolver();
    // B is far more recent; priority edge of 1 cannot compensate.
    let a = item("a", "migrate billing tables", Status::Pending, 2, 100.0);
    let b = item("b", "redesign settings page", Status::Pending, 1, 500.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "b");
    assert_eq!(res.reason, ResolutionReason::WeightedScore);
}

#[test]
fn weighted_score_counts_dependencies() {
    let r = resolver();
    let mut a = item("a", "migrate billing tables", Status::Pending, 1, 100.0);
    let b = item("b", "redesign settings page", Status::Pending, 1, 100.0);
    // Equal time and priority; A's dependency fan-in decides.
    a.dependencies = vec!["task_1".to_string(), "task_2".to_string()];

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "a");
    assert_eq!(res.reason, ResolutionReason::WeightedScore);
}

#[test]
fn weighted_score_tie_breaks_toward_a() {
    let r = resolver();
    let a = item("a", "migrate billing tables", Status::Pending, 1, 100.0);
    let b = item("b", "redesign settings page", Status::Pending, 1, 100.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.winner.id, "a");
}

// ---------------------------------------------------------------------------
// Determinism and degraded similarity
// ---------------------------------------------------------------------------

#[test]
fn resolution_is_deterministic() {
    let r = resolver();
    let a = item("a", "fix login redirect bug", Status::Pending, 3, 500.0);
    let b = item("b", "fix login session bug", Status::InProgress, 3, 700.0);

    let first = r.resolve(&a, &b);
    for _ in 0..10 {
        let again = r.resolve(&a, &b);
        assert_eq!(again.winner.id, first.winner.id);
        assert_eq!(again.reason, first.reason);
        assert_eq!(again.similarity, first.similarity);
    }
}

/// An index that always fails, standing in for a broken scoring backend.
struct BrokenIndex;

impl SemanticIndex for BrokenIndex {
    fn similarity(&self, _a: &str, _b: &str) -> Result<f64> {
        Err(Error::Similarity("vectorizer unavailable".to_string()))
    }
    fn rank(&self, _query: &str, _corpus: &[String]) -> Result<Vec<f64>> {
        Err(Error::Similarity("vectorizer unavailable".to_string()))
    }
}

#[test]
fn similarity_failure_degrades_to_weighted_score() {
    let r = ConflictResolver::new(Arc::new(BrokenIndex), ConflictPolicy::default());
    // Identical descriptions would normally route through the similar
    // branch; with scoring down they fall to the weighted score.
    let a = item("a", "fix login redirect bug", Status::Pending, 1, 200.0);
    let b = item("b", "fix login redirect bug", Status::Pending, 5, 100.0);

    let res = r.resolve(&a, &b);
    assert_eq!(res.reason, ResolutionReason::WeightedScore);
    assert_eq!(res.similarity, 0.0);
    // 0.5 * 100 beats 0.3 * -4: recency carries A.
    assert_eq!(res.winner.id, "a");
}
