//! Deterministic conflict resolution between two versions of a work item.
//!
//! Arbitration is client-side and binary: given two already-fetched
//! snapshots, pick a winner. No locking, no merge — the loser is simply
//! not chosen. Every decision carries a reason tag for observability.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{Status, WorkItem};
use crate::similarity::SemanticIndex;

/// Fixed policy constants for arbitration, exposed as configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPolicy {
    /// At or above this similarity the two items are judged to be about
    /// the same thing and compete on priority/recency.
    pub similarity_threshold: f64,
    /// Weighted-score coefficients for dissimilar items.
    pub time_weight: f64,
    pub priority_weight: f64,
    pub dependency_weight: f64,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            time_weight: 0.5,
            priority_weight: 0.3,
            dependency_weight: 0.2,
        }
    }
}

/// Why a particular item won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionReason {
    /// Exactly one item was completed.
    CompletedPreference,
    /// Items similar; higher priority won.
    SimilarPriority,
    /// Items similar, priorities equal; larger timestamp won.
    SimilarRecency,
    /// Items dissimilar; weighted score decided.
    WeightedScore,
}

impl ResolutionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionReason::CompletedPreference => "completed-preference",
            ResolutionReason::SimilarPriority => "similar-priority",
            ResolutionReason::SimilarRecency => "similar-recency",
            ResolutionReason::WeightedScore => "weighted-score",
        }
    }
}

/// Outcome of one arbitration.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub winner: WorkItem,
    pub reason: ResolutionReason,
    /// Semantic similarity between the two descriptions, as scored.
    pub similarity: f64,
}

/// Picks a winner between two concurrently-edited work items.
pub struct ConflictResolver {
    policy: ConflictPolicy,
    index: Arc<dyn SemanticIndex>,
}

impl ConflictResolver {
    pub fn new(index: Arc<dyn SemanticIndex>, policy: ConflictPolicy) -> Self {
        Self { policy, index }
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Resolve a conflict. Deterministic: same inputs, same winner.
    /// Ties break toward `a` at every step.
    pub fn resolve(&self, a: &WorkItem, b: &WorkItem) -> Resolution {
        // Completed work is never displaced by unfinished work. Two
        // completed items fall through to similarity arbitration.
        let a_done = a.status == Status::Completed;
        let b_done = b.status == Status::Completed;
        if a_done != b_done {
            let winner = if a_done { a } else { b };
            info!(
                winner = %winner.id,
                reason = ResolutionReason::CompletedPreference.as_str(),
                "conflict resolved"
            );
            return Resolution {
                winner: winner.clone(),
                reason: ResolutionReason::CompletedPreference,
                similarity: 0.0,
            };
        }

        // Similarity failure is non-fatal: score 0.0 and keep arbitrating.
        let similarity = match self.index.similarity(&a.description, &b.description) {
            Ok(s) => s,
            Err(e) => {
                warn!(a = %a.id, b = %b.id, "similarity computation failed: {e}");
                0.0
            }
        };

        if similarity >= self.policy.similarity_threshold {
            if a.priority != b.priority {
                let winner = if a.priority > b.priority { a } else { b };
                info!(
                    winner = %winner.id,
                    similarity,
                    reason = ResolutionReason::SimilarPriority.as_str(),
                    "conflict resolved"
                );
                return Resolution {
                    winner: winner.clone(),
                    reason: ResolutionReason::SimilarPriority,
                    similarity,
                };
            }
            let winner = if a.timestamp >= b.timestamp { a } else { b };
            info!(
                winner = %winner.id,
                similarity,
                reason = ResolutionReason::SimilarRecency.as_str(),
                "conflict resolved"
            );
            return Resolution {
                winner: winner.clone(),
                reason: ResolutionReason::SimilarRecency,
                similarity,
            };
        }

        let score = self.policy.time_weight * (a.timestamp - b.timestamp)
            + self.policy.priority_weight * f64::from(a.priority - b.priority)
            + self.policy.dependency_weight
                * (a.dependencies.len() as f64 - b.dependencies.len() as f64);
        let winner = if score >= 0.0 { a } else { b };
        info!(
            winner = %winner.id,
            similarity,
            score,
            reason = ResolutionReason::WeightedScore.as_str(),
            "conflict resolved"
        );
        Resolution {
            winner: winner.clone(),
            reason: ResolutionReason::WeightedScore,
            similarity,
        }
    }
}
