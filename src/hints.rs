//! Field suggestion for new work items.
//!
//! Pre-fills priority, dependencies, and assignee from lexical cues and
//! similarity against the existing corpus. Purely advisory: callers apply
//! suggestions only to fields their own request left unset.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::model::{AgentKind, Status, WorkItem};
use crate::similarity::SemanticIndex;
use crate::store::KvStore;

/// Ordered urgency lexicon: first term found in the description wins.
const URGENCY_TERMS: &[(&str, i32)] = &[("critical", 4), ("urgent", 3), ("important", 2)];

/// Suggested values for a new item's unset fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestions {
    pub priority: i32,
    pub dependencies: Vec<String>,
    pub assigned_to: Option<String>,
}

/// Heuristic suggestion engine over one agent kind's keyspace.
pub struct HintEngine {
    store: Arc<dyn KvStore>,
    index: Arc<dyn SemanticIndex>,
    kind: AgentKind,
    /// Corpus items scoring above this similarity become dependency candidates.
    dependency_threshold: f64,
}

impl HintEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        index: Arc<dyn SemanticIndex>,
        kind: AgentKind,
        dependency_threshold: f64,
    ) -> Self {
        Self {
            store,
            index,
            kind,
            dependency_threshold,
        }
    }

    /// Suggest field values for a new item with the given description and
    /// context metadata.
    pub async fn suggest(
        &self,
        description: &str,
        context: &Map<String, Value>,
    ) -> Result<Suggestions> {
        let dependencies = self.suggest_dependencies(description).await?;
        let assigned_to = self
            .suggest_assignee(context.get("module").and_then(Value::as_str))
            .await?;
        Ok(Suggestions {
            priority: suggest_priority(description),
            dependencies,
            assigned_to,
        })
    }

    /// Distinct ids of similar, still-open items, in corpus order.
    async fn suggest_dependencies(&self, description: &str) -> Result<Vec<String>> {
        let corpus = self.load_corpus().await?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let descriptions: Vec<String> =
            corpus.iter().map(|item| item.description.clone()).collect();
        let scores = match self.index.rank(description, &descriptions) {
            Ok(s) => s,
            Err(e) => {
                // Advisory path: a scoring failure degrades to no suggestions.
                warn!(kind = %self.kind, "dependency ranking failed: {e}");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::new();
        Ok(corpus
            .iter()
            .zip(scores)
            .filter(|(item, score)| {
                *score > self.dependency_threshold && item.status != Status::Completed
            })
            .filter(|(item, _)| seen.insert(item.id.clone()))
            .map(|(item, _)| item.id.clone())
            .collect())
    }

    /// First owner listed for the module in the maintainers mapping.
    async fn suggest_assignee(&self, module: Option<&str>) -> Result<Option<String>> {
        let Some(module) = module else {
            return Ok(None);
        };
        let raw = self
            .store
            .get(&self.kind.maintainers_keyspace(), module)
            .await?;
        Ok(raw.and_then(|owners| {
            owners
                .split(',')
                .map(str::trim)
                .find(|o| !o.is_empty())
                .map(str::to_string)
        }))
    }

    async fn load_corpus(&self) -> Result<Vec<WorkItem>> {
        let space = self.kind.keyspace();
        let keys = self.store.keys(space).await?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.store.get(space, &key).await? else {
                continue;
            };
            match serde_json::from_str::<WorkItem>(&raw) {
                Ok(item) => items.push(item),
                Err(e) => warn!(key, "skipping unreadable item: {e}"),
            }
        }
        Ok(items)
    }
}

/// Scan the description for urgency terms, case-insensitive, first match
/// wins. Default 1 when none match.
fn suggest_priority(description: &str) -> i32 {
    let lower = description.to_lowercase();
    URGENCY_TERMS
        .iter()
        .find(|(term, _)| lower.contains(term))
        .map(|&(_, priority)| priority)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_from_urgency_terms() {
        assert_eq!(suggest_priority("CRITICAL outage in payments"), 4);
        assert_eq!(suggest_priority("Assign to Alice for urgent fix"), 3);
        assert_eq!(suggest_priority("important cleanup"), 2);
        assert_eq!(suggest_priority("routine maintenance"), 1);
    }

    #[test]
    fn first_matching_term_wins() {
        // Lexicon order decides, not position in the text.
        assert_eq!(suggest_priority("urgent, possibly critical"), 4);
    }
}
