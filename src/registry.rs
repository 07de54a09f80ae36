//! The work-item registry: CRUD and batch operations over one agent
//! kind's keyspace, with every store access routed through the failure
//! guard. Composes the conflict resolver and hint engine.

use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{Instrument, warn};

use crate::conflict::{ConflictPolicy, ConflictResolver, Resolution};
use crate::error::{Error, Result};
use crate::guard::{CircuitState, FailureGuard, GuardConfig, GuardHealth};
use crate::hints::{HintEngine, Suggestions};
use crate::model::{AgentKind, NewWorkItem, WorkItem, WorkItemPatch};
use crate::similarity::{SemanticIndex, TfIdfIndex};
use crate::store::KvStore;
use crate::telemetry::{metrics, ops};

/// Registry construction parameters.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Chunk size for batch updates.
    pub batch_size: usize,
    pub guard: GuardConfig,
    pub conflict: ConflictPolicy,
    /// Similarity threshold for dependency suggestions.
    pub dependency_threshold: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            guard: GuardConfig::default(),
            conflict: ConflictPolicy::default(),
            dependency_threshold: 0.4,
        }
    }
}

/// One entry of a batch update.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub id: String,
    pub patch: WorkItemPatch,
}

/// A resilient work-item registry for one agent kind.
///
/// Owns its failure guard outright; guard state is never shared across
/// kinds. The store is shared, but each registry only touches its own
/// keyspace.
pub struct Registry {
    kind: AgentKind,
    store: Arc<dyn KvStore>,
    guard: Arc<FailureGuard>,
    resolver: ConflictResolver,
    hints: HintEngine,
    batch_size: usize,
}

impl Registry {
    pub fn new(kind: AgentKind, store: Arc<dyn KvStore>, config: RegistryConfig) -> Self {
        let index: Arc<dyn SemanticIndex> = Arc::new(TfIdfIndex::new());
        let guard = Arc::new(FailureGuard::new(kind.to_string(), config.guard));
        let resolver = ConflictResolver::new(Arc::clone(&index), config.conflict);
        let hints = HintEngine::new(
            Arc::clone(&store),
            index,
            kind,
            config.dependency_threshold,
        );
        Self {
            kind,
            store,
            guard,
            resolver,
            hints,
            batch_size: config.batch_size,
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Current failure-guard health, for status surfaces.
    pub fn guard_health(&self) -> GuardHealth {
        self.guard.health()
    }

    /// Start the background circuit-recovery monitor.
    pub fn spawn_circuit_monitor(&self) -> tokio::task::JoinHandle<()> {
        self.guard.spawn_monitor()
    }

    fn keyspace(&self) -> &'static str {
        self.kind.keyspace()
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Create a work item: assign id and timestamps, validate, persist.
    /// Returns the new id.
    pub async fn create(&self, new: NewWorkItem) -> Result<String> {
        if new.description.trim().is_empty() {
            return Err(Error::Validation("description must be non-empty".to_string()));
        }

        let item = new.build(self.kind);
        let id = item.id.clone();
        let payload = serialize(&item)?;

        let span = ops::registry_span("create", self.kind, Some(&id));
        async {
            self.guard
                .run(|| async { self.store.put(self.keyspace(), &id, &payload).await })
                .await
        }
        .instrument(span)
        .await?;

        metrics::items_created().add(1, &[KeyValue::new("kind", self.kind.to_string())]);
        Ok(id)
    }

    /// Create with advisory suggestions applied to fields the caller left
    /// unset. A failed suggestion pass degrades to a plain create.
    pub async fn create_with_hints(&self, mut new: NewWorkItem) -> Result<String> {
        // The hint pass reads the store outside the guard; skip it entirely
        // while the circuit is not closed rather than prodding a backend
        // already judged unhealthy.
        if self.guard.state() != CircuitState::Closed {
            warn!(kind = %self.kind, "circuit not closed, skipping hint pass");
            return self.create(new).await;
        }
        let suggested = self.suggest_fields(&new.description, &new.context).await;
        match suggested {
            Ok(suggested) => {
                if new.priority.is_none() {
                    new.priority = Some(suggested.priority);
                }
                if new.dependencies.is_empty() {
                    new.dependencies = suggested.dependencies;
                }
                if new.assigned_to.is_none() {
                    new.assigned_to = suggested.assigned_to;
                }
            }
            Err(e) => warn!(kind = %self.kind, "hint pass failed, creating without: {e}"),
        }
        self.create(new).await
    }

    /// Fetch one item. A missing id is `None`, not an error.
    pub async fn get(&self, id: &str) -> Result<Option<WorkItem>> {
        let span = ops::registry_span("get", self.kind, Some(id));
        let raw = async {
            self.guard
                .run(|| async { self.store.get(self.keyspace(), id).await })
                .await
        }
        .instrument(span)
        .await?;

        raw.map(|raw| deserialize(id, &raw)).transpose()
    }

    /// List every item in the keyspace. A key that disappears between
    /// enumeration and fetch is skipped, never fails the call.
    pub async fn list(&self) -> Result<Vec<WorkItem>> {
        let span = ops::registry_span("list", self.kind, None);
        async {
            self.guard
                .run(|| async {
                    let space = self.keyspace();
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
                })
                .await
        }
        .instrument(span)
        .await
    }

    /// Fetch-merge-write a partial update. Fails with [`Error::NotFound`]
    /// if the id is absent.
    pub async fn update(&self, id: &str, patch: WorkItemPatch) -> Result<WorkItem> {
        let span = ops::registry_span("update", self.kind, Some(id));
        async {
            self.guard
                .run(|| async {
                    let space = self.keyspace();
                    let raw = self
                        .store
                        .get(space, id)
                        .await?
                        .ok_or_else(|| Error::NotFound(id.to_string()))?;
                    let mut item = deserialize(id, &raw)?;
                    patch.apply(&mut item);
                    let payload = serialize(&item)?;
                    self.store.put(space, id, &payload).await?;
                    Ok(item)
                })
                .await
        }
        .instrument(span)
        .await
    }

    /// Remove an item. Deleting a missing id is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let span = ops::registry_span("delete", self.kind, Some(id));
        async {
            self.guard
                .run(|| async { self.store.delete(self.keyspace(), id).await })
                .await
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Batch
    // -----------------------------------------------------------------------

    /// Apply many partial updates in chunks. Each chunk is one guarded
    /// grouped read-merge-write; atomicity is per chunk, not global, so a
    /// failure in a later chunk leaves earlier chunks applied. Ids with no
    /// existing record are silently skipped — a deliberate batch-tolerance
    /// divergence from [`Registry::update`].
    ///
    /// Returns the ids actually updated.
    pub async fn batch_update(
        &self,
        updates: Vec<BatchUpdate>,
        batch_size: Option<usize>,
    ) -> Result<Vec<String>> {
        let chunk_size = batch_size.unwrap_or(self.batch_size);
        if chunk_size == 0 {
            return Err(Error::Validation("batch_size must be positive".to_string()));
        }

        let span = ops::registry_span("batch_update", self.kind, None);
        async {
            let mut updated = Vec::new();
            for chunk in updates.chunks(chunk_size) {
                let ids = self
                    .guard
                    .run(|| async {
                        let space = self.keyspace();
                        let mut writes = Vec::with_capacity(chunk.len());
                        let mut ids = Vec::with_capacity(chunk.len());
                        for entry in chunk {
                            let Some(raw) = self.store.get(space, &entry.id).await? else {
                                continue;
                            };
                            let mut item = deserialize(&entry.id, &raw)?;
                            // Field replacement only; updated_at is left alone so
                            // re-applying an identical batch changes nothing.
                            entry.patch.apply_fields(&mut item);
                            writes.push((entry.id.clone(), serialize(&item)?));
                            ids.push(entry.id.clone());
                        }
                        if !writes.is_empty() {
                            self.store.put_many(space, &writes).await?;
                        }
                        Ok(ids)
                    })
                    .await?;
                updated.extend(ids);
            }
            Ok(updated)
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Conflict resolution & hints
    // -----------------------------------------------------------------------

    /// Arbitrate between two snapshots of a concurrently-edited item.
    /// Pure client-side decision over already-fetched data; the store is
    /// not consulted, so the guard is not involved.
    pub fn resolve_conflict(&self, a: &WorkItem, b: &WorkItem) -> Resolution {
        let resolution = self.resolver.resolve(a, b);
        metrics::conflicts_resolved().add(
            1,
            &[
                KeyValue::new("kind", self.kind.to_string()),
                KeyValue::new("reason", resolution.reason.as_str()),
            ],
        );
        resolution
    }

    /// Advisory field suggestions for a new item.
    pub async fn suggest_fields(
        &self,
        description: &str,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Suggestions> {
        let span = ops::registry_span("suggest_fields", self.kind, None);
        self.hints.suggest(description, context).instrument(span).await
    }

    /// Record the maintainers of a module (comma-separated owners),
    /// consulted by assignee suggestions.
    pub async fn set_module_maintainers(&self, module: &str, owners: &str) -> Result<()> {
        let space = self.kind.maintainers_keyspace();
        self.guard
            .run(|| async { self.store.put(&space, module, owners).await })
            .await
    }
}

fn serialize(item: &WorkItem) -> Result<String> {
    serde_json::to_string(item).map_err(|e| Error::Other(format!("serialize {}: {e}", item.id)))
}

fn deserialize(id: &str, raw: &str) -> Result<WorkItem> {
    serde_json::from_str(raw).map_err(|e| Error::Other(format!("corrupt item {id}: {e}")))
}
