//! Core data model.
//!
//! A work item is the generic entity managed by a registry: a task,
//! decision, test case, or feedback item depending on the agent kind.
//! One parameterized model replaces the five near-identical per-agent
//! schemas it was collapsed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Agent kind
// ---------------------------------------------------------------------------

/// Which agent's keyspace a registry serves.
///
/// Each kind owns one flat id → JSON mapping in the store and one id
/// prefix, so items from different kinds never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Planning,
    Development,
    Qa,
    Architecture,
    Ux,
}

impl AgentKind {
    /// The store keyspace holding this kind's items.
    pub fn keyspace(self) -> &'static str {
        match self {
            AgentKind::Planning => "pm:tasks",
            AgentKind::Development => "dev:tasks",
            AgentKind::Qa => "qa:tests",
            AgentKind::Architecture => "ta:decisions",
            AgentKind::Ux => "ux:feedback",
        }
    }

    /// Id prefix for newly created items.
    pub fn id_prefix(self) -> &'static str {
        match self {
            AgentKind::Planning => "task",
            AgentKind::Development => "devtask",
            AgentKind::Qa => "qatest",
            AgentKind::Architecture => "decision",
            AgentKind::Ux => "feedback",
        }
    }

    /// Keyspace of the module → maintainers mapping consulted for
    /// assignee suggestions.
    pub fn maintainers_keyspace(self) -> String {
        let short = self.keyspace().split(':').next().unwrap_or("pm");
        format!("{short}:module_maintainers")
    }

    /// Generate a fresh item id: `"<prefix>_<uuid4-hex>"`.
    pub fn new_id(self) -> String {
        format!("{}_{}", self.id_prefix(), Uuid::new_v4().simple())
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentKind::Planning => "planning",
            AgentKind::Development => "development",
            AgentKind::Qa => "qa",
            AgentKind::Architecture => "architecture",
            AgentKind::Ux => "ux",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "planning" | "pm" => Ok(AgentKind::Planning),
            "development" | "dev" => Ok(AgentKind::Development),
            "qa" => Ok(AgentKind::Qa),
            "architecture" | "ta" => Ok(AgentKind::Architecture),
            "ux" => Ok(AgentKind::Ux),
            _ => Err(format!("unknown agent kind: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a work item. Transitions are unconstrained;
/// only membership in the enum is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Work item
// ---------------------------------------------------------------------------

/// A unit of work tracked by a registry.
///
/// Serialized as flat JSON under the kind's keyspace. Fields added after
/// items were first written default on read, so old payloads stay readable
/// without a migration step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique within the kind's keyspace. Immutable.
    pub id: String,

    /// Free text describing the work (objective/summary in some kinds).
    pub description: String,

    /// Who the item is assigned to, if anyone.
    #[serde(default)]
    pub assigned_to: Option<String>,

    #[serde(default)]
    pub status: Status,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Open metadata map (e.g. "module").
    #[serde(default)]
    pub context: Map<String, Value>,

    /// Ordered ids of other work items. Duplicates permitted.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Epoch seconds at construction. Used only for conflict arbitration;
    /// deliberately not kept in sync with created_at/updated_at.
    #[serde(default)]
    pub timestamp: f64,
}

fn default_priority() -> i32 {
    1
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for creating new work items. The registry's public intake type.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub(crate) description: String,
    pub(crate) assigned_to: Option<String>,
    pub(crate) status: Status,
    pub(crate) context: Map<String, Value>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) priority: Option<i32>,
}

impl NewWorkItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            assigned_to: None,
            status: Status::Pending,
            context: Map::new(),
            dependencies: Vec::new(),
            priority: None,
        }
    }

    pub fn assigned_to(mut self, who: impl Into<String>) -> Self {
        self.assigned_to = Some(who.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Materialize the item: assign id, timestamps, and defaults.
    pub(crate) fn build(self, kind: AgentKind) -> WorkItem {
        let now = Utc::now();
        WorkItem {
            id: kind.new_id(),
            description: self.description,
            assigned_to: self.assigned_to,
            status: self.status,
            created_at: now,
            updated_at: now,
            context: self.context,
            dependencies: self.dependencies,
            priority: self.priority.unwrap_or(1),
            timestamp: now.timestamp_millis() as f64 / 1000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// Partial update for a work item. A present field replaces the stored
/// value wholesale; absent fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl WorkItemPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.assigned_to.is_none()
            && self.status.is_none()
            && self.context.is_none()
            && self.dependencies.is_none()
            && self.priority.is_none()
            && self.timestamp.is_none()
    }

    /// Apply to an item and refresh `updated_at`. The id is never touched.
    pub fn apply(&self, item: &mut WorkItem) {
        self.apply_fields(item);
        item.updated_at = Utc::now();
    }

    /// Apply field replacements without refreshing `updated_at`. The batch
    /// path uses this, so re-applying the same batch is idempotent.
    pub fn apply_fields(&self, item: &mut WorkItem) {
        if let Some(ref d) = self.description {
            item.description = d.clone();
        }
        if let Some(ref a) = self.assigned_to {
            item.assigned_to = Some(a.clone());
        }
        if let Some(s) = self.status {
            item.status = s;
        }
        if let Some(ref c) = self.context {
            item.context = c.clone();
        }
        if let Some(ref deps) = self.dependencies {
            item.dependencies = deps.clone();
        }
        if let Some(p) = self.priority {
            item.priority = p;
        }
        if let Some(t) = self.timestamp {
            item.timestamp = t;
        }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn assigned_to(mut self, who: impl Into<String>) -> Self {
        self.assigned_to = Some(who.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = Some(deps);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_payload_without_new_fields_still_reads() {
        // An item persisted before context/dependencies/timestamp existed.
        let raw = r#"{
            "id": "task_abc",
            "description": "migrate billing",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;

        let item: WorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.status, Status::Pending);
        assert!(item.context.is_empty());
        assert!(item.dependencies.is_empty());
        assert_eq!(item.priority, 1);
        assert_eq!(item.timestamp, 0.0);
    }

    #[test]
    fn round_trip_preserves_context_and_dependencies() {
        let mut item = NewWorkItem::new("add retry logic")
            .context("module", serde_json::json!("net"))
            .dependencies(vec!["task_1".into(), "task_1".into(), "task_2".into()])
            .build(AgentKind::Development);
        item.context
            .insert("nested".into(), serde_json::json!({"a": [1, 2]}));

        let json = serde_json::to_string(&item).unwrap();
        let back: WorkItem = serde_json::from_str(&json).unwrap();

        assert_eq!(back.context, item.context);
        // Duplicates and order survive.
        assert_eq!(back.dependencies, vec!["task_1", "task_1", "task_2"]);
    }

    #[test]
    fn invalid_status_string_is_rejected() {
        let raw = r#"{
            "id": "task_x",
            "description": "d",
            "status": "paused",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<WorkItem>(raw).is_err());
    }

    #[test]
    fn ids_carry_kind_prefix() {
        assert!(AgentKind::Planning.new_id().starts_with("task_"));
        assert!(AgentKind::Qa.new_id().starts_with("qatest_"));
        assert!(AgentKind::Ux.new_id().starts_with("feedback_"));
    }

    #[test]
    fn patch_refreshes_updated_at_only() {
        let mut item = NewWorkItem::new("original").build(AgentKind::Planning);
        let created = item.created_at;
        let patch = WorkItemPatch::default().priority(4);
        patch.apply(&mut item);
        assert_eq!(item.priority, 4);
        assert_eq!(item.created_at, created);
        assert!(item.updated_at >= created);
        assert_eq!(item.description, "original");
    }
}
