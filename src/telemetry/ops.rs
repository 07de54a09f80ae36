//! Registry operation span helpers.
//!
//! Every registry operation runs inside one of these spans, mirroring
//! the per-operation tracing the agents emit.

use tracing::Span;

use crate::model::AgentKind;

/// Start a span for a registry operation.
pub fn registry_span(op: &str, kind: AgentKind, item_id: Option<&str>) -> Span {
    match item_id {
        Some(id) => tracing::info_span!(
            "registry.op",
            "registry.op" = op,
            "registry.kind" = %kind,
            "registry.item_id" = id,
        ),
        None => tracing::info_span!(
            "registry.op",
            "registry.op" = op,
            "registry.kind" = %kind,
            "registry.item_id" = tracing::field::Empty,
        ),
    }
}
