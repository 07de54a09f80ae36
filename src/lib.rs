//! # workreg
//!
//! Resilient work-item registry: a key-value-backed entity store wrapped
//! in failure-isolation controls (circuit breaker + bulkhead), with
//! deterministic conflict resolution and similarity-based field
//! suggestion. One parameterized registry serves the planning,
//! development, QA, architecture, and UX agent keyspaces.

pub mod config;
pub mod conflict;
pub mod error;
pub mod guard;
pub mod hints;
pub mod model;
pub mod registry;
pub mod similarity;
pub mod store;
pub mod telemetry;
