//! Metric instrument factories for workreg.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"workreg"` meter.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

/// Returns the shared meter for workreg instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workreg")
}

/// Counter: work items created.
/// Labels: `kind`.
pub fn items_created() -> Counter<u64> {
    meter()
        .u64_counter("workreg.items.created")
        .with_description("Number of work items created")
        .build()
}

/// Counter: conflict resolutions.
/// Labels: `kind`, `reason` (the decision tag).
pub fn conflicts_resolved() -> Counter<u64> {
    meter()
        .u64_counter("workreg.conflicts.resolved")
        .with_description("Number of conflicts resolved")
        .build()
}

/// Counter: circuit breaker state transitions.
/// Labels: `guard`, `from`, `to`.
pub fn circuit_transitions() -> Counter<u64> {
    meter()
        .u64_counter("workreg.circuit.transitions")
        .with_description("Number of circuit breaker state transitions")
        .build()
}

/// Gauge: 1 when the circuit is open, else 0.
/// Labels: `guard`.
pub fn circuit_open() -> Gauge<u64> {
    meter()
        .u64_gauge("workreg.circuit.open")
        .with_description("Circuit breaker open state")
        .build()
}

/// Counter: operations rejected before reaching the store.
/// Labels: `guard`, `reason` ("circuit_open" | "bulkhead_timeout").
pub fn guard_rejections() -> Counter<u64> {
    meter()
        .u64_counter("workreg.guard.rejections")
        .with_description("Operations rejected by the failure guard")
        .build()
}

/// Histogram: guarded store operation duration in milliseconds.
/// Labels: `guard`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workreg.operation.duration_ms")
        .with_description("Guarded store operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
