//! Metric instrument factories for genq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider the global meter is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("genq")
}

/// Counter: enqueue calls.
/// Labels: `area`, `result` ("ok" | "duplicate").
pub fn items_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("genq.items.enqueued")
        .with_description("Number of enqueue calls")
        .build()
}

/// Counter: items whose single attempt has settled.
/// Labels: `result` ("success" | "failure").
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("genq.items.processed")
        .with_description("Number of items processed")
        .build()
}

/// Counter: operator controls (dequeue, pause, resume, clear, force_restart).
/// Labels: `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("genq.queue.operations")
        .with_description("Number of queue control operations")
        .build()
}

/// Histogram: wall time from batch dispatch to join.
pub fn batch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("genq.batch.duration_ms")
        .with_description("Batch duration in milliseconds")
        .with_unit("ms")
        .build()
}
