//! Queue span helpers.
//!
//! One span per batch, one child span per item dispatched in it.

use tracing::Span;
use uuid::Uuid;

use crate::model::QueueItem;

/// Start a span covering one batch from dispatch to join.
pub fn start_batch_span(batch_id: &Uuid, size: usize, epoch: u64) -> Span {
    tracing::info_span!(
        "queue.batch",
        "queue.batch.id" = %batch_id,
        "queue.batch.size" = size,
        "queue.epoch" = epoch,
        "queue.batch.failures" = tracing::field::Empty,
    )
}

/// Start a span for a single generation attempt.
///
/// `queue.item.outcome` is declared empty and filled by [`record_item_outcome`].
pub fn start_item_span(item: &QueueItem) -> Span {
    tracing::info_span!(
        "queue.item",
        "queue.item.id" = %item.id,
        "queue.item.area" = %item.area,
        "queue.item.tier" = item.tier(),
        "queue.item.outcome" = tracing::field::Empty,
    )
}

/// Record whether the attempt succeeded.
pub fn record_item_outcome(span: &Span, success: bool) {
    span.record(
        "queue.item.outcome",
        if success { "success" } else { "failure" },
    );
}

/// Record how many items in a batch failed once it has joined.
pub fn record_batch_failures(span: &Span, failures: usize) {
    span.record("queue.batch.failures", failures);
}
