//! Observer payloads published by the queue manager.
//!
//! Two separate streams: aggregate status after every queue mutation, and
//! one completion record per processed item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ItemSummary;

/// Scheduling state of the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// No drain task alive.
    Idle,
    /// A drain task is alive and will start the next batch when one is due.
    Draining,
    /// Pause requested while the drain task is still alive; it stops at its
    /// next top-of-loop check.
    Pausing,
    /// No drain task alive, scheduling suspended until resume.
    Paused,
}

impl DrainState {
    /// Is a drain task alive in this state?
    pub fn is_running(self) -> bool {
        matches!(self, DrainState::Draining | DrainState::Pausing)
    }

    /// Has the operator suspended scheduling?
    pub fn is_paused(self) -> bool {
        matches!(self, DrainState::Pausing | DrainState::Paused)
    }
}

impl std::fmt::Display for DrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrainState::Idle => "idle",
            DrainState::Draining => "draining",
            DrainState::Pausing => "pausing",
            DrainState::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of the queue, pushed to status subscribers on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub state: DrainState,
    pub running: bool,
    pub pending_count: usize,
    pub current_batch: Vec<ItemSummary>,
    /// Items settled by a batch that still owned the queue. Batches
    /// orphaned by `clear` or `force_restart` are not counted.
    pub processed_count: u64,
}

/// Completion record for one item, pushed once after its single attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProcessed {
    pub item: ItemSummary,
    pub success: bool,
    pub error_message: Option<String>,
    pub batch_id: Uuid,
    pub finished_at: DateTime<Utc>,
}
