//! Core data model.
//!
//! A queue item is one deferred "generate an artifact for subject X" call.
//! It has identity (the subject), an area used only for fairness tiers,
//! an opaque payload for the generator, and optional completion hooks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Caller-supplied identity of the subject being processed.
/// At most one pending item may carry a given id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Classification label used purely for fairness accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Area(pub String);

impl Area {
    pub fn new(area: impl Into<String>) -> Self {
        Self(area.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Priority class derived from the pending backlog of an item's area.
/// Lower drains first.
pub type Tier = u8;

// ---------------------------------------------------------------------------
// Generator contract
// ---------------------------------------------------------------------------

/// Input handed to the external generator, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub subject_id: String,
    pub text_content: String,
    pub area_label: String,
    pub topic_label: String,
    pub dataset_name: String,
}

/// Reference to a produced artifact (usually a public URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactUrl(pub String);

impl fmt::Display for ArtifactUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

pub type SuccessHook = Box<dyn FnOnce(ArtifactUrl) + Send + 'static>;
pub type ErrorHook = Box<dyn FnOnce(String) + Send + 'static>;

// ---------------------------------------------------------------------------
// Queue Item
// ---------------------------------------------------------------------------

/// A unit of deferred work owned by the queue.
///
/// Hooks are `FnOnce`, so each fires at most once.
pub struct QueueItem {
    pub id: ItemId,
    pub area: Area,
    pub request: GenerationRequest,
    /// Reassigned by the priority pass whenever the pending set changes.
    pub(crate) tier: Tier,
    /// Enqueue order, used as the tie-break within a tier.
    pub(crate) seq: u64,
    pub(crate) enqueued_at: DateTime<Utc>,
    pub(crate) on_success: Option<SuccessHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl QueueItem {
    /// Build an item for `request`. The subject id doubles as the item
    /// identity and the request's area label as the fairness area.
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: ItemId::new(request.subject_id.clone()),
            area: Area::new(request.area_label.clone()),
            request,
            tier: 1,
            seq: 0,
            enqueued_at: Utc::now(),
            on_success: None,
            on_error: None,
        }
    }

    /// Account this item under a different fairness area than its label.
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Area::new(area);
        self
    }

    pub fn on_success(mut self, hook: impl FnOnce(ArtifactUrl) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id.clone(),
            area: self.area.clone(),
            tier: self.tier,
            enqueued_at: self.enqueued_at,
        }
    }
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("id", &self.id)
            .field("area", &self.area)
            .field("tier", &self.tier)
            .field("seq", &self.seq)
            .field("has_on_success", &self.on_success.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Cloneable view of a queue item, used in status snapshots and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub area: Area,
    pub tier: Tier,
    pub enqueued_at: DateTime<Utc>,
}
