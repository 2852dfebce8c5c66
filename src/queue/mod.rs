//! Throttled, tier-prioritized generation queue.

pub mod clock;
pub mod manager;
pub mod priority;

pub use clock::{Clock, TokioClock};
pub use manager::{QueueConfig, QueueManager};
pub use priority::{plan, prioritize, tier_for_count};
