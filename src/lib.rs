//! # genq
//!
//! In-process job queue in front of a slow, rate-limited image-generation
//! service.
//!
//! Work is ordered by backlog-size fairness tiers (small areas drain
//! first) and dispatched in small concurrent batches separated by a fixed
//! cooldown. Operators can pause, resume, clear, and force-restart the
//! drain loop, and observe it through status and per-item broadcast
//! streams.

pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod model;
pub mod queue;
pub mod telemetry;
