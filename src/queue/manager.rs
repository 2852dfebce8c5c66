//! Queue manager: accepts generation requests, keeps them in tier order,
//! and drains them in small concurrent batches separated by a cooldown.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::priority::prioritize;
use crate::error::{Error, Result};
use crate::event::{DrainState, ItemProcessed, QueueStatus};
use crate::generator::ImageGenerator;
use crate::model::{ArtifactUrl, ItemId, ItemSummary, QueueItem};
use crate::telemetry::metrics;
use crate::telemetry::queue::{
    record_batch_failures, record_item_outcome, start_batch_span, start_item_span,
};

/// Default number of generator calls in flight per batch.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default pause between one batch finishing and the next starting.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);
/// Default buffer of each observer channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Tuning for the drain loop.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum items dispatched together in one batch.
    pub concurrency: usize,
    /// Fixed delay between batches.
    pub cooldown: Duration,
    /// Buffer of each broadcast channel. Slow subscribers see `Lagged`.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cooldown: DEFAULT_COOLDOWN,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Mutable queue state. Always accessed under one lock so every
/// transition is a single assignment.
struct QueueState {
    pending: Vec<QueueItem>,
    current_batch: Vec<ItemSummary>,
    drain: DrainState,
    processed: u64,
    next_seq: u64,
    /// Bumped by `clear` and `force_restart`. A drain task whose epoch is
    /// stale no longer owns the queue and must not touch it.
    epoch: u64,
}

impl QueueState {
    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            state: self.drain,
            running: self.drain.is_running(),
            pending_count: self.pending.len(),
            current_batch: self.current_batch.clone(),
            processed_count: self.processed,
        }
    }
}

struct Inner {
    generator: Arc<dyn ImageGenerator>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    runtime: Handle,
    state: Mutex<QueueState>,
    status_tx: broadcast::Sender<QueueStatus>,
    items_tx: broadcast::Sender<ItemProcessed>,
}

/// Handle to a queue. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

impl QueueManager {
    /// Build a queue bound to the current tokio runtime.
    ///
    /// # Errors
    /// `Error::Config` for a zero concurrency or channel capacity,
    /// `Error::Runtime` when called outside a tokio runtime.
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if config.event_capacity == 0 {
            return Err(Error::Config(
                "event capacity must be at least 1".to_string(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("queue manager needs a tokio runtime: {e}")))?;

        let (status_tx, _) = broadcast::channel(config.event_capacity);
        let (items_tx, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                generator,
                clock,
                config,
                runtime,
                state: Mutex::new(QueueState {
                    pending: Vec::new(),
                    current_batch: Vec::new(),
                    drain: DrainState::Idle,
                    processed: 0,
                    next_seq: 0,
                    epoch: 0,
                }),
                status_tx,
                items_tx,
            }),
        })
    }

    /// Add an item. A second item with an id that is already pending is
    /// ignored. Starts the drain loop when the queue is idle.
    pub fn enqueue(&self, mut item: QueueItem) {
        let area = KeyValue::new("area", item.area.0.clone());
        let mut st = self.inner.state.lock();

        if st.pending.iter().any(|p| p.id == item.id) {
            debug!(id = %item.id, "already pending, ignoring duplicate");
            metrics::items_enqueued().add(1, &[area, KeyValue::new("result", "duplicate")]);
            return;
        }

        item.seq = st.next_seq;
        st.next_seq += 1;
        debug!(id = %item.id, area = %item.area, "enqueued");
        st.pending.push(item);
        prioritize(&mut st.pending);
        metrics::items_enqueued().add(1, &[area, KeyValue::new("result", "ok")]);

        let start = st.drain == DrainState::Idle;
        if start {
            st.drain = DrainState::Draining;
        }
        self.inner.publish(&st);
        let epoch = st.epoch;
        drop(st);

        if start {
            self.inner.spawn_drain(epoch);
        }
    }

    /// Remove a pending item and re-tier what is left. Items already pulled
    /// into a batch are not affected. Returns whether anything was removed.
    pub fn dequeue(&self, id: &ItemId) -> bool {
        let mut st = self.inner.state.lock();
        let Some(pos) = st.pending.iter().position(|p| &p.id == id) else {
            return false;
        };
        st.pending.remove(pos);
        prioritize(&mut st.pending);
        debug!(%id, "dequeued");
        record_operation("dequeue");
        self.inner.publish(&st);
        true
    }

    /// Stop starting new batches. A batch already in flight completes.
    pub fn pause(&self) {
        let mut st = self.inner.state.lock();
        st.drain = match st.drain {
            DrainState::Draining => DrainState::Pausing,
            DrainState::Idle => DrainState::Paused,
            other => other,
        };
        info!(state = %st.drain, "pause requested");
        record_operation("pause");
        self.inner.publish(&st);
    }

    /// Lift a pause. Restarts the drain loop if work is pending and no
    /// loop is alive.
    pub fn resume(&self) {
        let mut st = self.inner.state.lock();
        let spawn = match st.drain {
            DrainState::Pausing => {
                st.drain = DrainState::Draining;
                false
            }
            DrainState::Paused if st.pending.is_empty() => {
                st.drain = DrainState::Idle;
                false
            }
            DrainState::Paused => {
                st.drain = DrainState::Draining;
                true
            }
            DrainState::Idle | DrainState::Draining => false,
        };
        info!(state = %st.drain, pending = st.pending.len(), "resumed");
        record_operation("resume");
        self.inner.publish(&st);
        let epoch = st.epoch;
        drop(st);

        if spawn {
            self.inner.spawn_drain(epoch);
        }
    }

    /// Drop every pending item and return to idle.
    ///
    /// Calls already dispatched keep running and fire their hooks, but
    /// their drain task is orphaned and leaves the queue untouched.
    pub fn clear(&self) {
        let mut st = self.inner.state.lock();
        let dropped = st.pending.len();
        st.pending.clear();
        st.current_batch.clear();
        st.drain = DrainState::Idle;
        st.epoch += 1;
        info!(dropped, epoch = st.epoch, "queue cleared");
        record_operation("clear");
        self.inner.publish(&st);
    }

    /// Abandon the current drain task (if any) and start a fresh one over
    /// the pending items. Clears any pause.
    pub fn force_restart(&self) {
        let mut st = self.inner.state.lock();
        st.epoch += 1;
        st.current_batch.clear();
        st.drain = if st.pending.is_empty() {
            DrainState::Idle
        } else {
            DrainState::Draining
        };
        warn!(
            epoch = st.epoch,
            pending = st.pending.len(),
            "drain loop force-restarted"
        );
        record_operation("force_restart");
        self.inner.publish(&st);
        let (spawn, epoch) = (st.drain == DrainState::Draining, st.epoch);
        drop(st);

        if spawn {
            self.inner.spawn_drain(epoch);
        }
    }

    pub fn status(&self) -> QueueStatus {
        self.inner.state.lock().snapshot()
    }

    /// Pending items in drain order.
    pub fn pending(&self) -> Vec<ItemSummary> {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .map(QueueItem::summary)
            .collect()
    }

    /// Status after every mutation. Drop the receiver to unsubscribe.
    pub fn subscribe_status(&self) -> broadcast::Receiver<QueueStatus> {
        self.inner.status_tx.subscribe()
    }

    /// One record per processed item. Drop the receiver to unsubscribe.
    pub fn subscribe_items(&self) -> broadcast::Receiver<ItemProcessed> {
        self.inner.items_tx.subscribe()
    }

    /// Wait until no drain task owns the queue, i.e. it drained, paused,
    /// or was cleared. Orphaned calls from a `clear` may still be settling.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe_status();
        if !self.status().running {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(status) if !status.running => return,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if !self.status().running {
                        return;
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}

fn record_operation(operation: &'static str) {
    metrics::queue_operations().add(1, &[KeyValue::new("operation", operation)]);
}

impl Inner {
    fn publish(&self, st: &QueueState) {
        // No subscribers is fine.
        let _ = self.status_tx.send(st.snapshot());
    }

    fn spawn_drain(self: &Arc<Self>, epoch: u64) {
        let inner = Arc::clone(self);
        self.runtime.spawn(inner.drain(epoch));
    }

    /// The drain loop. Owns the queue while its epoch is current.
    async fn drain(self: Arc<Self>, epoch: u64) {
        info!(epoch, "drain loop started");
        loop {
            let batch = {
                let mut st = self.state.lock();
                if st.epoch != epoch {
                    debug!(epoch, "drain loop superseded");
                    return;
                }
                match st.drain {
                    DrainState::Draining => {}
                    DrainState::Pausing => {
                        st.drain = DrainState::Paused;
                        info!(pending = st.pending.len(), "drain loop paused");
                        self.publish(&st);
                        return;
                    }
                    other => {
                        warn!(state = %other, "drain loop found no work to own, exiting");
                        return;
                    }
                }
                if st.pending.is_empty() {
                    st.drain = DrainState::Idle;
                    info!(processed = st.processed, "queue drained");
                    self.publish(&st);
                    return;
                }

                let take = self.config.concurrency.min(st.pending.len());
                let batch: Vec<QueueItem> = st.pending.drain(..take).collect();
                prioritize(&mut st.pending);
                st.current_batch = batch.iter().map(QueueItem::summary).collect();
                self.publish(&st);
                batch
            };

            let size = batch.len();
            self.run_batch(batch, epoch).await;

            let cool_down = {
                let mut st = self.state.lock();
                if st.epoch != epoch {
                    debug!(epoch, size, "orphaned batch settled");
                    return;
                }
                st.processed += size as u64;
                st.current_batch.clear();
                self.publish(&st);
                st.drain == DrainState::Draining && !st.pending.is_empty()
            };

            if cool_down {
                self.clock.sleep(self.config.cooldown).await;
            }
        }
    }

    /// Dispatch every item concurrently and wait for all of them to settle.
    async fn run_batch(&self, batch: Vec<QueueItem>, epoch: u64) {
        let batch_id = Uuid::new_v4();
        let span = start_batch_span(&batch_id, batch.len(), epoch);
        let started = self.clock.now();

        async {
            info!(size = batch.len(), "batch dispatched");
            let outcomes =
                join_all(batch.into_iter().map(|item| self.process_item(item, batch_id))).await;
            let failures = outcomes.iter().filter(|ok| !**ok).count();
            record_batch_failures(&span, failures);

            let elapsed = self.clock.now().saturating_duration_since(started);
            metrics::batch_duration_ms().record(elapsed.as_secs_f64() * 1000.0, &[]);
            info!(
                size = outcomes.len(),
                failures,
                duration_ms = elapsed.as_millis() as u64,
                "batch settled"
            );
        }
        .instrument(span.clone())
        .await
    }

    /// One attempt for one item. Failures and panics in the generator are
    /// captured so siblings in the batch are unaffected.
    async fn process_item(&self, mut item: QueueItem, batch_id: Uuid) -> bool {
        let span = start_item_span(&item);

        async {
            let attempt = AssertUnwindSafe(self.generator.generate(&item.request))
                .catch_unwind()
                .await;
            let result: std::result::Result<ArtifactUrl, String> = match attempt {
                Ok(Ok(url)) => Ok(url),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("generator panicked".to_string()),
            };
            let success = result.is_ok();
            record_item_outcome(&span, success);

            let error_message = match result {
                Ok(url) => {
                    info!(id = %item.id, %url, "artifact generated");
                    if let Some(hook) = item.on_success.take() {
                        run_hook(&item.id, move || hook(url));
                    }
                    None
                }
                Err(message) => {
                    warn!(id = %item.id, error = %message, "generation failed");
                    if let Some(hook) = item.on_error.take() {
                        let msg = message.clone();
                        run_hook(&item.id, move || hook(msg));
                    }
                    Some(message)
                }
            };

            metrics::items_processed().add(
                1,
                &[KeyValue::new(
                    "result",
                    if success { "success" } else { "failure" },
                )],
            );
            let _ = self.items_tx.send(ItemProcessed {
                item: item.summary(),
                success,
                error_message,
                batch_id,
                finished_at: Utc::now(),
            });

            success
        }
        .instrument(span.clone())
        .await
    }
}

/// Run a caller hook, containing a panic to the item that owns it.
fn run_hook(id: &ItemId, hook: impl FnOnce()) {
    if std::panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
        error!(%id, "completion hook panicked");
    }
}
