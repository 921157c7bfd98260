//! Rate-limited work queues, one per shard.
//!
//! A queue holds keys, never objects. A key waiting to be processed is held
//! at most once, and a key is never handed to two workers at once: a key
//! added while it is being processed is queued again once processing is
//! `done`.

use crate::core::WorkItem;
use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::{
    cmp::Reverse,
    collections::{BinaryHeap, VecDeque},
    num::NonZeroUsize,
    sync::Arc,
};
use tokio::{
    sync::Notify,
    time::{self, Duration, Instant},
};

pub const BASE_DELAY: Duration = Duration::from_millis(5);
pub const MAX_DELAY: Duration = Duration::from_secs(1000);

/// A fixed set of [`WorkQueue`]s. Keys are assigned to a shard by bucket.
#[derive(Debug)]
pub struct ShardedWorkQueue {
    shards: Vec<Arc<WorkQueue>>,
}

#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    backoff: Backoff,
    metrics: ShardMetrics,
}

#[derive(Clone, Debug, Default)]
pub struct QueueMetrics {
    adds: Family<ShardLabels, Counter>,
    retries: Family<ShardLabels, Counter>,
}

#[derive(Clone, Debug, Default)]
struct ShardMetrics {
    adds: Counter,
    retries: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ShardLabels {
    shard: String,
}

/// Per-key exponential backoff.
#[derive(Copy, Clone, Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
}

#[derive(Debug, Default)]
struct State {
    /// Keys ready to be handed to a worker, in the order they became ready.
    ready: VecDeque<WorkItem>,
    /// Keys that need processing: those in `ready` plus those added while
    /// being processed.
    dirty: AHashSet<WorkItem>,
    processing: AHashSet<WorkItem>,
    /// Delayed keys. Entries whose deadline no longer matches `deadlines` are
    /// stale and skipped.
    delayed: BinaryHeap<Reverse<(Instant, WorkItem)>>,
    deadlines: AHashMap<WorkItem, Instant>,
    failures: AHashMap<WorkItem, u32>,
    shutting_down: bool,
}

// === impl ShardedWorkQueue ===

impl ShardedWorkQueue {
    pub fn new(shards: NonZeroUsize, metrics: QueueMetrics) -> Self {
        Self::with_backoff(shards, BASE_DELAY, MAX_DELAY, metrics)
    }

    pub fn with_backoff(
        shards: NonZeroUsize,
        base: Duration,
        max: Duration,
        metrics: QueueMetrics,
    ) -> Self {
        let backoff = Backoff { base, max };
        let shards = (0..shards.get())
            .map(|shard| Arc::new(WorkQueue::new(backoff, metrics.shard(shard))))
            .collect();
        Self { shards }
    }

    pub fn shards(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.shards.len()).unwrap_or(NonZeroUsize::MIN)
    }

    /// The queue for `bucket`. Buckets beyond the shard count wrap.
    pub fn shard(&self, bucket: usize) -> &Arc<WorkQueue> {
        &self.shards[bucket % self.shards.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkQueue>> {
        self.shards.iter()
    }

    /// Adds `item` to the queue for `bucket`, delayed by the item's backoff.
    pub fn enqueue(&self, bucket: usize, item: WorkItem) {
        self.shard(bucket).add_rate_limited(item);
    }

    /// Adds `item` to its namespace's shard.
    pub fn enqueue_item(&self, item: WorkItem) {
        let bucket = item.bucket(self.shards());
        self.enqueue(bucket, item);
    }

    pub fn shutdown(&self) {
        for shard in &self.shards {
            shard.shutdown();
        }
    }
}

// === impl WorkQueue ===

impl WorkQueue {
    fn new(backoff: Backoff, metrics: ShardMetrics) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            backoff,
            metrics,
        }
    }

    /// Makes `item` ready immediately.
    pub fn add(&self, item: WorkItem) {
        let mut state = self.state.lock();
        if state.add(item) {
            self.metrics.adds.inc();
            self.notify.notify_one();
        }
    }

    /// Makes `item` ready once `delay` has elapsed. If the item is already
    /// waiting with an earlier deadline, that deadline is kept.
    pub fn add_after(&self, item: WorkItem, delay: Duration) {
        if delay.is_zero() {
            return self.add(item);
        }

        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        let deadline = Instant::now() + delay;
        if state.deadlines.get(&item).is_some_and(|d| *d <= deadline) {
            return;
        }
        state.deadlines.insert(item.clone(), deadline);
        state.delayed.push(Reverse((deadline, item)));
        self.metrics.adds.inc();
        // Wake the worker so it can recompute how long to sleep.
        self.notify.notify_one();
    }

    /// Adds `item` after its backoff, which doubles with every rate-limited
    /// add until the item is forgotten.
    pub fn add_rate_limited(&self, item: WorkItem) {
        let failures = {
            let mut state = self.state.lock();
            let failures = state.failures.entry(item.clone()).or_default();
            let n = *failures;
            *failures = failures.saturating_add(1);
            n
        };
        if failures > 0 {
            self.metrics.retries.inc();
        }
        self.add_after(item, self.backoff.delay(failures));
    }

    /// Resets the backoff of `item`.
    pub fn forget(&self, item: &WorkItem) {
        self.state.lock().failures.remove(item);
    }

    /// The number of rate-limited adds of `item` since it was last forgotten.
    pub fn failures(&self, item: &WorkItem) -> u32 {
        self.state.lock().failures.get(item).copied().unwrap_or(0)
    }

    /// Marks `item` as processed. If it was added again while being
    /// processed, it is made ready again.
    pub fn done(&self, item: &WorkItem) {
        let mut state = self.state.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.ready.push_back(item.clone());
            self.notify.notify_one();
        }
    }

    /// Waits for the next ready item. Returns `None` once the queue is shut
    /// down and no ready items remain.
    pub async fn get(&self) -> Option<WorkItem> {
        loop {
            let notified = self.notify.notified();

            let wake_at = {
                let mut state = self.state.lock();
                state.promote(Instant::now());
                if let Some(item) = state.pop() {
                    if !state.ready.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
                state.next_deadline()
            };

            match wake_at {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Stops accepting items. Items already ready are still handed out;
    /// delayed items are dropped.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutting_down = true;
        state.delayed.clear();
        state.deadlines.clear();
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// The number of items ready to be handed out.
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === impl State ===

impl State {
    /// Returns true if the item became ready.
    fn add(&mut self, item: WorkItem) -> bool {
        if self.shutting_down || self.dirty.contains(&item) {
            return false;
        }
        self.dirty.insert(item.clone());
        if self.processing.contains(&item) {
            return false;
        }
        self.ready.push_back(item);
        true
    }

    fn pop(&mut self) -> Option<WorkItem> {
        let item = self.ready.pop_front()?;
        self.dirty.remove(&item);
        self.processing.insert(item.clone());
        Some(item)
    }

    /// Moves delayed items whose deadline has passed to the ready queue.
    fn promote(&mut self, now: Instant) {
        while let Some(Reverse((deadline, _))) = self.delayed.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, item))) = self.delayed.pop() else {
                break;
            };
            if self.deadlines.get(&item) != Some(&deadline) {
                continue;
            }
            self.deadlines.remove(&item);
            self.add(item);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.delayed.peek().map(|Reverse((deadline, _))| *deadline)
    }
}

// === impl Backoff ===

impl Backoff {
    fn delay(&self, failures: u32) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

// === impl QueueMetrics ===

impl QueueMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let adds = Family::<ShardLabels, Counter>::default();
        prom.register("adds", "Count of items added to a shard", adds.clone());

        let retries = Family::<ShardLabels, Counter>::default();
        prom.register(
            "retries",
            "Count of rate-limited adds of items that were not forgotten",
            retries.clone(),
        );

        Self { adds, retries }
    }

    fn shard(&self, shard: usize) -> ShardMetrics {
        let labels = ShardLabels {
            shard: shard.to_string(),
        };
        ShardMetrics {
            adds: self.adds.get_or_create(&labels).clone(),
            retries: self.retries.get_or_create(&labels).clone(),
        }
    }
}
