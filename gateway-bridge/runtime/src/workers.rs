use crate::{
    core::{ResourceKind, WorkItem},
    ShardedWorkQueue, Stores, WorkQueue,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

/// Hands a dequeued key to the downstream controller.
#[async_trait::async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, item: &WorkItem) -> anyhow::Result<()>;
}

/// Looks the item up in the local caches and reports whether the downstream
/// state should be synced or cleaned up.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    stores: Stores,
}

// === impl Dispatcher ===

impl Dispatcher {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    fn is_present(&self, item: &WorkItem) -> bool {
        match item.kind {
            ResourceKind::Gateway => self.stores.gateways.get(&item.id).is_some(),
            ResourceKind::GatewayClass => self.stores.classes.get(&item.id).is_some(),
            ResourceKind::Service => self.stores.services.get(&item.id).is_some(),
        }
    }
}

#[async_trait::async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(&self, item: &WorkItem) -> anyhow::Result<()> {
        if self.is_present(item) {
            tracing::info!(key = %item, "Syncing");
        } else {
            tracing::info!(key = %item, "Cleaning up");
        }
        Ok(())
    }
}

/// Spawns one worker per shard. Each worker exits once its queue is shut down
/// and drained.
pub fn spawn_workers(
    queue: &ShardedWorkQueue,
    dispatch: Arc<dyn Dispatch>,
) -> Vec<JoinHandle<()>> {
    queue
        .iter()
        .enumerate()
        .map(|(shard, q)| {
            tokio::spawn(
                run_worker(q.clone(), dispatch.clone()).instrument(info_span!("worker", shard)),
            )
        })
        .collect()
}

async fn run_worker(queue: Arc<WorkQueue>, dispatch: Arc<dyn Dispatch>) {
    while let Some(item) = queue.get().await {
        match dispatch.dispatch(&item).await {
            Ok(()) => queue.forget(&item),
            Err(error) => {
                tracing::warn!(key = %item, %error, "Dispatch failed");
                queue.add_rate_limited(item.clone());
            }
        }
        queue.done(&item);
    }
    tracing::debug!("Queue drained");
}
