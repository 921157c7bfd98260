use super::*;
use crate::{queue::BASE_DELAY, spawn_workers, Dispatch};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

/// Records every dispatch and fails the first `failures` of them.
#[derive(Default)]
struct Flaky {
    failures: usize,
    calls: Mutex<Vec<(WorkItem, Instant)>>,
}

#[async_trait::async_trait]
impl Dispatch for Flaky {
    async fn dispatch(&self, item: &WorkItem) -> anyhow::Result<()> {
        let mut calls = self.calls.lock();
        calls.push((item.clone(), Instant::now()));
        if calls.len() <= self.failures {
            anyhow::bail!("downstream unavailable");
        }
        Ok(())
    }
}

impl Flaky {
    fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(WorkItem, Instant)> {
        self.calls.lock().clone()
    }
}

fn single_shard() -> ShardedWorkQueue {
    ShardedWorkQueue::new(NonZeroUsize::MIN, QueueMetrics::default())
}

async fn join(workers: Vec<tokio::task::JoinHandle<()>>) {
    for worker in futures::future::join_all(workers).await {
        worker.expect("worker must not panic");
    }
}

#[tokio::test(start_paused = true)]
async fn failed_dispatch_is_retried_after_backoff() {
    let queue = single_shard();
    let dispatch = Arc::new(Flaky::failing(1));
    let workers = spawn_workers(&queue, dispatch.clone());

    let item = WorkItem::gateway("ns1", "gw1");
    queue.shard(0).add(item.clone());
    while dispatch.calls().len() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    queue.shutdown();
    join(workers).await;

    let calls = dispatch.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, item);
    assert_eq!(calls[1].0, item);
    let elapsed = calls[1].1 - calls[0].1;
    assert!(
        elapsed >= BASE_DELAY && elapsed < BASE_DELAY * 2,
        "retried after {elapsed:?}"
    );
    assert_eq!(queue.shard(0).failures(&item), 0);
}

#[tokio::test(start_paused = true)]
async fn workers_drain_ready_items_before_exiting() {
    let queue = single_shard();
    let dispatch = Arc::new(Flaky::default());
    let workers = spawn_workers(&queue, dispatch.clone());

    let items = vec![
        WorkItem::gateway("ns1", "gw1"),
        WorkItem::service("ns1", "svc-a"),
    ];
    for item in &items {
        queue.shard(0).add(item.clone());
    }
    queue.shutdown();
    join(workers).await;

    let dispatched = dispatch
        .calls()
        .into_iter()
        .map(|(item, _)| item)
        .collect::<Vec<_>>();
    assert_eq!(dispatched, items);
    assert!(queue.shard(0).is_empty());
}

#[tokio::test(start_paused = true)]
async fn workers_wait_until_shutdown() {
    let queue = single_shard();
    let workers = spawn_workers(&queue, Arc::new(Flaky::default()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(workers.iter().all(|w| !w.is_finished()));

    queue.shutdown();
    join(workers).await;
}
