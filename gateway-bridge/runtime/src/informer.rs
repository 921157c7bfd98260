//! Drives a [`ResourceEventHandler`] from a watch stream.
//!
//! The store is always updated before the handler runs, so handlers (and the
//! lookups they use) observe the event's object in the cache.

use crate::{core::ResourceId, store::resource_id, Store};
use ahash::AHashSet;
use futures::prelude::*;
use kube::{runtime::watcher, ResourceExt};
use std::sync::Arc;

/// Informer callbacks for one resource kind.
///
/// Callbacks for a kind are invoked sequentially, in watch order.
#[async_trait::async_trait]
pub trait ResourceEventHandler<K>: Send + Sync {
    async fn add(&self, obj: Arc<K>);

    async fn update(&self, old: Arc<K>, new: Arc<K>);

    async fn delete(&self, obj: Arc<K>);
}

/// Applies watch events to `store` and notifies `handler` until the stream
/// ends.
///
/// A re-list (`Init` .. `InitDone`) is reconciled against the cache: objects
/// not seen in the re-list are removed and reported as deleted.
pub async fn run<K, H, S>(store: Arc<Store<K>>, handler: Arc<H>, events: S)
where
    K: ResourceExt + Send + Sync + 'static,
    H: ResourceEventHandler<K> + ?Sized,
    S: Stream<Item = watcher::Event<K>>,
{
    tokio::pin!(events);

    let mut relisted: Option<AHashSet<ResourceId>> = None;
    while let Some(event) = events.next().await {
        match event {
            watcher::Event::Init => {
                tracing::debug!("Re-listing");
                relisted = Some(AHashSet::new());
            }

            watcher::Event::InitApply(obj) => {
                if let Some(seen) = relisted.as_mut() {
                    seen.insert(resource_id(&obj));
                }
                apply(&store, &*handler, obj).await;
            }

            watcher::Event::InitDone => {
                let seen = relisted.take().unwrap_or_default();
                for id in store.ids() {
                    if seen.contains(&id) {
                        continue;
                    }
                    if let Some(obj) = store.remove(&id) {
                        tracing::debug!(%id, "Removed during re-list");
                        handler.delete(obj).await;
                    }
                }
            }

            watcher::Event::Apply(obj) => apply(&store, &*handler, obj).await,

            watcher::Event::Delete(obj) => {
                store.remove(&resource_id(&obj));
                handler.delete(Arc::new(obj)).await;
            }
        }
    }

    tracing::debug!("Watch stream ended");
}

async fn apply<K, H>(store: &Store<K>, handler: &H, obj: K)
where
    K: ResourceExt,
    H: ResourceEventHandler<K> + ?Sized,
{
    let obj = Arc::new(obj);
    match store.apply(obj.clone()) {
        Some(old) => handler.update(old, obj).await,
        None => handler.add(obj).await,
    }
}
