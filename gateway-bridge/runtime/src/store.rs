use crate::{
    core::ResourceId,
    k8s::{Gateway, GatewayClass, ResourceExt, Service},
    status::{GatewayClassLookup, GatewayLookup},
};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A local cache of one resource kind, kept current by an informer.
#[derive(Debug)]
pub struct Store<K> {
    objects: RwLock<AHashMap<ResourceId, Arc<K>>>,
}

/// The caches the router and dispatcher read from.
#[derive(Clone, Debug, Default)]
pub struct Stores {
    pub gateways: Arc<Store<Gateway>>,
    pub classes: Arc<Store<GatewayClass>>,
    pub services: Arc<Store<Service>>,
}

pub fn resource_id<K: ResourceExt>(obj: &K) -> ResourceId {
    ResourceId::new(obj.namespace().unwrap_or_default(), obj.name_unchecked())
}

// === impl Store ===

impl<K> Default for Store<K> {
    fn default() -> Self {
        Self {
            objects: Default::default(),
        }
    }
}

impl<K: ResourceExt> Store<K> {
    pub fn get(&self, id: &ResourceId) -> Option<Arc<K>> {
        self.objects.read().get(id).cloned()
    }

    /// Caches `obj`, returning the object it replaced.
    pub fn apply(&self, obj: Arc<K>) -> Option<Arc<K>> {
        self.objects.write().insert(resource_id(&*obj), obj)
    }

    pub fn remove(&self, id: &ResourceId) -> Option<Arc<K>> {
        self.objects.write().remove(id)
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.objects.read().keys().cloned().collect()
    }

    /// A snapshot of every cached object, ordered by id.
    pub fn list(&self) -> Vec<Arc<K>> {
        let mut objects = self
            .objects
            .read()
            .iter()
            .map(|(id, obj)| (id.clone(), obj.clone()))
            .collect::<Vec<_>>();
        objects.sort_by(|(a, _), (b, _)| a.cmp(b));
        objects.into_iter().map(|(_, obj)| obj).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl GatewayLookup for Store<Gateway> {
    fn gateway(&self, namespace: &str, name: &str) -> Option<Arc<Gateway>> {
        self.get(&ResourceId::new(namespace, name))
    }
}

impl GatewayClassLookup for Store<GatewayClass> {
    fn gateway_class(&self, name: &str) -> Option<Arc<GatewayClass>> {
        self.get(&ResourceId::cluster_scoped(name))
    }
}
