use crate::{
    core::{ResourceId, ResourceIndex, ServiceBinding, WorkItem},
    informer::ResourceEventHandler,
    k8s::{Gateway, GatewayClass, GatewaySpec, ResourceExt, Service},
    service::service_binding,
    status::{
        AddressGuard, ConflictDetector, ServiceCheck, SharedIndex, StatusReconciler, StatusStore,
    },
    store::resource_id,
    ShardedWorkQueue, Stores, SyncGate,
};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::sync::Arc;

/// Routes informer notifications through the status checks and into the
/// work queue.
pub struct EventRouter {
    gate: SyncGate,
    index: SharedIndex,
    stores: Stores,
    reconciler: StatusReconciler,
    detector: ConflictDetector,
    address: AddressGuard,
    queue: Arc<ShardedWorkQueue>,
    metrics: RouterMetrics,
}

#[derive(Clone, Debug, Default)]
pub struct RouterMetrics {
    events: Family<EventLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EventLabels {
    kind: &'static str,
    op: &'static str,
    outcome: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Update,
    Delete,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Outcome {
    Enqueued,
    /// The sync gate is closed.
    Gated,
    Unchanged,
    /// The resource is not managed by this bridge.
    Ignored,
    /// The update was rejected by the address guard.
    Rejected,
    /// The service's gateway is not cached.
    Dropped,
}

// === impl EventRouter ===

impl EventRouter {
    pub fn new(
        gate: SyncGate,
        index: SharedIndex,
        stores: Stores,
        status: Arc<dyn StatusStore>,
        controller_name: impl ToString,
        queue: Arc<ShardedWorkQueue>,
        metrics: RouterMetrics,
    ) -> Self {
        let reconciler =
            StatusReconciler::new(controller_name, stores.classes.clone(), status.clone());
        let detector =
            ConflictDetector::new(index.clone(), stores.gateways.clone(), status.clone());
        let address = AddressGuard::new(status);
        Self {
            gate,
            index,
            stores,
            reconciler,
            detector,
            address,
            queue,
            metrics,
        }
    }

    /// Rebuilds the service index from the cache and enqueues every cached
    /// object.
    ///
    /// Gateways are validated again, as on add, so that events dropped while
    /// the gate was closed are reflected in their status.
    pub async fn resync(&self) {
        // The cache is listed under the index lock: a concurrent service
        // event is either in the snapshot or applied to the rebuilt index.
        let services = {
            let mut guard = self.index.write();
            let services = self.stores.services.list();
            let mut index = ResourceIndex::default();
            for service in &services {
                if let Some(binding) = service_binding(service) {
                    index.bind(resource_id(&**service), binding);
                }
            }
            *guard = index;
            services
        };

        for class in self.stores.classes.list() {
            self.enqueue(WorkItem::gateway_class(class.name_unchecked()));
        }

        for gateway in self.stores.gateways.list() {
            let mut gateway = Gateway::clone(&gateway);
            self.validate(&mut gateway).await;
            self.enqueue(gateway_item(&gateway));
        }

        for service in services {
            if service_binding(&service).is_some() {
                let id = resource_id(&*service);
                self.enqueue(WorkItem::service(id.namespace, id.name));
            }
        }

        tracing::info!(
            gateways = self.stores.gateways.len(),
            classes = self.stores.classes.len(),
            services = self.index.read().services_len(),
            "Resynced",
        );
    }

    /// Runs the status reconciler and then the gateway conflict check.
    /// Failures to persist status are logged; the gateway is still enqueued.
    async fn validate(&self, gateway: &mut Gateway) {
        let namespace = gateway.namespace().unwrap_or_default();
        let name = gateway.name_unchecked();

        match self.reconciler.reconcile(gateway).await {
            Ok(validity) => tracing::debug!(%namespace, %name, ?validity, "Reconciled status"),
            Err(error) => {
                tracing::error!(%namespace, %name, %error, "Failed to update gateway status")
            }
        }

        if let Err(error) = self.detector.check_gateway(gateway).await {
            tracing::error!(%namespace, %name, %error, "Failed to report gateway conflict");
        }
    }

    /// Binds the service in the index and checks it against the services
    /// already bound to its gateway.
    async fn bind_service(&self, id: ResourceId, binding: ServiceBinding) -> Outcome {
        self.index.write().bind(id.clone(), binding.clone());

        match self.detector.check_service(&id, &binding).await {
            Ok(ServiceCheck::GatewayNotFound) => return Outcome::Dropped,
            Ok(ServiceCheck::Clear) | Ok(ServiceCheck::Conflict(_)) => {}
            Err(error) => {
                tracing::error!(service = %id, %error, "Failed to report service conflict")
            }
        }

        self.enqueue(WorkItem::service(id.namespace, id.name));
        Outcome::Enqueued
    }

    fn enqueue(&self, item: WorkItem) {
        tracing::debug!(key = %item, "Enqueueing");
        self.queue.enqueue_item(item);
    }

    fn gated(&self, kind: &'static str, op: Op) -> bool {
        if self.gate.is_enabled() {
            return false;
        }
        tracing::trace!(kind, ?op, "Sync disabled; dropping event");
        self.metrics.record(kind, op, Outcome::Gated);
        true
    }
}

#[async_trait::async_trait]
impl ResourceEventHandler<Gateway> for EventRouter {
    async fn add(&self, gateway: Arc<Gateway>) {
        if self.gated(KIND_GATEWAY, Op::Add) {
            return;
        }

        let mut gateway = Gateway::clone(&gateway);
        self.validate(&mut gateway).await;
        self.enqueue(gateway_item(&gateway));
        self.metrics.record(KIND_GATEWAY, Op::Add, Outcome::Enqueued);
    }

    async fn update(&self, old: Arc<Gateway>, new: Arc<Gateway>) {
        if self.gated(KIND_GATEWAY, Op::Update) {
            return;
        }

        if spec_unchanged(&old.spec, &new.spec) {
            self.metrics.record(KIND_GATEWAY, Op::Update, Outcome::Unchanged);
            return;
        }

        let mut gateway = Gateway::clone(&new);
        match self.address.check(&old, &mut gateway).await {
            Ok(transition) if transition.is_rejected() => {
                self.metrics.record(KIND_GATEWAY, Op::Update, Outcome::Rejected);
                return;
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!(
                    namespace = %gateway.namespace().unwrap_or_default(),
                    name = %gateway.name_unchecked(),
                    %error,
                    "Failed to report address rejection",
                );
                self.metrics.record(KIND_GATEWAY, Op::Update, Outcome::Rejected);
                return;
            }
        }

        self.validate(&mut gateway).await;
        self.enqueue(gateway_item(&gateway));
        self.metrics.record(KIND_GATEWAY, Op::Update, Outcome::Enqueued);
    }

    async fn delete(&self, gateway: Arc<Gateway>) {
        if self.gated(KIND_GATEWAY, Op::Delete) {
            return;
        }

        self.enqueue(gateway_item(&gateway));
        self.metrics.record(KIND_GATEWAY, Op::Delete, Outcome::Enqueued);
    }
}

#[async_trait::async_trait]
impl ResourceEventHandler<GatewayClass> for EventRouter {
    async fn add(&self, class: Arc<GatewayClass>) {
        if self.gated(KIND_GATEWAY_CLASS, Op::Add) {
            return;
        }

        self.enqueue(WorkItem::gateway_class(class.name_unchecked()));
        self.metrics.record(KIND_GATEWAY_CLASS, Op::Add, Outcome::Enqueued);
    }

    async fn update(&self, old: Arc<GatewayClass>, new: Arc<GatewayClass>) {
        if self.gated(KIND_GATEWAY_CLASS, Op::Update) {
            return;
        }

        if old.spec == new.spec {
            self.metrics.record(KIND_GATEWAY_CLASS, Op::Update, Outcome::Unchanged);
            return;
        }

        self.enqueue(WorkItem::gateway_class(new.name_unchecked()));
        self.metrics.record(KIND_GATEWAY_CLASS, Op::Update, Outcome::Enqueued);
    }

    async fn delete(&self, class: Arc<GatewayClass>) {
        if self.gated(KIND_GATEWAY_CLASS, Op::Delete) {
            return;
        }

        self.enqueue(WorkItem::gateway_class(class.name_unchecked()));
        self.metrics.record(KIND_GATEWAY_CLASS, Op::Delete, Outcome::Enqueued);
    }
}

#[async_trait::async_trait]
impl ResourceEventHandler<Service> for EventRouter {
    async fn add(&self, service: Arc<Service>) {
        if self.gated(KIND_SERVICE, Op::Add) {
            return;
        }

        let outcome = match service_binding(&service) {
            Some(binding) => self.bind_service(resource_id(&*service), binding).await,
            None => Outcome::Ignored,
        };
        self.metrics.record(KIND_SERVICE, Op::Add, outcome);
    }

    async fn update(&self, old: Arc<Service>, new: Arc<Service>) {
        if self.gated(KIND_SERVICE, Op::Update) {
            return;
        }

        let id = resource_id(&*new);
        let binding = service_binding(&new);
        let outcome = if binding == service_binding(&old) {
            Outcome::Unchanged
        } else {
            match binding {
                Some(binding) => self.bind_service(id, binding).await,
                None => {
                    // The service is no longer bound; its downstream state
                    // must be removed.
                    self.index.write().unbind(&id);
                    self.enqueue(WorkItem::service(id.namespace, id.name));
                    Outcome::Enqueued
                }
            }
        };
        self.metrics.record(KIND_SERVICE, Op::Update, outcome);
    }

    async fn delete(&self, service: Arc<Service>) {
        if self.gated(KIND_SERVICE, Op::Delete) {
            return;
        }

        let id = resource_id(&*service);
        let unbound = self.index.write().unbind(&id).is_some();
        let outcome = if unbound || service_binding(&service).is_some() {
            self.enqueue(WorkItem::service(id.namespace, id.name));
            Outcome::Enqueued
        } else {
            Outcome::Ignored
        };
        self.metrics.record(KIND_SERVICE, Op::Delete, outcome);
    }
}

const KIND_GATEWAY: &str = "Gateway";
const KIND_GATEWAY_CLASS: &str = "GatewayClass";
const KIND_SERVICE: &str = "Service";

fn gateway_item(gateway: &Gateway) -> WorkItem {
    WorkItem::gateway(gateway.namespace().unwrap_or_default(), gateway.name_unchecked())
}

/// Only the class, listeners and addresses are significant.
fn spec_unchanged(old: &GatewaySpec, new: &GatewaySpec) -> bool {
    old.class == new.class && old.listeners == new.listeners && old.addresses == new.addresses
}

// === impl RouterMetrics ===

impl RouterMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let events = Family::<EventLabels, Counter>::default();
        prom.register(
            "events",
            "Count of informer events by resource kind, operation and outcome",
            events.clone(),
        );
        Self { events }
    }

    fn record(&self, kind: &'static str, op: Op, outcome: Outcome) {
        self.events
            .get_or_create(&EventLabels {
                kind,
                op: op.as_str(),
                outcome: outcome.as_str(),
            })
            .inc();
    }

    /// The number of events recorded with the given labels.
    #[cfg(test)]
    pub(crate) fn count(&self, kind: &'static str, op: &'static str, outcome: &'static str) -> u64 {
        self.events
            .get_or_create(&EventLabels { kind, op, outcome })
            .get()
    }
}

// === impl Op ===

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

// === impl Outcome ===

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Gated => "gated",
            Self::Unchanged => "unchanged",
            Self::Ignored => "ignored",
            Self::Rejected => "rejected",
            Self::Dropped => "dropped",
        }
    }
}
