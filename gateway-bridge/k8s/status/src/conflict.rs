use crate::{
    conditions, listener_port_protocols, GatewayLookup, SharedIndex, StatusError, StatusStore,
};
use gateway_bridge_core::{
    conflict::{gateway_conflict, service_conflict, Conflict},
    ResourceId, ServiceBinding,
};
use gateway_bridge_k8s_api::{Gateway, ResourceExt};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Detects port and protocol conflicts between gateways and the services
/// bound to them, and reports them as listener conditions.
///
/// Checks are serialized so that two checks never interleave their reads of
/// the index with their status writes.
pub struct ConflictDetector {
    index: SharedIndex,
    gateways: Arc<dyn GatewayLookup>,
    store: Arc<dyn StatusStore>,
    serialize: Mutex<()>,
}

/// The outcome of checking a single service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceCheck {
    /// The service's gateway is not in the cache. The event should be dropped.
    GatewayNotFound,
    Clear,
    Conflict(Conflict),
}

// === impl ConflictDetector ===

impl ConflictDetector {
    pub fn new(
        index: SharedIndex,
        gateways: Arc<dyn GatewayLookup>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            index,
            gateways,
            store,
            serialize: Mutex::new(()),
        }
    }

    /// Checks a gateway's listeners against its bound services. On conflict,
    /// the affected listener is marked and the gateway status is written.
    pub async fn check_gateway(
        &self,
        gateway: &mut Gateway,
    ) -> Result<Option<Conflict>, StatusError> {
        let _serialized = self.serialize.lock().await;

        let id = ResourceId::new(gateway.namespace().unwrap_or_default(), gateway.name_unchecked());
        let listeners = listener_port_protocols(&gateway.spec);
        let conflict = gateway_conflict(&self.index.read(), &id, &listeners);

        let Some(conflict) = conflict else {
            return Ok(None);
        };
        tracing::warn!(gateway = %id, port = conflict.port, "{}", conflict.message());
        self.report(gateway, &conflict).await?;
        Ok(Some(conflict))
    }

    /// Checks a service's claims against the other services bound to the same
    /// gateway. On conflict, the gateway is marked and its status is written.
    pub async fn check_service(
        &self,
        service: &ResourceId,
        binding: &ServiceBinding,
    ) -> Result<ServiceCheck, StatusError> {
        let _serialized = self.serialize.lock().await;

        let gateway = match self
            .gateways
            .gateway(&binding.gateway.namespace, &binding.gateway.name)
        {
            Some(gateway) => gateway,
            None => {
                tracing::warn!(
                    %service,
                    gateway = %binding.gateway,
                    "Gateway not found for service",
                );
                return Ok(ServiceCheck::GatewayNotFound);
            }
        };

        let conflict = service_conflict(&self.index.read(), service, binding);
        let Some(conflict) = conflict else {
            return Ok(ServiceCheck::Clear);
        };
        tracing::warn!(
            %service,
            gateway = %binding.gateway,
            port = conflict.port,
            "{}",
            conflict.message(),
        );

        let mut gateway = Gateway::clone(&gateway);
        self.report(&mut gateway, &conflict).await?;
        Ok(ServiceCheck::Conflict(conflict))
    }

    async fn report(&self, gateway: &mut Gateway, conflict: &Conflict) -> Result<(), StatusError> {
        gateway
            .status
            .get_or_insert_with(Default::default)
            .set_listener_condition(
                conflict.port,
                conditions::active(
                    conflict.kind.condition_type(),
                    conflict.kind.reason(),
                    conflict.message(),
                ),
            );
        self.store.update_gateway_status(gateway).await
    }
}
