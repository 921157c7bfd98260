//! Tracks which Services are bound to which Gateways.
//!
//! A Service binds to a single Gateway and claims one or more `protocol/port`
//! pairs on it. The index is kept in both directions so that a Service's
//! previous claims can be released when it is updated or removed, and so that
//! the claims against a Gateway can be scanned when the Gateway changes.
//!
//! Services claiming a `protocol/port` are kept in the order in which they
//! were first bound. Conflict messages are rendered from this order, so the
//! same index state always produces the same message.

use crate::{PortProtocol, ResourceId};
use ahash::AHashMap as HashMap;
use std::collections::{hash_map::Entry, BTreeMap};

/// The services claiming each `protocol/port` of a gateway.
pub type GatewayBindings = BTreeMap<PortProtocol, Vec<ResourceId>>;

/// A Service's claims against a Gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceBinding {
    pub gateway: ResourceId,
    pub port_protocols: Vec<PortProtocol>,
}

#[derive(Debug, Default)]
pub struct ResourceIndex {
    gateways: HashMap<ResourceId, GatewayBindings>,
    services: HashMap<ResourceId, ServiceBinding>,
}

// === impl ResourceIndex ===

impl ResourceIndex {
    /// Records `service`'s binding, replacing any previous binding, and
    /// returns the previous binding.
    ///
    /// Claims the service still holds keep their position among the other
    /// claimants.
    pub fn bind(&mut self, service: ResourceId, binding: ServiceBinding) -> Option<ServiceBinding> {
        let previous = self.services.insert(service.clone(), binding.clone());

        if let Some(prev) = previous.as_ref() {
            let released = prev.port_protocols.iter().filter(|pp| {
                prev.gateway != binding.gateway || !binding.port_protocols.contains(pp)
            });
            release(&mut self.gateways, &prev.gateway, released, &service);
        }

        if !binding.port_protocols.is_empty() {
            let claims = self.gateways.entry(binding.gateway).or_default();
            for pp in binding.port_protocols {
                let services = claims.entry(pp).or_default();
                if !services.contains(&service) {
                    services.push(service.clone());
                }
            }
        }

        previous
    }

    /// Removes all of `service`'s claims, returning its binding if it had one.
    pub fn unbind(&mut self, service: &ResourceId) -> Option<ServiceBinding> {
        let binding = self.services.remove(service)?;
        release(
            &mut self.gateways,
            &binding.gateway,
            binding.port_protocols.iter(),
            service,
        );
        Some(binding)
    }

    pub fn gateway_bindings(&self, gateway: &ResourceId) -> Option<&GatewayBindings> {
        self.gateways.get(gateway)
    }

    pub fn service_binding(&self, service: &ResourceId) -> Option<&ServiceBinding> {
        self.services.get(service)
    }

    /// Returns the services claiming `pp` on `gateway`, in binding order.
    pub fn services_for(&self, gateway: &ResourceId, pp: &PortProtocol) -> &[ResourceId] {
        self.gateways
            .get(gateway)
            .and_then(|claims| claims.get(pp))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn gateways_len(&self) -> usize {
        self.gateways.len()
    }

    pub fn services_len(&self) -> usize {
        self.services.len()
    }
}

fn release<'p>(
    gateways: &mut HashMap<ResourceId, GatewayBindings>,
    gateway: &ResourceId,
    port_protocols: impl Iterator<Item = &'p PortProtocol>,
    service: &ResourceId,
) {
    let Entry::Occupied(mut entry) = gateways.entry(gateway.clone()) else {
        return;
    };

    let claims = entry.get_mut();
    for pp in port_protocols {
        if let Some(services) = claims.get_mut(pp) {
            services.retain(|s| s != service);
            if services.is_empty() {
                claims.remove(pp);
            }
        }
    }

    if claims.is_empty() {
        entry.remove();
    }
}
