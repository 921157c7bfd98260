#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Gateway status: validation against the GatewayClass, port conflicts with
//! bound Services, and the address guard. Every check reports its outcome as
//! a condition on the Gateway and writes the status through a [`StatusStore`].

mod address;
mod conditions;
mod conflict;
mod lookup;
mod reconciler;
mod store;

#[cfg(test)]
mod tests;

pub use self::{
    address::AddressGuard,
    conflict::{ConflictDetector, ServiceCheck},
    lookup::{GatewayClassLookup, GatewayLookup},
    reconciler::{StatusReconciler, Validity},
    store::{KubeStatusStore, StatusError, StatusMetrics, StatusStore},
};

use gateway_bridge_core::{PortProtocol, ResourceIndex};
use gateway_bridge_k8s_api::GatewaySpec;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedIndex = Arc<RwLock<ResourceIndex>>;

pub fn shared_index() -> SharedIndex {
    Arc::new(RwLock::new(ResourceIndex::default()))
}

/// The `protocol/port` pairs a gateway's listeners declare, in listener order.
pub fn listener_port_protocols(spec: &GatewaySpec) -> Vec<PortProtocol> {
    spec.listeners
        .iter()
        .map(|l| PortProtocol::new(l.protocol.clone(), l.port))
        .collect()
}
