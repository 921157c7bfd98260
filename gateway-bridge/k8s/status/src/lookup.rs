use gateway_bridge_k8s_api::{Gateway, GatewayClass};
use std::sync::Arc;

/// Reads GatewayClasses from a local cache.
pub trait GatewayClassLookup: Send + Sync {
    fn gateway_class(&self, name: &str) -> Option<Arc<GatewayClass>>;
}

/// Reads Gateways from a local cache.
pub trait GatewayLookup: Send + Sync {
    fn gateway(&self, namespace: &str, name: &str) -> Option<Arc<Gateway>>;
}
