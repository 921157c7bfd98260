use crate::{GatewayClassLookup, GatewayLookup, StatusError, StatusStore};
use ahash::AHashMap;
use gateway_bridge_k8s_api::{
    labels, Gateway, GatewayAddress, GatewayClass, GatewayClassSpec, GatewaySpec, Listener,
    ObjectMeta, Selector,
};
use maplit::{btreemap, convert_args};
use parking_lot::Mutex;
use std::sync::Arc;

mod reconciler;

/// Records every status write instead of patching the API.
#[derive(Default)]
struct FakeStore {
    writes: Mutex<Vec<Gateway>>,
    fail: bool,
}

#[derive(Default)]
struct FakeClasses(AHashMap<String, Arc<GatewayClass>>);

#[derive(Default)]
struct FakeGateways(AHashMap<(String, String), Arc<Gateway>>);

// === impl FakeStore ===

impl FakeStore {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn writes(&self) -> Vec<Gateway> {
        self.writes.lock().clone()
    }
}

#[async_trait::async_trait]
impl StatusStore for FakeStore {
    async fn update_gateway_status(&self, gateway: &Gateway) -> Result<(), StatusError> {
        if self.fail {
            return Err(StatusError::Timeout(std::time::Duration::from_secs(1)));
        }
        self.writes.lock().push(gateway.clone());
        Ok(())
    }
}

// === impl FakeClasses ===

impl FakeClasses {
    fn with(mut self, name: &str, controller: &str) -> Self {
        self.0.insert(name.to_string(), Arc::new(gateway_class(name, controller)));
        self
    }
}

impl GatewayClassLookup for FakeClasses {
    fn gateway_class(&self, name: &str) -> Option<Arc<GatewayClass>> {
        self.0.get(name).cloned()
    }
}

// === impl FakeGateways ===

impl FakeGateways {
    fn with(mut self, gateway: Gateway) -> Self {
        let key = (
            gateway.metadata.namespace.clone().unwrap_or_default(),
            gateway.metadata.name.clone().unwrap_or_default(),
        );
        self.0.insert(key, Arc::new(gateway));
        self
    }
}

impl GatewayLookup for FakeGateways {
    fn gateway(&self, namespace: &str, name: &str) -> Option<Arc<Gateway>> {
        self.0
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

fn gateway_class(name: &str, controller: &str) -> GatewayClass {
    GatewayClass::new(
        name,
        GatewayClassSpec {
            controller: controller.to_string(),
        },
    )
}

/// A listener whose route selector names the given gateway.
fn listener(protocol: &str, port: u16, ns: &str, gateway: &str) -> Listener {
    let mut listener = Listener {
        protocol: protocol.to_string(),
        port,
        routes: Default::default(),
    };
    listener.routes.route_selector = Selector::from_map(convert_args!(btreemap!(
        labels::GATEWAY_NAME => gateway,
        labels::GATEWAY_NAMESPACE => ns,
    )));
    listener
}

fn gateway(ns: &str, name: &str, class: &str, listeners: Vec<Listener>) -> Gateway {
    Gateway {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: GatewaySpec {
            class: class.to_string(),
            listeners,
            addresses: Vec::new(),
        },
        status: None,
    }
}

fn with_address(mut gateway: Gateway, address: &str) -> Gateway {
    gateway.spec.addresses = vec![GatewayAddress {
        type_: Some("IPAddress".to_string()),
        value: address.to_string(),
    }];
    gateway
}
