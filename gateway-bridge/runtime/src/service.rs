use crate::{
    core::{PortProtocol, ResourceId, ServiceBinding},
    k8s::{labels, ResourceExt, Service},
};

const LOAD_BALANCER: &str = "LoadBalancer";
const DEFAULT_PROTOCOL: &str = "TCP";

/// Derives the gateway binding of a Service.
///
/// Only `LoadBalancer` services labeled with both a gateway name and a
/// gateway namespace are bound. Each service port claims `<protocol>/<port>`
/// on that gateway.
pub fn service_binding(service: &Service) -> Option<ServiceBinding> {
    let spec = service.spec.as_ref()?;
    if spec.type_.as_deref() != Some(LOAD_BALANCER) {
        return None;
    }

    let service_labels = service.labels();
    let name = service_labels.get(labels::GATEWAY_NAME)?;
    let namespace = service_labels.get(labels::GATEWAY_NAMESPACE)?;
    if name.is_empty() || namespace.is_empty() {
        return None;
    }

    let port_protocols = spec
        .ports
        .iter()
        .flatten()
        .filter_map(|sp| {
            let port = match u16::try_from(sp.port) {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        service = %service.name_unchecked(),
                        port = sp.port,
                        "Ignoring out-of-range service port",
                    );
                    return None;
                }
            };
            let protocol = sp.protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL);
            Some(PortProtocol::new(protocol, port))
        })
        .collect();

    Some(ServiceBinding {
        gateway: ResourceId::new(namespace.clone(), name.clone()),
        port_protocols,
    })
}
