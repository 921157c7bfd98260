use gateway_bridge_k8s_api::{self as k8s, Gateway, Resource, ResourceExt};
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use tokio::time;

const FIELD_MANAGER: &str = "gateway-bridge";

/// Persists a Gateway's status.
///
/// Writes must be idempotent: the same status may be written more than once.
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    async fn update_gateway_status(&self, gateway: &Gateway) -> Result<(), StatusError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("gateway {0} has no namespace")]
    MissingNamespace(String),

    #[error("failed to patch gateway status: {0}")]
    Patch(#[from] k8s::Error),

    #[error("timed out patching gateway status after {0:?}")]
    Timeout(time::Duration),
}

/// Writes Gateway status through the Kubernetes API.
pub struct KubeStatusStore {
    client: k8s::Client,
    patch_timeout: time::Duration,
    metrics: StatusMetrics,
}

#[derive(Clone, Debug, Default)]
pub struct StatusMetrics {
    patch_succeeded: Counter,
    patch_failed: Counter,
    patch_timeout: Counter,
}

// === impl KubeStatusStore ===

impl KubeStatusStore {
    pub fn new(client: k8s::Client, patch_timeout: time::Duration, metrics: StatusMetrics) -> Self {
        Self {
            client,
            patch_timeout,
            metrics,
        }
    }
}

#[async_trait::async_trait]
impl StatusStore for KubeStatusStore {
    async fn update_gateway_status(&self, gateway: &Gateway) -> Result<(), StatusError> {
        let name = gateway.name_unchecked();
        let namespace = gateway
            .namespace()
            .ok_or_else(|| StatusError::MissingNamespace(name.clone()))?;

        let api = k8s::Api::<Gateway>::namespaced(self.client.clone(), &namespace);
        let params = k8s::PatchParams::apply(FIELD_MANAGER);
        let patch = make_patch(&name, gateway);

        match time::timeout(self.patch_timeout, api.patch_status(&name, &params, &patch)).await {
            Ok(Ok(_)) => {
                self.metrics.patch_succeeded.inc();
                tracing::debug!(%namespace, %name, "Patched Gateway status");
                Ok(())
            }
            Ok(Err(error)) => {
                self.metrics.patch_failed.inc();
                Err(error.into())
            }
            Err(_) => {
                self.metrics.patch_timeout.inc();
                Err(StatusError::Timeout(self.patch_timeout))
            }
        }
    }
}

pub(crate) fn make_patch(name: &str, gateway: &Gateway) -> k8s::Patch<serde_json::Value> {
    let value = serde_json::json!({
        "apiVersion": Gateway::api_version(&()),
        "kind": Gateway::kind(&()),
        "name": name,
        "status": gateway.status.clone().unwrap_or_default(),
    });
    k8s::Patch::Merge(value)
}

// === impl StatusMetrics ===

impl StatusMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patch_succeeded: Counter = Counter::default();
        prom.register(
            "patch_succeeded",
            "Count of successful Gateway status patches",
            patch_succeeded.clone(),
        );

        let patch_failed: Counter = Counter::default();
        prom.register(
            "patch_failed",
            "Count of failed Gateway status patches",
            patch_failed.clone(),
        );

        let patch_timeout: Counter = Counter::default();
        prom.register(
            "patch_timeout",
            "Count of Gateway status patches that timed out",
            patch_timeout.clone(),
        );

        Self {
            patch_succeeded,
            patch_failed,
            patch_timeout,
        }
    }
}
