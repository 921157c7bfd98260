use crate::{conditions, GatewayClassLookup, StatusError, StatusStore};
use gateway_bridge_core::conditions::{ConditionType, Reason};
use gateway_bridge_k8s_api::{Gateway, GatewayStatus, ResourceExt};
use std::sync::Arc;

/// Validates Gateways against their GatewayClass and listener labels.
pub struct StatusReconciler {
    controller_name: String,
    classes: Arc<dyn GatewayClassLookup>,
    store: Arc<dyn StatusStore>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// The gateway was marked `Pending` for the given reason.
    Invalid(Reason),
}

// === impl StatusReconciler ===

impl StatusReconciler {
    pub fn new(
        controller_name: impl ToString,
        classes: Arc<dyn GatewayClassLookup>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            controller_name: controller_name.to_string(),
            classes,
            store,
        }
    }

    /// Resets the gateway's status, runs the checks in order and writes the
    /// resulting status exactly once.
    ///
    /// Checks stop at the first failure: a gateway whose class cannot be
    /// found is not checked for labels, and one with bad labels is not
    /// checked for its controller.
    pub async fn reconcile(&self, gateway: &mut Gateway) -> Result<Validity, StatusError> {
        let validity = self.validate(gateway);
        self.store.update_gateway_status(gateway).await?;
        Ok(validity)
    }

    fn validate(&self, gateway: &mut Gateway) -> Validity {
        let namespace = gateway.namespace().unwrap_or_default();
        let name = gateway.name_unchecked();
        let status = gateway
            .status
            .insert(GatewayStatus::for_listeners(&gateway.spec.listeners));

        let class = match self.classes.gateway_class(&gateway.spec.class) {
            Some(class) => class,
            None => {
                tracing::warn!(
                    %namespace,
                    %name,
                    class = %gateway.spec.class,
                    "GatewayClass not found",
                );
                status.set_condition(conditions::active(
                    ConditionType::Pending,
                    Reason::InvalidGatewayClass,
                    format!(
                        "corresponding gatewayclass {} not found",
                        gateway.spec.class
                    ),
                ));
                return Validity::Invalid(Reason::InvalidGatewayClass);
            }
        };

        let labels_match = gateway
            .spec
            .listeners
            .iter()
            .all(|l| l.routes.route_selector.selects_gateway(&namespace, &name));
        if !labels_match {
            tracing::info!(
                %namespace,
                %name,
                "Listener route selector does not select this gateway",
            );
            status.set_condition(conditions::active(
                ConditionType::Pending,
                Reason::InvalidMatchLabels,
                "incorrect gateway matchLabels configuration",
            ));
            return Validity::Invalid(Reason::InvalidMatchLabels);
        }

        if class.spec.controller != self.controller_name {
            tracing::info!(
                %namespace,
                %name,
                controller = %class.spec.controller,
                "GatewayClass belongs to another controller",
            );
            status.set_condition(conditions::active(
                ConditionType::Pending,
                Reason::UnidentifiedController,
                format!("unable to identify controller {}", class.spec.controller),
            ));
            return Validity::Invalid(Reason::UnidentifiedController);
        }

        Validity::Valid
    }
}
