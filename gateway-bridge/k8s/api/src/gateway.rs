use super::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares listeners that a load balancer should expose for a set of
/// Services.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.x-k8s.io",
    version = "v1alpha1pre1",
    kind = "Gateway",
    status = "GatewayStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Name of the GatewayClass this gateway belongs to.
    pub class: String,
    pub listeners: Vec<Listener>,
    /// Requested addresses. Only the first one is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<GatewayAddress>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub protocol: String,
    pub port: u16,
    #[serde(default)]
    pub routes: RouteBindingSelector,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteBindingSelector {
    #[serde(default)]
    pub route_selector: labels::Selector,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAddress {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub listeners: Vec<ListenerStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    pub port: u16,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// RFC 3339 timestamp of the last change of `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

// === impl GatewaySpec ===

impl GatewaySpec {
    pub fn first_address(&self) -> Option<&str> {
        self.addresses.first().map(|a| a.value.as_str())
    }
}

// === impl GatewayStatus ===

impl GatewayStatus {
    /// A clean status: no gateway conditions and an empty status for each
    /// distinct listener port.
    pub fn for_listeners(listeners: &[Listener]) -> Self {
        let mut status = Self::default();
        for listener in listeners {
            if !status.listeners.iter().any(|l| l.port == listener.port) {
                status.listeners.push(ListenerStatus {
                    port: listener.port,
                    conditions: Vec::new(),
                });
            }
        }
        status
    }

    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn set_condition(&mut self, condition: Condition) {
        upsert(&mut self.conditions, condition);
    }

    pub fn listener_condition(&self, port: u16, type_: &str) -> Option<&Condition> {
        self.listeners
            .iter()
            .find(|l| l.port == port)?
            .conditions
            .iter()
            .find(|c| c.type_ == type_)
    }

    /// Sets a condition on the listener status for `port`, creating the
    /// listener status if the gateway has none for that port.
    pub fn set_listener_condition(&mut self, port: u16, condition: Condition) {
        match self.listeners.iter_mut().find(|l| l.port == port) {
            Some(listener) => upsert(&mut listener.conditions, condition),
            None => self.listeners.push(ListenerStatus {
                port,
                conditions: vec![condition],
            }),
        }
    }
}

/// Replaces the condition of the same type, keeping its transition time if
/// the status is unchanged.
fn upsert(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.take();
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

// === impl ConditionStatus ===

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        })
    }
}
