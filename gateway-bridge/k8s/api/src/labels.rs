use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names the Gateway a route selector (or a Service) is bound to.
pub const GATEWAY_NAME: &str = "ako.vmware.com/gateway-name";

/// Names the namespace of the Gateway a route selector (or a Service) is
/// bound to.
pub const GATEWAY_NAMESPACE: &str = "ako.vmware.com/gateway-namespace";

pub type Map = BTreeMap<String, String>;

/// Selects the resources routed through a listener.
#[derive(Clone, Debug, Eq, PartialEq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    match_labels: Option<Map>,
}

// === Selector ===

impl Selector {
    pub fn from_map(map: Map) -> Self {
        Self {
            match_labels: Some(map),
        }
    }

    pub fn match_label(&self, key: &str) -> Option<&str> {
        self.match_labels.as_ref()?.get(key).map(String::as_str)
    }

    /// Returns true when the selector carries both gateway labels and they
    /// name the given gateway.
    pub fn selects_gateway(&self, namespace: &str, name: &str) -> bool {
        self.match_label(GATEWAY_NAME) == Some(name)
            && self.match_label(GATEWAY_NAMESPACE) == Some(namespace)
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_gateway() {
        for (selector, selects, msg) in [
            (Selector::default(), false, "empty selector"),
            (
                Selector::from_iter([(GATEWAY_NAME, "gw1"), (GATEWAY_NAMESPACE, "ns1")]),
                true,
                "exact match",
            ),
            (
                Selector::from_iter([
                    (GATEWAY_NAME, "gw1"),
                    (GATEWAY_NAMESPACE, "ns1"),
                    ("app", "web"),
                ]),
                true,
                "extra labels",
            ),
            (
                Selector::from_iter([(GATEWAY_NAME, "gw1")]),
                false,
                "missing namespace label",
            ),
            (
                Selector::from_iter([(GATEWAY_NAME, "gw2"), (GATEWAY_NAMESPACE, "ns1")]),
                false,
                "other gateway",
            ),
            (
                Selector::from_iter([(GATEWAY_NAME, "gw1"), (GATEWAY_NAMESPACE, "ns2")]),
                false,
                "other namespace",
            ),
        ] {
            assert_eq!(selector.selects_gateway("ns1", "gw1"), selects, "{}", msg);
        }
    }

    #[test]
    fn deserializes_match_labels() {
        let selector: Selector = serde_json::from_value(serde_json::json!({
            "matchLabels": { "ako.vmware.com/gateway-name": "gw1" }
        }))
        .unwrap();
        assert_eq!(selector.match_label(GATEWAY_NAME), Some("gw1"));
        assert_eq!(selector.match_label(GATEWAY_NAMESPACE), None);
    }
}
