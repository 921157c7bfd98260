use super::*;
use crate::{conditions, StatusReconciler, Validity};
use gateway_bridge_core::{
    conditions::{ConditionType, Reason},
    DEFAULT_CONTROLLER_NAME,
};
use gateway_bridge_k8s_api::{Condition, GatewayStatus, ListenerStatus};
use pretty_assertions::assert_eq;

fn reconciler(classes: FakeClasses, store: Arc<FakeStore>) -> StatusReconciler {
    StatusReconciler::new(DEFAULT_CONTROLLER_NAME, Arc::new(classes), store)
}

fn pending(reason: Reason, message: &str) -> Condition {
    conditions::active(ConditionType::Pending, reason, message)
}

#[tokio::test]
async fn valid_gateway_gets_clean_status() {
    let store = Arc::new(FakeStore::default());
    let classes = FakeClasses::default().with("avi-lb", DEFAULT_CONTROLLER_NAME);
    let mut gw = gateway(
        "ns1",
        "gw1",
        "avi-lb",
        vec![
            listener("TCP", 80, "ns1", "gw1"),
            listener("UDP", 53, "ns1", "gw1"),
        ],
    );

    let validity = reconciler(classes, store.clone())
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Valid);

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].status,
        Some(GatewayStatus {
            conditions: vec![],
            listeners: vec![
                ListenerStatus {
                    port: 80,
                    conditions: vec![],
                },
                ListenerStatus {
                    port: 53,
                    conditions: vec![],
                },
            ],
        })
    );
}

#[tokio::test]
async fn missing_class() {
    let store = Arc::new(FakeStore::default());
    let mut gw = gateway("ns1", "gw1", "missing", vec![listener("TCP", 80, "ns1", "gw1")]);

    let validity = reconciler(FakeClasses::default(), store.clone())
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Invalid(Reason::InvalidGatewayClass));

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let status = writes[0].status.clone().expect("status must be set");
    assert_eq!(
        status.conditions,
        vec![pending(
            Reason::InvalidGatewayClass,
            "corresponding gatewayclass missing not found"
        )]
    );
}

#[tokio::test]
async fn missing_class_skips_remaining_checks() {
    let store = Arc::new(FakeStore::default());
    let mut gw = gateway("ns1", "gw1", "missing", vec![listener("TCP", 80, "ns1", "other")]);

    let validity = reconciler(FakeClasses::default(), store.clone())
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Invalid(Reason::InvalidGatewayClass));

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let status = writes[0].status.clone().expect("status must be set");
    assert_eq!(
        status.conditions,
        vec![pending(
            Reason::InvalidGatewayClass,
            "corresponding gatewayclass missing not found"
        )]
    );
}

#[tokio::test]
async fn mismatched_labels() {
    let store = Arc::new(FakeStore::default());
    let classes = FakeClasses::default().with("avi-lb", DEFAULT_CONTROLLER_NAME);
    let mut gw = gateway(
        "ns1",
        "gw1",
        "avi-lb",
        vec![
            listener("TCP", 80, "ns1", "gw1"),
            listener("TCP", 443, "ns1", "other"),
        ],
    );

    let validity = reconciler(classes, store.clone())
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Invalid(Reason::InvalidMatchLabels));
    assert_eq!(store.writes().len(), 1);
    assert_eq!(
        gw.status
            .as_ref()
            .and_then(|s| s.condition("Pending"))
            .map(|c| c.reason.as_str()),
        Some("InvalidMatchLabels")
    );
}

#[tokio::test]
async fn listener_without_selector() {
    let store = Arc::new(FakeStore::default());
    let classes = FakeClasses::default().with("avi-lb", DEFAULT_CONTROLLER_NAME);
    let mut bare = listener("TCP", 80, "ns1", "gw1");
    bare.routes = Default::default();
    let mut gw = gateway("ns1", "gw1", "avi-lb", vec![bare]);

    let validity = reconciler(classes, store)
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Invalid(Reason::InvalidMatchLabels));
}

#[tokio::test]
async fn other_controller() {
    let store = Arc::new(FakeStore::default());
    let classes = FakeClasses::default().with("other-lb", "example.com/other");
    let mut gw = gateway("ns1", "gw1", "other-lb", vec![listener("TCP", 80, "ns1", "gw1")]);

    let validity = reconciler(classes, store.clone())
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(validity, Validity::Invalid(Reason::UnidentifiedController));

    let status = gw.status.expect("status must be set");
    assert_eq!(
        status.conditions,
        vec![pending(
            Reason::UnidentifiedController,
            "unable to identify controller example.com/other"
        )]
    );
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test]
async fn stale_conditions_are_cleared() {
    let store = Arc::new(FakeStore::default());
    let classes = FakeClasses::default().with("avi-lb", DEFAULT_CONTROLLER_NAME);
    let mut gw = gateway("ns1", "gw1", "avi-lb", vec![listener("TCP", 80, "ns1", "gw1")]);
    gw.status = Some(GatewayStatus {
        conditions: vec![pending(Reason::InvalidAddress, "stale")],
        listeners: vec![ListenerStatus {
            port: 8080,
            conditions: vec![],
        }],
    });

    reconciler(classes, store)
        .reconcile(&mut gw)
        .await
        .expect("reconcile must succeed");
    assert_eq!(
        gw.status,
        Some(GatewayStatus {
            conditions: vec![],
            listeners: vec![ListenerStatus {
                port: 80,
                conditions: vec![],
            }],
        })
    );
}

#[tokio::test]
async fn write_failure_is_returned() {
    let store = Arc::new(FakeStore::failing());
    let classes = FakeClasses::default().with("avi-lb", DEFAULT_CONTROLLER_NAME);
    let mut gw = gateway("ns1", "gw1", "avi-lb", vec![listener("TCP", 80, "ns1", "gw1")]);

    let result = StatusReconciler::new(DEFAULT_CONTROLLER_NAME, Arc::new(classes), store)
        .reconcile(&mut gw)
        .await;
    assert!(matches!(result, Err(StatusError::Timeout(_))));
}
