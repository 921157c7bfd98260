use super::*;
use crate::{informer, ResourceEventHandler, Store};
use futures::stream;
use kube::{runtime::watcher::Event, ResourceExt};
use pretty_assertions::assert_eq;

/// Records each callback along with the cache state it observed.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    store: Arc<Store<GatewayClass>>,
}

#[async_trait::async_trait]
impl ResourceEventHandler<GatewayClass> for Recorder {
    async fn add(&self, class: Arc<GatewayClass>) {
        self.record("add", &class);
    }

    async fn update(&self, old: Arc<GatewayClass>, new: Arc<GatewayClass>) {
        assert_eq!(old.name_unchecked(), new.name_unchecked());
        self.record("update", &new);
    }

    async fn delete(&self, class: Arc<GatewayClass>) {
        self.record("delete", &class);
    }
}

impl Recorder {
    fn record(&self, op: &str, class: &GatewayClass) {
        let cached = self
            .store
            .get(&crate::resource_id(class))
            .map_or("uncached", |_| "cached");
        self.calls.lock().push(format!(
            "{op} {} {} ({cached})",
            class.name_unchecked(),
            class.spec.controller
        ));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

async fn run(recorder: &Arc<Recorder>, events: Vec<Event<GatewayClass>>) {
    informer::run(recorder.store.clone(), recorder.clone(), stream::iter(events)).await;
}

#[tokio::test]
async fn applies_and_deletes() {
    let recorder = Arc::new(Recorder::default());

    run(
        &recorder,
        vec![
            Event::Apply(gateway_class("a", "one")),
            Event::Apply(gateway_class("a", "two")),
            Event::Delete(gateway_class("a", "two")),
        ],
    )
    .await;

    assert_eq!(
        recorder.calls(),
        vec![
            "add a one (cached)",
            "update a two (cached)",
            "delete a two (uncached)",
        ]
    );
    assert!(recorder.store.is_empty());
}

#[tokio::test]
async fn relist_removes_missing_objects() {
    let recorder = Arc::new(Recorder::default());

    run(
        &recorder,
        vec![
            Event::Init,
            Event::InitApply(gateway_class("a", "one")),
            Event::InitApply(gateway_class("b", "one")),
            Event::InitDone,
        ],
    )
    .await;
    assert_eq!(recorder.store.len(), 2);

    run(
        &recorder,
        vec![
            Event::Init,
            Event::InitApply(gateway_class("a", "one")),
            Event::InitDone,
        ],
    )
    .await;

    assert_eq!(
        recorder.calls(),
        vec![
            "add a one (cached)",
            "add b one (cached)",
            "update a one (cached)",
            "delete b one (uncached)",
        ]
    );
    assert_eq!(recorder.store.ids(), vec![crate::core::ResourceId::cluster_scoped("a")]);
}
