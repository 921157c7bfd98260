use crate::{
    core::DEFAULT_CONTROLLER_NAME,
    informer,
    k8s::{self, Gateway, GatewayClass, Service},
    lease, spawn_workers, status, Dispatcher, EventRouter, QueueMetrics, RouterMetrics,
    ShardedWorkQueue, Stores, SyncGate,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::time::Duration;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "gateway-bridge",
    about = "Validates Gateways and bound Services and queues them for a load-balancer controller"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway_bridge=info,warn",
        env = "GATEWAY_BRIDGE_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The number of work queue shards, each served by one worker.
    #[clap(long, default_value = "8")]
    workers: NonZeroUsize,

    /// The controller a GatewayClass must name for its Gateways to be
    /// reconciled.
    #[clap(long, default_value = DEFAULT_CONTROLLER_NAME)]
    controller_name: String,

    /// Drops all events. No status is written and nothing is queued.
    #[clap(long)]
    sync_disabled: bool,

    #[clap(long, default_value = "gateway-bridge")]
    deployment_name: String,

    #[clap(long, default_value = "gateway-bridge")]
    control_plane_namespace: String,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            workers,
            controller_name,
            sync_disabled,
            deployment_name,
            control_plane_namespace,
            patch_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let status_metrics =
            status::StatusMetrics::register(prom.sub_registry_with_prefix("gateway_status"));
        let router_metrics = RouterMetrics::register(prom.sub_registry_with_prefix("router"));
        let queue_metrics = QueueMetrics::register(prom.sub_registry_with_prefix("work_queue"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let stores = Stores::default();
        let index = status::shared_index();
        let queue = Arc::new(ShardedWorkQueue::new(workers, queue_metrics));
        let status_store = Arc::new(status::KubeStatusStore::new(
            runtime.client(),
            Duration::from_millis(patch_timeout_ms),
            status_metrics,
        ));

        let gate = SyncGate::default();
        let router = Arc::new(EventRouter::new(
            gate.clone(),
            index,
            stores.clone(),
            status_store,
            controller_name,
            queue.clone(),
            router_metrics,
        ));

        if sync_disabled {
            tracing::warn!("Sync disabled; events will be dropped");
        } else {
            let hostname = std::env::var("HOSTNAME")
                .context("failed to read `HOSTNAME` environment variable")?;
            let claims = lease::init(
                &runtime,
                &control_plane_namespace,
                &deployment_name,
                &hostname,
            )
            .await?;
            tokio::spawn(
                lease::gate_on_claims(claims, hostname, gate, router.clone())
                    .instrument(info_span!("lease")),
            );
        }

        // Spawn resource watches.

        let classes = runtime.watch_all::<GatewayClass>(watcher::Config::default());
        tokio::spawn(
            informer::run(stores.classes.clone(), router.clone(), classes)
                .instrument(info_span!("gatewayclasses")),
        );

        let gateways = runtime.watch_all::<Gateway>(watcher::Config::default());
        tokio::spawn(
            informer::run(stores.gateways.clone(), router.clone(), gateways)
                .instrument(info_span!("gateways")),
        );

        let services = runtime.watch_all::<Service>(
            watcher::Config::default().labels(k8s::labels::GATEWAY_NAME),
        );
        tokio::spawn(
            informer::run(stores.services.clone(), router, services)
                .instrument(info_span!("services")),
        );

        let workers = spawn_workers(&queue, Arc::new(Dispatcher::new(stores)));
        let drain = runtime.shutdown_handle();
        tokio::spawn(async move {
            let release = drain.signaled().await;
            tracing::debug!("Shutting down work queues");
            queue.shutdown();
            release
                .release_after(futures::future::join_all(workers))
                .await;
        });

        // Block the main thread on the shutdown signal. Once it fires, wait
        // for the workers to drain before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
