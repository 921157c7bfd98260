#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_bridge_core as core;
pub use gateway_bridge_k8s_api as k8s;
pub use gateway_bridge_k8s_status as status;

mod args;
pub mod informer;
mod lease;
pub mod queue;
mod router;
mod service;
mod store;
mod sync;
mod workers;


pub use self::{
    args::Args,
    informer::ResourceEventHandler,
    queue::{QueueMetrics, ShardedWorkQueue, WorkQueue},
    router::{EventRouter, RouterMetrics},
    service::service_binding,
    store::{resource_id, Store, Stores},
    sync::SyncGate,
    workers::{spawn_workers, Dispatch, Dispatcher},
};
