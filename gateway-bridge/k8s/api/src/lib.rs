#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod gateway;
pub mod gateway_class;
pub mod labels;

pub use self::{
    gateway::{
        Condition, ConditionStatus, Gateway, GatewayAddress, GatewaySpec, GatewayStatus, Listener,
        ListenerStatus,
    },
    gateway_class::{GatewayClass, GatewayClassSpec},
    labels::Selector,
};
pub use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, ResourceExt},
    Client, Error, Resource,
};
