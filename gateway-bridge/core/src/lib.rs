#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod address;
pub mod conditions;
pub mod conflict;
mod id;
pub mod index;
mod port;
pub mod work;

pub use self::{
    id::ResourceId,
    index::{ResourceIndex, ServiceBinding},
    port::{ParsePortProtocolError, PortProtocol},
    work::{ResourceKind, WorkItem},
};

/// The controller identifier a GatewayClass must name for its Gateways to be
/// reconciled by this bridge.
pub const DEFAULT_CONTROLLER_NAME: &str = "ako.vmware.com/avi-lb";
