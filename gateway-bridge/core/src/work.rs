//! Work item keys and their assignment to shards.
//!
//! A work item names a resource; it never carries the resource itself. Workers
//! look the resource up again when the item is dequeued, so any number of
//! updates between enqueue and processing collapse into one pass over the
//! latest state.

use crate::ResourceId;
use std::{fmt, num::NonZeroUsize, str::FromStr};

// Fixed seeds keep shard assignment stable for the life of the process.
const SHARD_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Gateway,
    GatewayClass,
    /// A LoadBalancer Service bound to a Gateway.
    Service,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseWorkItemError {
    #[error("unknown resource kind {0:?}")]
    Kind(String),

    #[error("malformed work item key {0:?}")]
    Format(String),
}

/// Maps a namespace onto one of `shards` buckets.
pub fn shard_bucket(namespace: &str, shards: NonZeroUsize) -> usize {
    let [k0, k1, k2, k3] = SHARD_SEEDS;
    let hash = ahash::RandomState::with_seeds(k0, k1, k2, k3).hash_one(namespace);
    (hash % shards.get() as u64) as usize
}

// === impl ResourceKind ===

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "Gateway",
            Self::GatewayClass => "GatewayClass",
            Self::Service => "L4LBService",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseWorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gateway" => Ok(Self::Gateway),
            "GatewayClass" => Ok(Self::GatewayClass),
            "L4LBService" => Ok(Self::Service),
            _ => Err(ParseWorkItemError::Kind(s.to_string())),
        }
    }
}

// === impl WorkItem ===

impl WorkItem {
    pub fn new(kind: ResourceKind, id: ResourceId) -> Self {
        Self { kind, id }
    }

    pub fn gateway(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Gateway, ResourceId::new(namespace, name))
    }

    pub fn gateway_class(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::GatewayClass, ResourceId::cluster_scoped(name))
    }

    pub fn service(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, ResourceId::new(namespace, name))
    }

    /// The shard this item is processed on. Items in the same namespace always
    /// share a shard.
    pub fn bucket(&self, shards: NonZeroUsize) -> usize {
        shard_bucket(&self.id.namespace, shards)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl FromStr for WorkItem {
    type Err = ParseWorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseWorkItemError::Format(s.to_string());
        let (kind, rest) = s.split_once('/').ok_or_else(malformed)?;
        let kind = kind.parse()?;
        let id = match rest.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                ResourceId::new(ns, name)
            }
            None if !rest.is_empty() => ResourceId::cluster_scoped(rest),
            _ => return Err(malformed()),
        };
        Ok(Self { kind, id })
    }
}
