//! Port and protocol conflicts between a Gateway and the Services bound to it.
//!
//! Both entry points report at most one conflict per pass: the first one found
//! in listener (or service port) order. Callers that want every conflict must
//! resolve the first and run the check again.

use crate::{
    conditions::{ConditionType, Reason},
    PortProtocol, ResourceIndex, ResourceId, ServiceBinding,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two or more services claim the same `protocol/port`.
    Port,
    /// A service claims a protocol that no listener declares.
    UnsupportedProtocol,
}

/// A conflict scoped to a single listener port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub port: u16,
    pub services: Vec<ResourceId>,
}

// === impl ConflictKind ===

impl ConflictKind {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            Self::Port => ConditionType::PortConflict,
            Self::UnsupportedProtocol => ConditionType::UnsupportedProtocol,
        }
    }

    pub fn reason(&self) -> Reason {
        match self {
            Self::Port => Reason::PortConflict,
            Self::UnsupportedProtocol => Reason::UnsupportedProtocol,
        }
    }
}

// === impl Conflict ===

impl Conflict {
    pub fn message(&self) -> String {
        let services = self
            .services
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            ConflictKind::Port => {
                format!("conflicting port configuration provided in services {services}")
            }
            ConflictKind::UnsupportedProtocol => {
                format!("unsupported protocol found in services {services}")
            }
        }
    }
}

/// Checks a gateway's listeners against the services bound to it.
///
/// Port conflicts are checked first, in listener order. Only when there are
/// none is each bound `protocol/port` checked for a protocol that no listener
/// declares.
pub fn gateway_conflict(
    index: &ResourceIndex,
    gateway: &ResourceId,
    listeners: &[PortProtocol],
) -> Option<Conflict> {
    let claims = index.gateway_bindings(gateway)?;

    for listener in listeners {
        if let Some(services) = claims.get(listener).filter(|s| s.len() > 1) {
            return Some(Conflict {
                kind: ConflictKind::Port,
                port: listener.port,
                services: services.clone(),
            });
        }
    }

    claims
        .iter()
        .find(|(pp, _)| !listeners.iter().any(|l| l.protocol == pp.protocol))
        .map(|(pp, services)| Conflict {
            kind: ConflictKind::UnsupportedProtocol,
            port: pp.port,
            services: services.clone(),
        })
}

/// Checks a single service's claims against the other services bound to the
/// same gateway.
///
/// The service itself counts as a claimant even if the index has not recorded
/// it yet. Unsupported protocols are not detected from this side.
pub fn service_conflict(
    index: &ResourceIndex,
    service: &ResourceId,
    binding: &ServiceBinding,
) -> Option<Conflict> {
    let claims = index.gateway_bindings(&binding.gateway)?;

    binding.port_protocols.iter().find_map(|pp| {
        let mut services = claims.get(pp)?.clone();
        if !services.contains(service) {
            services.push(service.clone());
        }
        (services.len() > 1).then(|| Conflict {
            kind: ConflictKind::Port,
            port: pp.port,
            services,
        })
    })
}
