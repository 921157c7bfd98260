use crate::{
    k8s::{self, ObjectMeta, Resource},
    EventRouter, SyncGate,
};
use anyhow::Result;
use k8s_openapi::{
    api::{apps::v1::Deployment, coordination::v1::Lease},
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kubert::lease::{Claim, ClaimParams, LeaseManager};
use std::{collections::BTreeMap, sync::Arc};
use tokio::{sync::watch, time};

const LEASE_NAME: &str = "gateway-bridge-write";
const FIELD_MANAGER: &str = "gateway-bridge";

const CLAIM_PARAMS: ClaimParams = ClaimParams {
    lease_duration: time::Duration::from_secs(30),
    renew_grace_period: time::Duration::from_secs(1),
};

pub type Claims = watch::Receiver<Arc<Claim>>;

/// Starts claiming the write lease as `hostname`.
///
/// The Lease is created on first use, owned by the bridge's Deployment so
/// that it is garbage collected along with it.
pub async fn init<T>(
    runtime: &kubert::Runtime<T>,
    ns: &str,
    deployment_name: &str,
    hostname: &str,
) -> Result<Claims> {
    let deployment = k8s::Api::<Deployment>::namespaced(runtime.client(), ns)
        .get(deployment_name)
        .await?;
    let api = k8s::Api::<Lease>::namespaced(runtime.client(), ns);
    create_if_missing(&api, write_lease(ns, deployment.controller_owner_ref(&()))).await?;

    let (claims, _task) = LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(hostname, CLAIM_PARAMS)
        .await?;
    Ok(claims)
}

/// An unclaimed write Lease. Its resource version of "0" makes an apply
/// fail when the Lease already exists.
fn write_lease(ns: &str, owner: Option<OwnerReference>) -> Lease {
    Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            resource_version: Some("0".to_string()),
            owner_references: owner.map(|o| vec![o]),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/component".to_string(),
                FIELD_MANAGER.to_string(),
            )])),
            ..Default::default()
        },
        spec: None,
    }
}

async fn create_if_missing(api: &k8s::Api<Lease>, lease: Lease) -> Result<()> {
    let params = k8s::PatchParams::apply(FIELD_MANAGER);
    match api.patch(LEASE_NAME, &params, &k8s::Patch::Apply(lease)).await {
        Ok(lease) => tracing::info!(?lease, "Created write lease"),
        Err(k8s::Error::Api(error)) => tracing::debug!(?error, "Write lease already exists"),
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

/// Opens the sync gate while `hostname` holds the lease and closes it
/// otherwise. Each time the gate opens, the router resyncs.
pub async fn gate_on_claims(
    mut claims: Claims,
    hostname: String,
    gate: SyncGate,
    router: Arc<EventRouter>,
) {
    loop {
        let (leader, expiry) = {
            let claim = claims.borrow_and_update();
            (claim.is_current_for(&hostname), claim.expiry)
        };

        let was_leader = gate.set(leader);
        if leader && !was_leader {
            tracing::info!("Acquired write lease; resyncing");
            router.resync().await;
        } else if !leader && was_leader {
            tracing::info!("Lost write lease");
        }

        // A held claim lapses at its expiry unless it is renewed first.
        let expires_in = if leader {
            (expiry - chrono::Utc::now()).to_std().ok()
        } else {
            None
        };
        let changed = match expires_in {
            Some(timeout) => match time::timeout(timeout, claims.changed()).await {
                Ok(res) => res.is_ok(),
                Err(_) => true,
            },
            None => claims.changed().await.is_ok(),
        };
        if !changed {
            tracing::debug!("Lease manager stopped");
            gate.set(false);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_lease_is_owned_and_create_only() {
        let owner = OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "gateway-bridge".to_string(),
            uid: "d6a1c3e0".to_string(),
            controller: Some(true),
            ..Default::default()
        };
        let lease = write_lease("avi-system", Some(owner.clone()));
        assert_eq!(lease.metadata.name.as_deref(), Some("gateway-bridge-write"));
        assert_eq!(lease.metadata.namespace.as_deref(), Some("avi-system"));
        assert_eq!(lease.metadata.resource_version.as_deref(), Some("0"));
        assert_eq!(lease.metadata.owner_references, Some(vec![owner]));
        assert_eq!(lease.spec, None);
    }

    #[test]
    fn write_lease_without_owner() {
        let lease = write_lease("avi-system", None);
        assert_eq!(lease.metadata.owner_references, None);
    }
}
