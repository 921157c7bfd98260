use crate::{conditions, StatusError, StatusStore};
use gateway_bridge_core::{
    address::{address_transition, AddressTransition, ADDRESS_IMMUTABLE_MESSAGE},
    conditions::{ConditionType, Reason},
};
use gateway_bridge_k8s_api::{Gateway, ResourceExt};
use std::sync::Arc;

/// Rejects updates that change or remove a gateway's address.
pub struct AddressGuard {
    store: Arc<dyn StatusStore>,
}

impl AddressGuard {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Classifies the address change from `old` to `new`. A rejected change
    /// marks `new` as `Pending/InvalidAddress` and writes its status once.
    ///
    /// An error is only returned for a rejected change whose status could not
    /// be written; callers must treat it as a rejection.
    pub async fn check(
        &self,
        old: &Gateway,
        new: &mut Gateway,
    ) -> Result<AddressTransition, StatusError> {
        let transition = address_transition(old.spec.first_address(), new.spec.first_address());

        if let AddressTransition::Rejected {
            old: ref last,
            new: ref current,
        } = transition
        {
            tracing::error!(
                namespace = %new.namespace().unwrap_or_default(),
                name = %new.name_unchecked(),
                last_address = %last,
                current_address = current.as_deref().unwrap_or(""),
                "{ADDRESS_IMMUTABLE_MESSAGE}",
            );
            new.status.get_or_insert_with(Default::default).set_condition(
                conditions::active(
                    ConditionType::Pending,
                    Reason::InvalidAddress,
                    ADDRESS_IMMUTABLE_MESSAGE,
                ),
            );
            self.store.update_gateway_status(new).await?;
        }

        Ok(transition)
    }
}
