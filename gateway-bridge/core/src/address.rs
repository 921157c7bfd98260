//! Gateway addresses may be assigned once but never changed or removed.

/// The message reported when a gateway's address is changed in place.
pub const ADDRESS_IMMUTABLE_MESSAGE: &str = "IPAddress updates on gateway not supported, \
     please recreate gateway object with the new preferred IPAddress";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressTransition {
    Unchanged,
    /// An address was set on a gateway that had none.
    Assigned,
    /// A previously set address was changed or removed.
    Rejected { old: String, new: Option<String> },
}

impl AddressTransition {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Classifies a change of a gateway's first address. Empty strings are
/// treated as no address.
pub fn address_transition(old: Option<&str>, new: Option<&str>) -> AddressTransition {
    let old = old.filter(|a| !a.is_empty());
    let new = new.filter(|a| !a.is_empty());
    match (old, new) {
        (None, None) => AddressTransition::Unchanged,
        (None, Some(_)) => AddressTransition::Assigned,
        (Some(old), new) if Some(old) == new => AddressTransition::Unchanged,
        (Some(old), new) => AddressTransition::Rejected {
            old: old.to_string(),
            new: new.map(str::to_string),
        },
    }
}
