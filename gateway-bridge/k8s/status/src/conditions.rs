#[cfg(not(test))]
use chrono::offset::Utc;
use gateway_bridge_core::conditions::{ConditionType, Reason};
use gateway_bridge_k8s_api::{Condition, ConditionStatus};

pub(crate) fn active(
    type_: ConditionType,
    reason: Reason,
    message: impl Into<String>,
) -> Condition {
    #[cfg(not(test))]
    let timestamp = Utc::now();
    #[cfg(test)]
    let timestamp = chrono::DateTime::<chrono::Utc>::MIN_UTC;

    Condition {
        type_: type_.to_string(),
        status: ConditionStatus::True,
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Some(timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
    }
}
