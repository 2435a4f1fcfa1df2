use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, independently tracked fact about a resource. Mirrors the
/// shape of `metav1.Condition`, which [`k8s_openapi`] provides but
/// without a [`JsonSchema`] implementation.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Condition {
    /// Type of the condition, e.g. `Ready`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Whether the condition currently holds.
    pub status: ConditionStatus,

    /// CamelCase reason code for the condition's last transition.
    pub reason: String,

    /// Optional human-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// RFC 3339 timestamp of the last time [`Condition::status`] changed.
    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Status of a [`Condition`].
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Default for ConditionStatus {
    fn default() -> Self {
        ConditionStatus::Unknown
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Condition {
    /// Builds a condition without a transition time. The time is
    /// stamped by [`set_condition`] when the status actually flips.
    pub fn new(type_: &str, status: ConditionStatus, reason: &str) -> Self {
        Condition {
            type_: type_.to_owned(),
            status,
            reason: reason.to_owned(),
            ..Default::default()
        }
    }
}

/// Returns the condition with the given type, if present.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Sets `new` on the list, replacing any condition of the same type.
/// The transition time only moves when the status changes, so setting
/// an identical condition twice leaves the list untouched. Returns true
/// if the list was modified.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        None => {
            new.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
            conditions.push(new);
            true
        }
        Some(existing) => {
            let mut changed = false;
            if existing.status != new.status {
                existing.status = new.status;
                existing.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
                changed = true;
            }
            if existing.reason != new.reason {
                existing.reason = new.reason;
                changed = true;
            }
            if existing.message != new.message {
                existing.message = new.message;
                changed = true;
            }
            changed
        }
    }
}
