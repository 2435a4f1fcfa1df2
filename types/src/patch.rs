use serde::Serialize;
use serde_json::{json, Value};

/// Builds a JSON patch that moves a resource's status from `previous`
/// to `next`. Only `/status` paths are touched, so the patch can be sent
/// to the status subresource without knowing the rest of the object.
/// A resource with no status yet yields a single `add /status` operation.
pub fn status_patch<S: Serialize>(
    previous: Option<&S>,
    next: &S,
) -> Result<json_patch::Patch, serde_json::Error> {
    let before: Value = match previous {
        Some(status) => json!({ "status": serde_json::to_value(status)? }),
        None => json!({}),
    };
    let after: Value = json!({ "status": serde_json::to_value(next)? });
    Ok(json_patch::diff(&before, &after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterPhase, ClusterStatus};

    #[test]
    fn missing_status_is_added_whole() {
        let next = ClusterStatus {
            phase: ClusterPhase::Progressing,
            ..Default::default()
        };
        let patch = status_patch::<ClusterStatus>(None, &next).unwrap();
        let ops = serde_json::to_value(&patch).unwrap();
        assert_eq!(ops[0]["op"], "add");
        assert_eq!(ops[0]["path"], "/status");
    }

    #[test]
    fn changed_phase_only_touches_phase() {
        let previous = ClusterStatus {
            phase: ClusterPhase::Progressing,
            observed_generation: 3,
            ..Default::default()
        };
        let next = ClusterStatus {
            phase: ClusterPhase::Ready,
            ..previous.clone()
        };
        let patch = status_patch(Some(&previous), &next).unwrap();
        let ops = serde_json::to_value(&patch).unwrap();
        assert_eq!(ops.as_array().map(Vec::len), Some(1));
        assert_eq!(ops[0]["path"], "/status/phase");
        assert_eq!(ops[0]["value"], "Ready");
    }
}
