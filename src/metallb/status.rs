use k8s_openapi::api::core::v1::Pod;

/// True if the pod's `Ready` condition is `True`.
pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// True if there is at least one pod and every pod is ready. Before
/// the first pods are scheduled the list is empty, which is not ready.
pub fn pods_ready(pods: &[Pod]) -> bool {
    !pods.is_empty() && pods.iter().all(pod_ready)
}
