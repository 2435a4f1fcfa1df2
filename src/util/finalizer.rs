use kube::ResourceExt;

/// Name of the kubernetes resource finalizer field.
pub const FINALIZER_NAME: &str = "clusters.openmcp.cloud/finalizer";

/// Returns true if the resource carries this controller's finalizer.
pub fn contains<T: ResourceExt>(instance: &T) -> bool {
    instance.finalizers().iter().any(|f| f == FINALIZER_NAME)
}

/// Adds the finalizer to the in-memory resource. Returns true if it was
/// missing, in which case the caller must persist the resource.
pub fn add<T: ResourceExt>(instance: &mut T) -> bool {
    if contains(instance) {
        return false;
    }
    instance.finalizers_mut().push(FINALIZER_NAME.to_owned());
    true
}

/// Removes the finalizer from the in-memory resource, leaving finalizers
/// owned by other controllers in place. Returns true if it was present.
pub fn remove<T: ResourceExt>(instance: &mut T) -> bool {
    let finalizers = instance.finalizers_mut();
    let before = finalizers.len();
    finalizers.retain(|f| f != FINALIZER_NAME);
    before != finalizers.len()
}

/// Splits the resource's finalizers into the ones owned by other
/// controllers (first value) and whether ours is present (second value).
pub fn identify<T: ResourceExt>(instance: &T) -> (Vec<String>, bool) {
    let mut found = false;
    let foreign = instance
        .finalizers()
        .iter()
        .filter(|f| {
            if f.as_str() == FINALIZER_NAME {
                found = true;
                false
            } else {
                true
            }
        })
        .cloned()
        .collect();
    (foreign, found)
}
