/// User-friendly message to display in `status.message` while the
/// kind cluster or its load balancer is being set up.
pub const PROGRESSING: &str = "Provisioning kind cluster and load balancer.";

/// User-friendly message to display in `status.message` while the
/// kind cluster is waiting to be created.
pub const CREATING: &str = "Waiting for the kind cluster to be created.";

/// User-friendly message to display in `status.message` while the
/// MetalLB pods are starting.
pub const AWAITING_LOAD_BALANCER: &str = "Waiting for MetalLB pods to become ready.";

/// User-friendly message to display in `status.message` whenever a
/// `Cluster` is in the `Ready` phase.
pub const READY: &str = "Kind cluster and MetalLB are ready.";

/// User-friendly message to display in `status.message` whenever a resource's
/// deletion is pending garbage collection.
pub const TERMINATING: &str = "Resource deletion is pending garbage collection.";

/// User-friendly message to display in `status.message` when deletion is
/// blocked by finalizers owned by other controllers.
pub const FOREIGN_FINALIZERS: &str = "Waiting for other controllers to release their finalizers.";

/// User-friendly message to display in `status.message` whenever an
/// `AccessRequest` has been granted.
pub const GRANTED: &str = "Credentials issued.";

/// User-friendly message to display in `status.message` whenever an
/// `AccessRequest` lacks a cluster reference.
pub const NO_CLUSTER_REF: &str = "spec.clusterRef must be set.";

/// User-friendly message to display in `status.message` whenever an
/// `AccessRequest` waits for its `Cluster` to become ready.
pub const CLUSTER_NOT_READY: &str = "Waiting for the referenced Cluster to become ready.";
