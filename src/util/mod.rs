pub mod finalizer;
pub mod messages;

mod error;

pub use error::*;

/// The only profile this controller is responsible for.
pub const PROFILE_KIND: &str = "kind";

/// Annotation that overrides the name of the kind cluster.
pub const ANNOTATION_NAME: &str = "kind.clusters.openmcp.cloud/name";

/// Annotation holding the /24 subnet assigned to a `Cluster`'s
/// load balancer address pool.
pub const ANNOTATION_ASSIGNED_SUBNET: &str = "clusters.openmcp.cloud/assigned-subnet";

/// Name of the kubernetes resource manager.
pub const MANAGER_NAME: &str = "cluster-provider-kind";
