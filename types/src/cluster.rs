use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// [`ClusterSpec`] is the desired state of a [`Cluster`] resource, which
/// represents one ephemeral Kubernetes cluster provisioned locally with
/// [kind](https://kind.sigs.k8s.io). The controller only acts on resources
/// whose [`ClusterSpec::profile`] it is responsible for.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "clusters.openmcp.cloud",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    derive = "PartialEq",
    status = "ClusterStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".metadata.creationTimestamp\", \"name\": \"AGE\", \"type\": \"date\" }"
)]
pub struct ClusterSpec {
    /// Opaque tag selecting the provider that manages this cluster.
    /// Resources with a profile other than `kind` are rejected.
    pub profile: String,
}

/// Status object for the [`Cluster`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ClusterStatus {
    /// A short description of the [`Cluster`] resource's current state.
    #[serde(default)]
    pub phase: ClusterPhase,

    /// A human-readable message indicating details about why the
    /// [`Cluster`] is in this phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Independently tracked facts about the cluster, such as whether
    /// the kind cluster exists or the load balancer is ready.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// The `metadata.generation` last acted upon by the controller.
    #[serde(rename = "observedGeneration", default)]
    pub observed_generation: i64,
}

/// A short description of the [`Cluster`] resource's current state.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ClusterPhase {
    /// The resource first appeared to the controller.
    Pending,

    /// The kind cluster or its load balancer is being created or updated.
    Progressing,

    /// The kind cluster exists and its load balancer is configured.
    Ready,

    /// The resource is being deleted.
    Terminating,

    /// The controller has not reported a phase yet.
    Unknown,
}

impl Default for ClusterPhase {
    fn default() -> Self {
        ClusterPhase::Unknown
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Progressing => write!(f, "Progressing"),
            ClusterPhase::Ready => write!(f, "Ready"),
            ClusterPhase::Terminating => write!(f, "Terminating"),
            ClusterPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Condition types reported on [`ClusterStatus::conditions`].
pub mod conditions {
    /// The kind cluster exists.
    pub const KIND_READY: &str = "KindReady";

    /// All MetalLB pods in the kind cluster are ready.
    pub const METALLB_READY: &str = "MetalLBReady";

    /// Aggregate readiness of the cluster and its load balancer.
    pub const READY: &str = "Ready";
}

impl Cluster {
    /// Returns a mutable reference to the status object,
    /// initializing it if the resource has none yet.
    pub fn status_mut(&mut self) -> &mut ClusterStatus {
        self.status.get_or_insert_with(Default::default)
    }

    /// Returns the current phase, or [`ClusterPhase::Unknown`]
    /// if the controller has not written a status yet.
    pub fn phase(&self) -> ClusterPhase {
        self.status
            .as_ref()
            .map_or(ClusterPhase::Unknown, |status| status.phase)
    }
}
