use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// [`AccessRequestSpec`] asks the controller to issue credentials for a
/// [`Cluster`](crate::Cluster). Once granted, the credentials are written to a
/// [`Secret`](k8s_openapi::api::core::v1::Secret) in the request's namespace
/// and referenced by [`AccessRequestStatus::secret_ref`].
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "clusters.openmcp.cloud",
    version = "v1alpha1",
    kind = "AccessRequest",
    plural = "accessrequests",
    shortname = "ar",
    derive = "PartialEq",
    status = "AccessRequestStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
pub struct AccessRequestSpec {
    /// Reference to the [`Cluster`](crate::Cluster) for which access is requested.
    /// The cluster is looked up in the request's namespace.
    #[serde(rename = "clusterRef", skip_serializing_if = "Option::is_none")]
    pub cluster_ref: Option<ObjectReference>,

    /// The requested permissions.
    #[serde(default)]
    pub permissions: Vec<PermissionsRequest>,
}

/// Reference to an object by name and, optionally, namespace.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ObjectReference {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Reference to one key of a [`Secret`](k8s_openapi::api::core::v1::Secret).
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

/// Permissions requested for one namespace, or cluster-wide
/// when [`PermissionsRequest::namespace`] is unset.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PermissionsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub rules: Vec<PolicyRule>,
}

/// An RBAC policy rule. Mirrors `rbac/v1.PolicyRule`.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PolicyRule {
    #[serde(rename = "apiGroups", default, skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(rename = "resourceNames", default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,

    #[serde(rename = "nonResourceURLs", default, skip_serializing_if = "Vec::is_empty")]
    pub non_resource_urls: Vec<String>,

    pub verbs: Vec<String>,
}

/// Status object for the [`AccessRequest`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct AccessRequestStatus {
    /// A short description of the [`AccessRequest`] resource's current state.
    #[serde(default)]
    pub phase: AccessRequestPhase,

    /// A human-readable message indicating details about why the
    /// [`AccessRequest`] is in this phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The [`Secret`](k8s_openapi::api::core::v1::Secret) holding the issued kubeconfig.
    #[serde(rename = "secretRef", skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
}

/// A short description of the [`AccessRequest`] resource's current state.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum AccessRequestPhase {
    /// The request has not been granted yet.
    Pending,

    /// Credentials were issued.
    Granted,

    /// The request cannot be fulfilled as specified.
    Denied,
}

impl Default for AccessRequestPhase {
    fn default() -> Self {
        AccessRequestPhase::Pending
    }
}

impl fmt::Display for AccessRequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessRequestPhase::Pending => write!(f, "Pending"),
            AccessRequestPhase::Granted => write!(f, "Granted"),
            AccessRequestPhase::Denied => write!(f, "Denied"),
        }
    }
}

impl AccessRequest {
    /// Returns a mutable reference to the status object,
    /// initializing it if the resource has none yet.
    pub fn status_mut(&mut self) -> &mut AccessRequestStatus {
        self.status.get_or_insert_with(Default::default)
    }
}
