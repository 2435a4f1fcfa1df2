//! Adaptive requeue pacing for reconcilers.
//!
//! Every reconciled resource gets an [`Entry`] keyed by its kind, namespace
//! and name. The entry hands the controller an [`Action`](kube::runtime::controller::Action)
//! that backs off exponentially while the resource is settled and snaps
//! back to the minimum interval while work is in flight or after an error.

mod entry;
mod store;

pub use entry::Entry;
pub use store::RequeueStore;

use std::fmt;

/// Discriminates the resource kinds sharing one [`RequeueStore`], so that
/// a `Cluster` and an `AccessRequest` with the same name never share pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cluster,
    AccessRequest,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cluster => write!(f, "Cluster"),
            ResourceKind::AccessRequest => write!(f, "AccessRequest"),
        }
    }
}

/// Identity of one pacing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequeueKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl RequeueKey {
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        RequeueKey {
            kind,
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }
}

impl fmt::Display for RequeueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}
