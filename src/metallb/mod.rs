//! MetalLB inside provisioned kind clusters.

mod install;
mod status;

pub use install::*;
pub use status::*;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    kind::{ClusterAccess, Ipv4Cidr},
    store::UpsertOutcome,
    util::Error,
};

/// Namespace the MetalLB components run in.
pub const METALLB_NAMESPACE: &str = "metallb-system";

/// Name shared by the address pool and the L2 advertisement.
pub const POOL_NAME: &str = "kind";

/// Label value stamped on every object the controller installs.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Outcome of configuring the address pool for a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetConfig {
    pub pool: UpsertOutcome,
    pub advertisement: UpsertOutcome,
}

/// Installs and configures the load balancer of a provisioned cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Creates every component object. Objects that already exist are
    /// left alone and reported as [`UpsertOutcome::AlreadyPresent`].
    async fn install(&self, access: &ClusterAccess) -> Result<Vec<UpsertOutcome>, Error>;

    /// True once every load balancer pod reports `Ready`.
    async fn is_ready(&self, access: &ClusterAccess) -> Result<bool, Error>;

    /// Points the address pool at `subnet` and advertises it on L2.
    async fn configure(
        &self,
        access: &ClusterAccess,
        subnet: Ipv4Cidr,
    ) -> Result<SubnetConfig, Error>;
}
