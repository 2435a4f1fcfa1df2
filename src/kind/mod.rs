//! Everything that talks to the `kind` and `docker` CLIs.

mod networking;
mod provisioner;
mod subnet;

pub use networking::*;
pub use provisioner::*;
pub use subnet::*;

use async_trait::async_trait;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;

use crate::util::Error;

/// Administrative access to a provisioned kind cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAccess {
    /// Kubeconfig document with cluster-admin credentials.
    pub kubeconfig: String,
}

impl ClusterAccess {
    pub fn new(kubeconfig: impl Into<String>) -> Self {
        ClusterAccess {
            kubeconfig: kubeconfig.into(),
        }
    }

    /// Builds a client for the provisioned cluster.
    pub async fn client(&self) -> Result<Client, Error> {
        let kubeconfig = Kubeconfig::from_yaml(&self.kubeconfig)?;
        let config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        Ok(Client::try_from(config)?)
    }
}

/// Creates, deletes and hands out credentials for named clusters.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn cluster_exists(&self, name: &str) -> Result<bool, Error>;

    /// Creates the cluster and waits for its control plane.
    async fn create_cluster(&self, name: &str) -> Result<(), Error>;

    async fn delete_cluster(&self, name: &str) -> Result<(), Error>;

    /// Returns cluster-admin access to the cluster.
    async fn kubeconfig(&self, name: &str) -> Result<ClusterAccess, Error>;
}

/// Reports the parent IPv4 network of the bridge network shared by
/// all kind clusters.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    async fn ipv4_network(&self) -> Result<Ipv4Cidr, Error>;
}

/// Runs a CLI to completion and returns its stdout. A non-zero exit
/// status becomes [`Error::CommandFailed`] carrying stderr.
pub(crate) async fn run(program: &str, args: &[&str]) -> Result<String, Error> {
    let command = format!("{} {}", program, args.join(" "));
    debug!(%command, "running");
    let output = Command::new(program).args(args).output().await?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command,
            message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
