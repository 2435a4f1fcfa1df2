use async_trait::async_trait;
use std::{net::IpAddr, path::PathBuf};
use tracing::info;

use super::{run, ClusterAccess, Provisioner};
use crate::util::Error;

/// How long `kind create cluster` waits for the control plane.
const WAIT_FOR_READY: &str = "1m";

/// Drives the `kind` CLI on the local docker daemon.
pub struct KindProvisioner {
    /// Kubeconfig file kind writes into on create. Kept out of the
    /// user's default kubeconfig.
    kubeconfig_path: PathBuf,

    /// The controller runs directly on the docker host and can reach
    /// the published API server port on localhost.
    on_local_host: bool,
}

impl KindProvisioner {
    pub fn new(on_local_host: bool) -> Self {
        KindProvisioner {
            kubeconfig_path: std::env::temp_dir().join("cluster-provider-kind.kubeconfig"),
            on_local_host,
        }
    }

    fn kubeconfig_path(&self) -> String {
        self.kubeconfig_path.to_string_lossy().into_owned()
    }
}

/// Name of the docker container running the control plane of `name`.
pub fn control_plane_container(name: &str) -> String {
    format!("{}-control-plane", name)
}

/// Replaces the control plane container's host name in the API server
/// URL with its IP, since the name only resolves on the kind network.
pub fn rewrite_server(kubeconfig: &str, name: &str, ip: IpAddr) -> String {
    kubeconfig.replace(
        &format!("https://{}", control_plane_container(name)),
        &format!("https://{}", ip),
    )
}

async fn container_ip(container: &str) -> Result<IpAddr, Error> {
    let output = run(
        "docker",
        &[
            "container",
            "inspect",
            "-f",
            "{{range.NetworkSettings.Networks}}{{.IPAddress}}{{end}}",
            container,
        ],
    )
    .await?;
    output
        .trim()
        .parse()
        .map_err(|_| Error::CommandFailed {
            command: format!("docker container inspect {}", container),
            message: format!("invalid IP address '{}'", output.trim()),
        })
}

#[async_trait]
impl Provisioner for KindProvisioner {
    async fn cluster_exists(&self, name: &str) -> Result<bool, Error> {
        let output = run("kind", &["get", "clusters"]).await?;
        Ok(output.lines().any(|line| line.trim() == name))
    }

    async fn create_cluster(&self, name: &str) -> Result<(), Error> {
        info!(cluster = name, "creating kind cluster");
        let kubeconfig = self.kubeconfig_path();
        run(
            "kind",
            &[
                "create",
                "cluster",
                "--name",
                name,
                "--wait",
                WAIT_FOR_READY,
                "--kubeconfig",
                &kubeconfig,
            ],
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), Error> {
        info!(cluster = name, "deleting kind cluster");
        let kubeconfig = self.kubeconfig_path();
        run(
            "kind",
            &["delete", "cluster", "--name", name, "--kubeconfig", &kubeconfig],
        )
        .await?;
        Ok(())
    }

    async fn kubeconfig(&self, name: &str) -> Result<ClusterAccess, Error> {
        if self.on_local_host {
            let kubeconfig = run("kind", &["get", "kubeconfig", "--name", name]).await?;
            return Ok(ClusterAccess::new(kubeconfig));
        }
        let kubeconfig = run("kind", &["get", "kubeconfig", "--internal", "--name", name]).await?;
        let ip = container_ip(&control_plane_container(name)).await?;
        Ok(ClusterAccess::new(rewrite_server(&kubeconfig, name, ip)))
    }
}
