use clap::{Parser, Subcommand};
use kube::client::Client;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod access;
mod clusters;
mod kind;
mod metallb;
mod requeue;
mod store;
mod util;

#[cfg(feature = "metrics")]
mod metrics;


use kind::{DockerNetwork, KindProvisioner, Provisioner, SubnetAllocator, DEFAULT_NETWORK};
use metallb::MetalLb;
use requeue::RequeueStore;
use store::KubeStore;
use util::Error;

/// Command line configuration. Every flag can also be set through
/// the environment variable named next to it.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Requeue interval while a resource is progressing, and the
    /// starting point of the backoff once it is stable.
    #[arg(long, env = "MIN_REQUEUE_INTERVAL", default_value = "1s", value_parser = parse_interval)]
    min_interval: Duration,

    /// Upper bound of the requeue backoff.
    #[arg(long, env = "MAX_REQUEUE_INTERVAL", default_value = "1m", value_parser = parse_interval)]
    max_interval: Duration,

    /// Factor the requeue interval grows by on every stable reconciliation.
    #[arg(long, env = "REQUEUE_MULTIPLIER", default_value_t = 2.0)]
    multiplier: f64,

    /// Docker network the kind clusters are attached to. Load balancer
    /// subnets are carved out of it.
    #[arg(long, env = "KIND_NETWORK", default_value = DEFAULT_NETWORK)]
    network: String,

    /// Set when the controller runs directly on the docker host rather
    /// than in a container on the kind network.
    #[arg(long, env = "KIND_ON_LOCAL_HOST")]
    kind_on_local_host: bool,

    /// Path to the MetalLB native manifest installed into every cluster.
    #[arg(long, env = "METALLB_MANIFEST", default_value = "metallb-native.yaml")]
    metallb_manifest: PathBuf,

    /// Port of the prometheus scrape endpoint. No server is started
    /// when unset.
    #[cfg(feature = "metrics")]
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

/// Controllers the process runs, e.g. `manage-clusters`.
#[derive(Subcommand)]
enum Command {
    ManageClusters,
    ManageAccessRequests,
    ManageAll,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    parse_duration::parse(s).map_err(|e| e.to_string())
}

fn cluster_context(
    cli: &Cli,
    store: Arc<KubeStore>,
    provisioner: Arc<dyn Provisioner>,
    requeue: Arc<RequeueStore>,
) -> Result<Arc<clusters::ContextData>, Error> {
    let load_balancer = Arc::new(MetalLb::from_manifest_file(&cli.metallb_manifest)?);
    let network = Arc::new(DockerNetwork::new(cli.network.clone()));
    let subnets = Arc::new(SubnetAllocator::new(network));
    Ok(Arc::new(clusters::ContextData::new(
        store,
        provisioner,
        load_balancer,
        subnets,
        requeue,
    )))
}

fn access_context(
    store: Arc<KubeStore>,
    provisioner: Arc<dyn Provisioner>,
    requeue: Arc<RequeueStore>,
) -> Arc<access::ContextData> {
    Arc::new(access::ContextData::new(
        store.clone(),
        store,
        provisioner,
        requeue,
    ))
}

/// Builds the collaborators and runs the controllers the subcommand selects.
async fn run(client: Client, cli: Cli) -> Result<(), Error> {
    #[cfg(feature = "metrics")]
    if let Some(metrics_port) = cli.metrics_port {
        tokio::spawn(metrics::run_server(metrics_port));
    }

    // One pacing store for the whole process, shared by every controller.
    let requeue = Arc::new(RequeueStore::new(
        cli.min_interval,
        cli.max_interval,
        cli.multiplier,
    )?);
    info!(
        min_interval = ?requeue.min_interval(),
        max_interval = ?requeue.max_interval(),
        multiplier = cli.multiplier,
        "requeue pacing configured"
    );

    let store = Arc::new(KubeStore::new(client.clone()));
    let provisioner: Arc<dyn Provisioner> = Arc::new(KindProvisioner::new(cli.kind_on_local_host));

    match cli.command {
        Command::ManageClusters => {
            let context = cluster_context(&cli, store, provisioner, requeue)?;
            clusters::run(client, context).await
        }
        Command::ManageAccessRequests => {
            let context = access_context(store, provisioner, requeue);
            access::run(client, context).await
        }
        Command::ManageAll => {
            let clusters_context =
                cluster_context(&cli, store.clone(), provisioner.clone(), requeue.clone())?;
            let access_context = access_context(store, provisioner, requeue);
            let (clusters_result, access_result) = tokio::join!(
                clusters::run(client.clone(), clusters_context),
                access::run(client, access_context),
            );
            clusters_result.and(access_result)
        }
    }
}

/// Sets up logging and the API client, then hands over to [`run`].
#[tokio::main]
async fn main() {
    // A panic on any thread takes the whole process down.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Picks up the service account in-cluster, `KUBECONFIG` elsewhere.
    let client = match Client::try_default().await {
        Ok(client) => client,
        Err(err) => {
            error!(%err, "expected a valid KUBECONFIG environment variable");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(client, cli).await {
        error!(%err, "controller failed");
        std::process::exit(1);
    }

    // The controllers should never exit on their own.
    error!("exited prematurely");
    std::process::exit(1);
}
