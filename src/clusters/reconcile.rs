use futures::stream::StreamExt;
use kind_types::Cluster;
use kube::{
    api::ListParams, client::Client, runtime::controller::Action, runtime::Controller, Api,
    ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[cfg(feature = "metrics")]
use super::metrics::{
    CLUSTER_ACTION_COUNTER, CLUSTER_RECONCILE_COUNTER, CLUSTER_RECONCILE_HISTOGRAM,
};

use super::actions;
use crate::{
    kind::{Provisioner, SubnetAllocator},
    metallb::LoadBalancer,
    requeue::{Entry, RequeueKey, RequeueStore, ResourceKind},
    store::{persist_cluster, ClusterStore},
    util::{finalizer, Error, PROFILE_KIND},
};

/// Entrypoint for the `Cluster` controller.
pub async fn run(client: Client, context: Arc<ContextData>) -> Result<(), Error> {
    info!("Starting Cluster controller...");

    let crd_api: Api<Cluster> = Api::all(client);

    // The controller watches every `Cluster`, calls `reconcile` on each
    // change and `on_error` whenever `reconcile` fails.
    Controller::new(crd_api, ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok((object, action)) => debug!(%object, ?action, "reconciled"),
                Err(reconciliation_err) => {
                    warn!(error = %reconciliation_err, "reconciliation error")
                }
            }
        })
        .await;
    Ok(())
}

/// Context injected with each `reconcile` and `on_error` method invocation.
pub struct ContextData {
    /// Storage for `Cluster` resources.
    store: Arc<dyn ClusterStore>,

    /// Creates and deletes the kind clusters.
    provisioner: Arc<dyn Provisioner>,

    /// Installs MetalLB into the kind clusters.
    load_balancer: Arc<dyn LoadBalancer>,

    /// Hands out the MetalLB address pools.
    subnets: Arc<SubnetAllocator>,

    /// Requeue pacing, shared with the other controllers of the process.
    requeue: Arc<RequeueStore>,
}

impl ContextData {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        provisioner: Arc<dyn Provisioner>,
        load_balancer: Arc<dyn LoadBalancer>,
        subnets: Arc<SubnetAllocator>,
        requeue: Arc<RequeueStore>,
    ) -> Self {
        ContextData {
            store,
            provisioner,
            load_balancer,
            subnets,
            requeue,
        }
    }
}

/// Step taken upon a `Cluster` resource during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterAction {
    /// The resource no longer exists.
    NotFound,

    /// Added the finalizer. The update triggers the next reconciliation.
    AddFinalizer,

    /// The kind cluster did not exist and its creation was requested.
    CreateCluster,

    /// MetalLB is installed but not ready yet.
    AwaitLoadBalancer,

    /// The kind cluster and MetalLB are up and configured.
    Ready,

    /// Deletion waits for other controllers to remove their finalizers.
    AwaitForeignFinalizers,

    /// Deletion is underway but the finalizer was already removed.
    Released,

    /// The kind cluster still exists and its deletion was requested.
    DeleteCluster,

    /// The kind cluster is gone and the finalizer was removed.
    RemoveFinalizer,
}

impl ClusterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterAction::NotFound => "NotFound",
            ClusterAction::AddFinalizer => "AddFinalizer",
            ClusterAction::CreateCluster => "CreateCluster",
            ClusterAction::AwaitLoadBalancer => "AwaitLoadBalancer",
            ClusterAction::Ready => "Ready",
            ClusterAction::AwaitForeignFinalizers => "AwaitForeignFinalizers",
            ClusterAction::Released => "Released",
            ClusterAction::DeleteCluster => "DeleteCluster",
            ClusterAction::RemoveFinalizer => "RemoveFinalizer",
        }
    }
}

/// Reconciliation function for the `Cluster` resource.
#[instrument(skip(instance, context), fields(cluster = %instance.name_any(), namespace = %instance.namespace().unwrap_or_default()))]
pub async fn reconcile(instance: Arc<Cluster>, context: Arc<ContextData>) -> Result<Action, Error> {
    let namespace = instance.namespace().ok_or_else(|| {
        Error::UserInputError(
            "Expected Cluster resource to be namespaced. Can't deploy to an unknown namespace."
                .to_owned(),
        )
    })?;
    let name = instance.name_any();

    #[cfg(feature = "metrics")]
    CLUSTER_RECONCILE_COUNTER
        .with_label_values(&[&name, &namespace])
        .inc();
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let entry = context
        .requeue
        .entry(RequeueKey::new(ResourceKind::Cluster, &namespace, &name));

    let (action, requeue) = match converge(&context, &entry, &namespace, &name).await {
        Ok(outcome) => outcome,
        Err(err) => return Err(entry.error(err)),
    };

    if action == ClusterAction::Ready {
        debug!(
            action = action.as_str(),
            ?requeue,
            next = ?entry.next_duration(),
            "cluster is ready"
        );
    } else {
        info!(action = action.as_str(), ?requeue, "reconciled");
    }

    #[cfg(feature = "metrics")]
    {
        CLUSTER_ACTION_COUNTER
            .with_label_values(&[&name, &namespace, action.as_str()])
            .inc();
        CLUSTER_RECONCILE_HISTOGRAM
            .with_label_values(&[&name, &namespace, action.as_str()])
            .observe(start.elapsed().as_secs_f64());
    }

    Ok(requeue)
}

/// One pass of the lifecycle. The resource is fetched fresh, since
/// the copy handed out by the watch may predate our own last write.
/// Status is written once at the end, and only if it changed.
async fn converge(
    context: &ContextData,
    entry: &Entry,
    namespace: &str,
    name: &str,
) -> Result<(ClusterAction, Action), Error> {
    let mut cluster = match context.store.get_cluster(namespace, name).await? {
        Some(cluster) => cluster,
        None => return Ok((ClusterAction::NotFound, entry.never())),
    };

    if cluster.spec.profile != PROFILE_KIND {
        return Err(Error::UnsupportedProfile(cluster.spec.profile.clone()));
    }

    let previous = cluster.status.clone();
    let outcome = if cluster.metadata.deletion_timestamp.is_some() {
        converge_deletion(context, entry, &mut cluster).await?
    } else {
        converge_creation(context, entry, &mut cluster).await?
    };

    // Without our finalizer the resource may already be gone.
    if cluster.status != previous && finalizer::contains(&cluster) {
        if let Some(status) = cluster.status.as_ref() {
            context
                .store
                .patch_cluster_status(namespace, name, previous.as_ref(), status)
                .await?;
        }
    }

    Ok(outcome)
}

async fn converge_creation(
    context: &ContextData,
    entry: &Entry,
    cluster: &mut Cluster,
) -> Result<(ClusterAction, Action), Error> {
    let store = context.store.as_ref();

    if finalizer::add(cluster) {
        persist_cluster(store, cluster).await?;
        // The update triggers another reconciliation. Acting on now
        // stale state would only conflict with it.
        return Ok((ClusterAction::AddFinalizer, entry.never()));
    }

    actions::progressing(cluster);

    let subnet = context.subnets.assign(store, cluster).await?;

    let kind_name = actions::kind_name(cluster);
    if !context.provisioner.cluster_exists(&kind_name).await? {
        if let Err(err) = context.provisioner.create_cluster(&kind_name).await {
            warn!(kind = %kind_name, error = %err, "kind cluster creation failed");
        }
        actions::creating(cluster);
        return Ok((ClusterAction::CreateCluster, entry.progressing()));
    }
    actions::cluster_exists(cluster);

    let access = context.provisioner.kubeconfig(&kind_name).await?;

    let installed = context.load_balancer.install(&access).await?;
    debug!(objects = installed.len(), "MetalLB installed");

    if !context.load_balancer.is_ready(&access).await? {
        actions::awaiting_load_balancer(cluster);
        return Ok((ClusterAction::AwaitLoadBalancer, entry.progressing()));
    }
    actions::load_balancer_ready(cluster);

    let configured = context.load_balancer.configure(&access, subnet).await?;
    debug!(
        %subnet,
        pool = configured.pool.as_str(),
        advertisement = configured.advertisement.as_str(),
        "MetalLB address pool configured"
    );

    actions::ready(cluster);
    Ok((ClusterAction::Ready, entry.stable()))
}

async fn converge_deletion(
    context: &ContextData,
    entry: &Entry,
    cluster: &mut Cluster,
) -> Result<(ClusterAction, Action), Error> {
    actions::terminating(cluster);

    let (foreign, found) = finalizer::identify(cluster);
    if !foreign.is_empty() {
        info!(?foreign, "postponing deletion until foreign finalizers are removed");
        actions::blocked_by_finalizers(cluster);
        return Ok((ClusterAction::AwaitForeignFinalizers, entry.progressing()));
    }
    if !found {
        return Ok((ClusterAction::Released, entry.never()));
    }

    let kind_name = actions::kind_name(cluster);
    if !context.provisioner.cluster_exists(&kind_name).await? {
        finalizer::remove(cluster);
        persist_cluster(context.store.as_ref(), cluster).await?;
        return Ok((ClusterAction::RemoveFinalizer, entry.never()));
    }

    context.provisioner.delete_cluster(&kind_name).await?;
    Ok((ClusterAction::DeleteCluster, entry.progressing()))
}

/// Actions to be taken when a reconciliation fails. Permanent errors
/// wait for the resource to change; anything else is retried after
/// the minimum requeue interval.
pub fn on_error(instance: Arc<Cluster>, error: &Error, context: Arc<ContextData>) -> Action {
    if error.is_permanent() {
        error!(
            %error,
            cluster = %instance.name_any(),
            "reconciliation failed permanently"
        );
        return Action::await_change();
    }
    warn!(%error, cluster = %instance.name_any(), "reconciliation failed");
    Action::requeue(context.requeue.min_interval())
}
