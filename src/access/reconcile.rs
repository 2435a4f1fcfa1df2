use futures::stream::StreamExt;
use kind_types::{AccessRequest, ClusterPhase};
use kube::{
    api::ListParams, client::Client, runtime::controller::Action, runtime::Controller, Api,
    ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[cfg(feature = "metrics")]
use super::metrics::{ACCESS_ACTION_COUNTER, ACCESS_RECONCILE_COUNTER, ACCESS_RECONCILE_HISTOGRAM};

use super::actions;
use crate::{
    clusters::kind_name,
    kind::Provisioner,
    requeue::{Entry, RequeueKey, RequeueStore, ResourceKind},
    store::{persist_access_request, AccessRequestStore, ClusterStore},
    util::{finalizer, messages, Error, PROFILE_KIND},
};

/// Entrypoint for the `AccessRequest` controller.
pub async fn run(client: Client, context: Arc<ContextData>) -> Result<(), Error> {
    info!("Starting AccessRequest controller...");

    let crd_api: Api<AccessRequest> = Api::all(client);
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
    /// Looks up the `Cluster` a request refers to.
    clusters: Arc<dyn ClusterStore>,

    /// Storage for `AccessRequest` resources and the issued secrets.
    requests: Arc<dyn AccessRequestStore>,

    /// Fetches the kubeconfig of the kind cluster.
    provisioner: Arc<dyn Provisioner>,

    requeue: Arc<RequeueStore>,
}

impl ContextData {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        requests: Arc<dyn AccessRequestStore>,
        provisioner: Arc<dyn Provisioner>,
        requeue: Arc<RequeueStore>,
    ) -> Self {
        ContextData {
            clusters,
            requests,
            provisioner,
            requeue,
        }
    }
}

/// Step taken upon an `AccessRequest` resource during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequestAction {
    /// The resource no longer exists.
    NotFound,

    /// The request is being deleted and its finalizer was removed.
    Release,

    /// The request names no cluster.
    Deny,

    /// The referenced cluster is not ready yet.
    AwaitCluster,

    /// The kubeconfig secret is in place.
    Grant,
}

impl AccessRequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestAction::NotFound => "NotFound",
            AccessRequestAction::Release => "Release",
            AccessRequestAction::Deny => "Deny",
            AccessRequestAction::AwaitCluster => "AwaitCluster",
            AccessRequestAction::Grant => "Grant",
        }
    }
}

/// Reconciliation function for the `AccessRequest` resource.
#[instrument(skip(instance, context), fields(request = %instance.name_any(), namespace = %instance.namespace().unwrap_or_default()))]
pub async fn reconcile(
    instance: Arc<AccessRequest>,
    context: Arc<ContextData>,
) -> Result<Action, Error> {
    let namespace = instance.namespace().ok_or_else(|| {
        Error::UserInputError("Expected AccessRequest resource to be namespaced.".to_owned())
    })?;
    let name = instance.name_any();

    #[cfg(feature = "metrics")]
    ACCESS_RECONCILE_COUNTER
        .with_label_values(&[&name, &namespace])
        .inc();
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let entry = context
        .requeue
        .entry(RequeueKey::new(ResourceKind::AccessRequest, &namespace, &name));

    let (action, requeue) = match converge(&context, &entry, &namespace, &name).await {
        Ok(outcome) => outcome,
        Err(err) => return Err(entry.error(err)),
    };

    if action == AccessRequestAction::Grant {
        debug!(action = action.as_str(), ?requeue, "access granted");
    } else {
        info!(action = action.as_str(), ?requeue, "reconciled");
    }

    #[cfg(feature = "metrics")]
    {
        ACCESS_ACTION_COUNTER
            .with_label_values(&[&name, &namespace, action.as_str()])
            .inc();
        ACCESS_RECONCILE_HISTOGRAM
            .with_label_values(&[&name, &namespace, action.as_str()])
            .observe(start.elapsed().as_secs_f64());
    }

    Ok(requeue)
}

async fn converge(
    context: &ContextData,
    entry: &Entry,
    namespace: &str,
    name: &str,
) -> Result<(AccessRequestAction, Action), Error> {
    let requests = context.requests.as_ref();
    let mut request = match requests.get_access_request(namespace, name).await? {
        Some(request) => request,
        None => return Ok((AccessRequestAction::NotFound, entry.never())),
    };

    // The issued secret is owned by the request and goes away with it.
    if request.metadata.deletion_timestamp.is_some() {
        if finalizer::remove(&mut request) {
            persist_access_request(requests, &mut request).await?;
        }
        return Ok((AccessRequestAction::Release, entry.never()));
    }

    let previous = request.status.clone();
    let outcome = grant(context, entry, namespace, &mut request).await?;

    if request.status != previous {
        if let Some(status) = request.status.as_ref() {
            requests
                .patch_access_request_status(namespace, name, previous.as_ref(), status)
                .await?;
        }
    }

    Ok(outcome)
}

async fn grant(
    context: &ContextData,
    entry: &Entry,
    namespace: &str,
    request: &mut AccessRequest,
) -> Result<(AccessRequestAction, Action), Error> {
    let cluster_ref = match request.spec.cluster_ref.as_ref() {
        Some(cluster_ref) => cluster_ref.name.clone(),
        None => {
            actions::denied(request, messages::NO_CLUSTER_REF);
            return Ok((AccessRequestAction::Deny, entry.never()));
        }
    };

    let cluster = context
        .clusters
        .get_cluster(namespace, &cluster_ref)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Cluster {}/{}", namespace, cluster_ref)))?;

    if cluster.spec.profile != PROFILE_KIND {
        return Err(Error::UnsupportedProfile(cluster.spec.profile.clone()));
    }

    if finalizer::add(request) {
        persist_access_request(context.requests.as_ref(), request).await?;
    }

    if cluster.phase() != ClusterPhase::Ready {
        actions::cluster_not_ready(request);
        return Ok((AccessRequestAction::AwaitCluster, entry.progressing()));
    }

    let access = context.provisioner.kubeconfig(&kind_name(&cluster)).await?;
    let secret = actions::kubeconfig_secret(request, &access);
    let outcome = context.requests.apply_secret(&secret).await?;
    debug!(secret = %secret.name_any(), outcome = outcome.as_str(), "kubeconfig secret applied");

    actions::granted(request, &secret);
    Ok((AccessRequestAction::Grant, entry.stable()))
}

/// Actions to be taken when a reconciliation fails.
pub fn on_error(instance: Arc<AccessRequest>, error: &Error, context: Arc<ContextData>) -> Action {
    if error.is_permanent() {
        error!(
            %error,
            request = %instance.name_any(),
            "reconciliation failed permanently"
        );
        return Action::await_change();
    }
    warn!(%error, request = %instance.name_any(), "reconciliation failed");
    Action::requeue(context.requeue.min_interval())
}
