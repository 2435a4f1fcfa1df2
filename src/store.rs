//! Access to the resources the controllers read and write.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kind_types::{patch::status_patch, AccessRequest, AccessRequestStatus, Cluster, ClusterStatus};
use kube::{
    api::{Api, ListParams, Patch, PatchParams, PostParams},
    Client, ResourceExt,
};

use crate::util::{Error, MANAGER_NAME};

/// Result of an idempotent create-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The object did not exist and was created.
    Created,

    /// An identical object already existed.
    AlreadyPresent,

    /// The object existed and was overwritten.
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::AlreadyPresent => "already-present",
            UpsertOutcome::Updated => "updated",
        }
    }
}

/// Storage for [`Cluster`] resources.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Returns `None` if the resource does not exist.
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error>;

    /// Lists `Cluster` resources across all namespaces.
    async fn list_clusters(&self) -> Result<Vec<Cluster>, Error>;

    /// Replaces metadata and spec. The write is rejected with
    /// [`Error::Conflict`] if the resource changed since it was read.
    /// The status of the argument is ignored.
    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, Error>;

    /// Moves the stored status from `previous` to `next`.
    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&ClusterStatus>,
        next: &ClusterStatus,
    ) -> Result<(), Error>;
}

/// Storage for [`AccessRequest`] resources and the credentials issued for them.
#[async_trait]
pub trait AccessRequestStore: Send + Sync {
    async fn get_access_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AccessRequest>, Error>;

    async fn update_access_request(&self, request: &AccessRequest) -> Result<AccessRequest, Error>;

    async fn patch_access_request_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&AccessRequestStatus>,
        next: &AccessRequestStatus,
    ) -> Result<(), Error>;

    /// Creates the secret or overwrites its data.
    async fn apply_secret(&self, secret: &Secret) -> Result<UpsertOutcome, Error>;
}

/// Writes the in-memory metadata of `cluster` back to the store and
/// refreshes it with the stored copy. The in-memory status survives,
/// since the update does not write it.
pub async fn persist_cluster(store: &dyn ClusterStore, cluster: &mut Cluster) -> Result<(), Error> {
    let status = cluster.status.take();
    let mut updated = store.update_cluster(cluster).await?;
    updated.status = status;
    *cluster = updated;
    Ok(())
}

/// Same as [`persist_cluster`] for an [`AccessRequest`].
pub async fn persist_access_request(
    store: &dyn AccessRequestStore,
    request: &mut AccessRequest,
) -> Result<(), Error> {
    let status = request.status.take();
    let mut updated = store.update_access_request(request).await?;
    updated.status = status;
    *request = updated;
    Ok(())
}

/// Store backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(MANAGER_NAME.to_owned()),
        ..Default::default()
    }
}

fn describe(kind: &str, namespace: &str, name: &str) -> String {
    format!("{} {}/{}", kind, namespace, name)
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, Error> {
        let api: Api<Cluster> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, Error> {
        let namespace = cluster.namespace().unwrap_or_default();
        let name = cluster.name_any();
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &post_params(), cluster)
            .await
            .map_err(|e| Error::from_api(e, &describe("Cluster", &namespace, &name)))
    }

    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&ClusterStatus>,
        next: &ClusterStatus,
    ) -> Result<(), Error> {
        let patch = Patch::Json::<()>(status_patch(previous, next)?);
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::apply(MANAGER_NAME), &patch)
            .await
            .map_err(|e| Error::from_api(e, &describe("Cluster", namespace, name)))?;
        Ok(())
    }
}

#[async_trait]
impl AccessRequestStore for KubeStore {
    async fn get_access_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AccessRequest>, Error> {
        let api: Api<AccessRequest> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_access_request(&self, request: &AccessRequest) -> Result<AccessRequest, Error> {
        let namespace = request.namespace().unwrap_or_default();
        let name = request.name_any();
        let api: Api<AccessRequest> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &post_params(), request)
            .await
            .map_err(|e| Error::from_api(e, &describe("AccessRequest", &namespace, &name)))
    }

    async fn patch_access_request_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&AccessRequestStatus>,
        next: &AccessRequestStatus,
    ) -> Result<(), Error> {
        let patch = Patch::Json::<()>(status_patch(previous, next)?);
        let api: Api<AccessRequest> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::apply(MANAGER_NAME), &patch)
            .await
            .map_err(|e| Error::from_api(e, &describe("AccessRequest", namespace, name)))?;
        Ok(())
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<UpsertOutcome, Error> {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        let what = describe("Secret", &namespace, &name);
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        match api.get_opt(&name).await? {
            None => {
                api.create(&post_params(), secret)
                    .await
                    .map_err(|e| Error::from_api(e, &what))?;
                Ok(UpsertOutcome::Created)
            }
            Some(existing) if existing.data == secret.data => Ok(UpsertOutcome::AlreadyPresent),
            Some(existing) => {
                let mut desired = secret.clone();
                desired.metadata.resource_version = existing.resource_version();
                api.replace(&name, &post_params(), &desired)
                    .await
                    .map_err(|e| Error::from_api(e, &what))?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }
}
