use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::Time};
use kind_types::{
    AccessRequest, AccessRequestSpec, AccessRequestStatus, Cluster, ClusterSpec, ClusterStatus,
    ObjectReference,
};
use kube::ResourceExt;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    access,
    clusters,
    kind::{MockNetworkInspector, MockProvisioner, SubnetAllocator},
    metallb::MockLoadBalancer,
    requeue::RequeueStore,
    store::{AccessRequestStore, ClusterStore, UpsertOutcome},
    util::{finalizer::FINALIZER_NAME, Error},
};

/// Namespace all test resources live in.
pub const NAMESPACE: &str = "default";

/// Name of the test Cluster resource.
pub const CLUSTER_NAME: &str = "test";

/// Name of the kind cluster backing the test Cluster.
pub const KIND_NAME: &str = "default.test";

/// Name of the test AccessRequest resource.
pub const REQUEST_NAME: &str = "admin";

/// Parent network reported by the mocked docker network.
pub const KIND_NETWORK: &str = "172.18.0.0/16";

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

type Key = (String, String);

fn key<K: ResourceExt>(object: &K) -> Key {
    (object.namespace().unwrap_or_default(), object.name_any())
}

#[derive(Default)]
struct Objects {
    clusters: BTreeMap<Key, Cluster>,
    requests: BTreeMap<Key, AccessRequest>,
    secrets: BTreeMap<Key, Secret>,
    version: u64,
    updates: usize,
    status_writes: usize,
}

impl Objects {
    fn next_version(&mut self) -> Option<String> {
        self.version += 1;
        Some(self.version.to_string())
    }
}

/// In-memory stand-in for the API server. Updates are checked against
/// `resourceVersion`, ignore the status like the real main resource
/// endpoint does, and an object marked for deletion disappears once its
/// last finalizer is removed.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<Objects>,
}

impl FakeStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores `cluster` as if created by a user, filling in the
    /// server-populated metadata.
    pub fn insert_cluster(&self, mut cluster: Cluster) -> Cluster {
        let mut objects = self.objects.lock().unwrap();
        fill_metadata(&mut cluster, objects.next_version());
        objects.clusters.insert(key(&cluster), cluster.clone());
        cluster
    }

    pub fn cluster(&self, namespace: &str, name: &str) -> Option<Cluster> {
        let objects = self.objects.lock().unwrap();
        objects
            .clusters
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn insert_access_request(&self, mut request: AccessRequest) -> AccessRequest {
        let mut objects = self.objects.lock().unwrap();
        fill_metadata(&mut request, objects.next_version());
        objects.requests.insert(key(&request), request.clone());
        request
    }

    pub fn access_request(&self, namespace: &str, name: &str) -> Option<AccessRequest> {
        let objects = self.objects.lock().unwrap();
        objects
            .requests
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        let objects = self.objects.lock().unwrap();
        objects
            .secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn secret_count(&self) -> usize {
        self.objects.lock().unwrap().secrets.len()
    }

    /// Number of metadata/spec updates written so far.
    pub fn updates(&self) -> usize {
        self.objects.lock().unwrap().updates
    }

    /// Number of status writes so far.
    pub fn status_writes(&self) -> usize {
        self.objects.lock().unwrap().status_writes
    }
}

fn fill_metadata<K: ResourceExt>(object: &mut K, version: Option<String>) {
    let meta = object.meta_mut();
    meta.namespace.get_or_insert_with(|| NAMESPACE.to_owned());
    meta.uid
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
    meta.generation.get_or_insert(1);
    meta.resource_version = version;
}

/// Replaces the stored copy of `object` the way the API server does
/// for a PUT on the main resource. An object marked for deletion is
/// dropped once the update leaves it without finalizers.
fn update<K: ResourceExt + Clone>(
    stored: &mut BTreeMap<Key, K>,
    version: Option<String>,
    object: &K,
    keep_status: impl FnOnce(&mut K, &K),
) -> Result<K, Error> {
    let key = key(object);
    let existing = stored
        .get(&key)
        .ok_or_else(|| Error::NotFound(format!("{}/{}", key.0, key.1)))?;
    if existing.resource_version() != object.resource_version() {
        return Err(Error::Conflict(format!("{}/{}", key.0, key.1)));
    }
    let mut updated = object.clone();
    keep_status(&mut updated, existing);
    updated.meta_mut().resource_version = version;
    if updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty() {
        stored.remove(&key);
    } else {
        stored.insert(key, updated.clone());
    }
    Ok(updated)
}

/// Moves `stored` from `previous` to `next`. A `previous` that does not
/// match the stored status means the caller diffed against stale state,
/// which the API server would answer with a failed patch.
fn patch_status<S: Clone + PartialEq>(
    stored: &mut Option<S>,
    previous: Option<&S>,
    next: &S,
    what: String,
) -> Result<(), Error> {
    if stored.as_ref() != previous {
        return Err(Error::Conflict(what));
    }
    *stored = Some(next.clone());
    Ok(())
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error> {
        Ok(self.cluster(namespace, name))
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, Error> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .clusters
            .values()
            .cloned()
            .collect())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<Cluster, Error> {
        let mut objects = self.objects.lock().unwrap();
        let version = objects.next_version();
        let updated = update(&mut objects.clusters, version, cluster, |updated, existing| {
            updated.status = existing.status.clone();
        })?;
        objects.updates += 1;
        Ok(updated)
    }

    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&ClusterStatus>,
        next: &ClusterStatus,
    ) -> Result<(), Error> {
        let mut objects = self.objects.lock().unwrap();
        let version = objects.next_version();
        let what = format!("{}/{}", namespace, name);
        let existing = objects
            .clusters
            .get_mut(&(namespace.to_owned(), name.to_owned()))
            .ok_or_else(|| Error::NotFound(what.clone()))?;
        patch_status(&mut existing.status, previous, next, what)?;
        existing.metadata.resource_version = version;
        objects.status_writes += 1;
        Ok(())
    }
}

#[async_trait]
impl AccessRequestStore for FakeStore {
    async fn get_access_request(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AccessRequest>, Error> {
        Ok(self.access_request(namespace, name))
    }

    async fn update_access_request(&self, request: &AccessRequest) -> Result<AccessRequest, Error> {
        let mut objects = self.objects.lock().unwrap();
        let version = objects.next_version();
        let updated = update(&mut objects.requests, version, request, |updated, existing| {
            updated.status = existing.status.clone();
        })?;
        objects.updates += 1;
        Ok(updated)
    }

    async fn patch_access_request_status(
        &self,
        namespace: &str,
        name: &str,
        previous: Option<&AccessRequestStatus>,
        next: &AccessRequestStatus,
    ) -> Result<(), Error> {
        let mut objects = self.objects.lock().unwrap();
        let version = objects.next_version();
        let what = format!("{}/{}", namespace, name);
        let existing = objects
            .requests
            .get_mut(&(namespace.to_owned(), name.to_owned()))
            .ok_or_else(|| Error::NotFound(what.clone()))?;
        patch_status(&mut existing.status, previous, next, what)?;
        existing.metadata.resource_version = version;
        objects.status_writes += 1;
        Ok(())
    }

    async fn apply_secret(&self, secret: &Secret) -> Result<UpsertOutcome, Error> {
        let mut objects = self.objects.lock().unwrap();
        let key = key(secret);
        let outcome = match objects.secrets.get(&key) {
            None => UpsertOutcome::Created,
            Some(existing) if existing.data == secret.data => return Ok(UpsertOutcome::AlreadyPresent),
            Some(_) => UpsertOutcome::Updated,
        };
        objects.secrets.insert(key, secret.clone());
        Ok(outcome)
    }
}

/// A `Cluster` with the kind profile in the test namespace.
pub fn cluster() -> Cluster {
    let mut cluster = Cluster::new(
        CLUSTER_NAME,
        ClusterSpec {
            profile: "kind".to_owned(),
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.to_owned());
    cluster
}

/// Same as [`cluster`] with the given finalizers.
pub fn cluster_with_finalizers(finalizers: &[&str]) -> Cluster {
    let mut cluster = cluster();
    cluster.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
    cluster
}

/// A `Cluster` that already carries our finalizer.
pub fn finalized_cluster() -> Cluster {
    cluster_with_finalizers(&[FINALIZER_NAME])
}

/// Marks `object` as deleted by a user.
pub fn mark_deleted<K: ResourceExt>(mut object: K) -> K {
    object.meta_mut().deletion_timestamp = Some(Time(Utc::now()));
    object
}

/// An `AccessRequest` for the test `Cluster`.
pub fn access_request() -> AccessRequest {
    let mut request = AccessRequest::new(
        REQUEST_NAME,
        AccessRequestSpec {
            cluster_ref: Some(ObjectReference {
                name: CLUSTER_NAME.to_owned(),
                namespace: None,
            }),
            permissions: vec![],
        },
    );
    request.metadata.namespace = Some(NAMESPACE.to_owned());
    request
}

pub fn requeue_store() -> Arc<RequeueStore> {
    Arc::new(RequeueStore::new(MIN_INTERVAL, MAX_INTERVAL, 2.0).unwrap())
}

pub fn network() -> MockNetworkInspector {
    let mut network = MockNetworkInspector::new();
    network
        .expect_ipv4_network()
        .returning(|| Ok(KIND_NETWORK.parse().unwrap()));
    network
}

/// Context for the `Cluster` controller over `store` and the given mocks.
pub fn cluster_context(
    store: Arc<FakeStore>,
    provisioner: MockProvisioner,
    load_balancer: MockLoadBalancer,
) -> Arc<clusters::ContextData> {
    cluster_context_with_requeue(store, provisioner, load_balancer, requeue_store())
}

/// Same as [`cluster_context`] with a caller-provided pacing store.
pub fn cluster_context_with_requeue(
    store: Arc<FakeStore>,
    provisioner: MockProvisioner,
    load_balancer: MockLoadBalancer,
    requeue: Arc<RequeueStore>,
) -> Arc<clusters::ContextData> {
    Arc::new(clusters::ContextData::new(
        store,
        Arc::new(provisioner),
        Arc::new(load_balancer),
        Arc::new(SubnetAllocator::new(Arc::new(network()))),
        requeue,
    ))
}

/// Context for the `AccessRequest` controller over `store` and `provisioner`.
pub fn access_context(
    store: Arc<FakeStore>,
    provisioner: MockProvisioner,
) -> Arc<access::ContextData> {
    Arc::new(access::ContextData::new(
        store.clone(),
        store,
        Arc::new(provisioner),
        requeue_store(),
    ))
}
