use kind_types::{conditions, find_condition, ClusterPhase, ClusterSpec, ConditionStatus};
use kube::{runtime::controller::Action, ResourceExt};
use std::{sync::Arc, time::Duration};

use super::util::*;
use crate::{
    clusters::{on_error, reconcile},
    kind::{ClusterAccess, MockProvisioner},
    metallb::{MockLoadBalancer, SubnetConfig},
    requeue::{RequeueKey, ResourceKind},
    store::UpsertOutcome,
    util::{finalizer, Error, ANNOTATION_ASSIGNED_SUBNET},
};

fn existing_cluster() -> MockProvisioner {
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_cluster_exists()
        .withf(|name| name == KIND_NAME)
        .returning(|_| Ok(true));
    provisioner
        .expect_kubeconfig()
        .withf(|name| name == KIND_NAME)
        .returning(|_| Ok(ClusterAccess::new("kubeconfig")));
    provisioner
}

fn installed_load_balancer(ready: bool) -> MockLoadBalancer {
    let mut load_balancer = MockLoadBalancer::new();
    load_balancer
        .expect_install()
        .returning(|_| Ok(vec![UpsertOutcome::AlreadyPresent]));
    load_balancer.expect_is_ready().returning(move |_| Ok(ready));
    load_balancer
}

fn configured(load_balancer: &mut MockLoadBalancer, subnet: &'static str) {
    load_balancer
        .expect_configure()
        .withf(move |_, cidr| cidr.to_string() == subnet)
        .returning(|_, _| {
            Ok(SubnetConfig {
                pool: UpsertOutcome::AlreadyPresent,
                advertisement: UpsertOutcome::AlreadyPresent,
            })
        });
}

#[tokio::test]
async fn new_cluster_only_gets_finalizer() {
    let store = Arc::new(FakeStore::new());
    let instance = store.insert_cluster(cluster());
    let context = cluster_context(store.clone(), MockProvisioner::new(), MockLoadBalancer::new());

    let action = reconcile(Arc::new(instance), context).await.unwrap();

    assert_eq!(action, Action::await_change());
    let stored = store.cluster(NAMESPACE, CLUSTER_NAME).unwrap();
    assert!(finalizer::contains(&stored));
    assert!(!stored.annotations().contains_key(ANNOTATION_ASSIGNED_SUBNET));
    assert!(stored.status.is_none());
    assert_eq!(store.status_writes(), 0);
}

#[tokio::test]
async fn missing_kind_cluster_is_created() {
    let store = Arc::new(FakeStore::new());
    let instance = store.insert_cluster(finalized_cluster());
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_cluster_exists()
        .withf(|name| name == KIND_NAME)
        .returning(|_| Ok(false));
    provisioner
        .expect_create_cluster()
        .withf(|name| name == KIND_NAME)
        .times(1)
        .returning(|_| Ok(()));
    let context = cluster_context(store.clone(), provisioner, MockLoadBalancer::new());

    let action = reconcile(Arc::new(instance), context).await.unwrap();

    assert_eq!(action, Action::requeue(MIN_INTERVAL));
    let stored = store.cluster(NAMESPACE, CLUSTER_NAME).unwrap();
    assert_eq!(
        stored.annotations().get(ANNOTATION_ASSIGNED_SUBNET).unwrap(),
        "172.18.200.0/24"
    );
    let status = stored.status.unwrap();
    assert_eq!(status.phase, ClusterPhase::Progressing);
    assert_eq!(status.observed_generation, 1);
    let kind_ready = find_condition(&status.conditions, conditions::KIND_READY).unwrap();
    assert_eq!(kind_ready.status, ConditionStatus::False);
}

#[tokio::test]
async fn failed_creation_is_retried_quickly() {
    let store = Arc::new(FakeStore::new());
    let instance = store.insert_cluster(finalized_cluster());
    let mut provisioner = MockProvisioner::new();
    provisioner.expect_cluster_exists().returning(|_| Ok(false));
    provisioner.expect_create_cluster().returning(|_| {
        Err(Error::CommandFailed {
            command: "kind create cluster".to_owned(),
            message: "docker is not running".to_owned(),
        })
    });
    let context = cluster_context(store.clone(), provisioner, MockLoadBalancer::new());

    let action = reconcile(Arc::new(instance), context).await.unwrap();

    assert_eq!(action, Action::requeue(MIN_INTERVAL));
    let stored = store.cluster(NAMESPACE, CLUSTER_NAME).unwrap();
    assert_eq!(stored.phase(), ClusterPhase::Progressing);
}

#[tokio::test]
async fn waits_for_load_balancer() {
    let store = Arc::new(FakeStore::new());
    let instance = store.insert_cluster(finalized_cluster());
    let mut load_balancer = installed_load_balancer(false);
    load_balancer.expect_configure().times(0);
    let context = cluster_context(store.clone(), existing_cluster(), load_balancer);

    let action = reconcile(Arc::new(instance), context).await.unwrap();

    assert_eq!(action, Action::requeue(MIN_INTERVAL));
    let status = store.cluster(NAMESPACE, CLUSTER_NAME).unwrap().status.unwrap();
    assert_eq!(status.phase, ClusterPhase::Progressing);
    let kind_ready = find_condition(&status.conditions, conditions::KIND_READY).unwrap();
    assert_eq!(kind_ready.status, ConditionStatus::True);
    let metallb_ready = find_condition(&status.conditions, conditions::METALLB_READY).unwrap();
    assert_eq!(metallb_ready.status, ConditionStatus::False);
    let ready = find_condition(&status.conditions, conditions::READY).unwrap();
    assert_eq!(ready.status, ConditionStatus::False);
}

#[tokio::test]
async fn ready_cluster_backs_off() {
    let store = Arc::new(FakeStore::new());
    let instance = Arc::new(store.insert_cluster(finalized_cluster()));
    let mut load_balancer = installed_load_balancer(true);
    configured(&mut load_balancer, "172.18.200.0/24");
    let context = cluster_context(store.clone(), existing_cluster(), load_balancer);

    let mut intervals = vec![];
    for _ in 0..4 {
        let action = reconcile(instance.clone(), context.clone()).await.unwrap();
        intervals.push(action);
    }

    assert_eq!(
        intervals,
        vec![
            Action::requeue(Duration::from_secs(1)),
            Action::requeue(Duration::from_secs(2)),
            Action::requeue(Duration::from_secs(4)),
            Action::requeue(Duration::from_secs(8)),
        ]
    );
    let status = store.cluster(NAMESPACE, CLUSTER_NAME).unwrap().status.unwrap();
    assert_eq!(status.phase, ClusterPhase::Ready);
    let ready = find_condition(&status.conditions, conditions::READY).unwrap();
    assert_eq!(ready.status, ConditionStatus::True);
    // Only the first pass changed anything.
    assert_eq!(store.status_writes(), 1);
}

#[tokio::test]
async fn assigned_subnet_is_kept() {
    let store = Arc::new(FakeStore::new());
    let mut cluster = finalized_cluster();
    cluster
        .annotations_mut()
        .insert(ANNOTATION_ASSIGNED_SUBNET.to_owned(), "172.18.210.0/24".to_owned());
    let instance = store.insert_cluster(cluster);
    let mut load_balancer = installed_load_balancer(true);
    configured(&mut load_balancer, "172.18.210.0/24");
    let context = cluster_context(store.clone(), existing_cluster(), load_balancer);

    let action = reconcile(Arc::new(instance), context).await.unwrap();

    assert_eq!(action, Action::requeue(MIN_INTERVAL));
    assert_eq!(store.updates(), 0);
}

#[tokio::test]
async fn unsupported_profile_is_permanent() {
    let store = Arc::new(FakeStore::new());
    let mut cluster = finalized_cluster();
    cluster.spec = ClusterSpec {
        profile: "gardener".to_owned(),
    };
    let instance = Arc::new(store.insert_cluster(cluster));
    let context = cluster_context(store.clone(), MockProvisioner::new(), MockLoadBalancer::new());

    let err = reconcile(instance.clone(), context.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedProfile(ref profile) if profile == "gardener"));
    assert_eq!(on_error(instance, &err, context), Action::await_change());
    assert!(store.cluster(NAMESPACE, CLUSTER_NAME).unwrap().status.is_none());
}

#[tokio::test]
async fn transient_error_resets_backoff() {
    let store = Arc::new(FakeStore::new());
    let instance = Arc::new(store.insert_cluster(finalized_cluster()));
    let mut provisioner = MockProvisioner::new();
    provisioner.expect_cluster_exists().returning(|_| {
        Err(Error::CommandFailed {
            command: "kind get clusters".to_owned(),
            message: "exit status 1".to_owned(),
        })
    });
    let requeue = requeue_store();
    let context = cluster_context_with_requeue(
        store.clone(),
        provisioner,
        MockLoadBalancer::new(),
        requeue.clone(),
    );

    let err = reconcile(instance.clone(), context.clone())
        .await
        .unwrap_err();

    assert_eq!(on_error(instance, &err, context), Action::requeue(MIN_INTERVAL));
    let key = RequeueKey::new(ResourceKind::Cluster, NAMESPACE, CLUSTER_NAME);
    assert_eq!(requeue.next_duration(&key), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn missing_resource_is_forgotten() {
    let store = Arc::new(FakeStore::new());
    let context = cluster_context(store, MockProvisioner::new(), MockLoadBalancer::new());

    let action = reconcile(Arc::new(cluster()), context).await.unwrap();

    assert_eq!(action, Action::await_change());
}
