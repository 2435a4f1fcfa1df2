use kind_types::{conditions, set_condition, Cluster, ClusterPhase, Condition, ConditionStatus};
use kube::ResourceExt;

use crate::util::{messages, ANNOTATION_NAME};

/// Name of the kind cluster backing `cluster`. The name annotation wins,
/// otherwise the name is derived from namespace and name so it can be
/// found again after a restart.
pub fn kind_name(cluster: &Cluster) -> String {
    if let Some(name) = cluster.annotations().get(ANNOTATION_NAME) {
        return name.clone();
    }
    format!(
        "{}.{}",
        cluster.namespace().unwrap_or_default(),
        cluster.name_any()
    )
}

fn set_phase(cluster: &mut Cluster, phase: ClusterPhase, message: &str) {
    let status = cluster.status_mut();
    status.phase = phase;
    status.message = Some(message.to_owned());
}

fn set(cluster: &mut Cluster, type_: &str, status: ConditionStatus, reason: &str) {
    set_condition(
        &mut cluster.status_mut().conditions,
        Condition::new(type_, status, reason),
    );
}

/// Work on the cluster has started for the current generation.
pub fn progressing(cluster: &mut Cluster) {
    let generation = cluster.metadata.generation.unwrap_or_default();
    set_phase(cluster, ClusterPhase::Progressing, messages::PROGRESSING);
    cluster.status_mut().observed_generation = generation;
}

/// Creation of the kind cluster was requested.
pub fn creating(cluster: &mut Cluster) {
    set_phase(cluster, ClusterPhase::Progressing, messages::CREATING);
    set(cluster, conditions::KIND_READY, ConditionStatus::False, "ClusterNotFound");
    set(cluster, conditions::READY, ConditionStatus::False, "ClusterNotReady");
}

pub fn cluster_exists(cluster: &mut Cluster) {
    set(cluster, conditions::KIND_READY, ConditionStatus::True, "ClusterExists");
}

/// MetalLB is installed but some of its pods are not ready.
pub fn awaiting_load_balancer(cluster: &mut Cluster) {
    set_phase(cluster, ClusterPhase::Progressing, messages::AWAITING_LOAD_BALANCER);
    set(cluster, conditions::METALLB_READY, ConditionStatus::False, "PodsNotReady");
    set(cluster, conditions::READY, ConditionStatus::False, "MetalLBNotReady");
}

pub fn load_balancer_ready(cluster: &mut Cluster) {
    set(cluster, conditions::METALLB_READY, ConditionStatus::True, "AllPodsReady");
}

pub fn ready(cluster: &mut Cluster) {
    set_phase(cluster, ClusterPhase::Ready, messages::READY);
    set(cluster, conditions::READY, ConditionStatus::True, "ClusterAndMetalLBReady");
}

pub fn terminating(cluster: &mut Cluster) {
    set_phase(cluster, ClusterPhase::Terminating, messages::TERMINATING);
}

/// Deletion waits for finalizers owned by other controllers.
pub fn blocked_by_finalizers(cluster: &mut Cluster) {
    set_phase(cluster, ClusterPhase::Terminating, messages::FOREIGN_FINALIZERS);
}
