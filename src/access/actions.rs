use k8s_openapi::{api::core::v1::Secret, ByteString};
use kind_types::{AccessRequest, AccessRequestPhase, SecretReference};
use kube::{api::ObjectMeta, Resource, ResourceExt};
use std::collections::BTreeMap;

use crate::{kind::ClusterAccess, util::messages};

/// Key of the kubeconfig inside the issued secret.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Name of the secret issued for `request`.
pub fn secret_name(request: &AccessRequest) -> String {
    format!("{}.kubeconfig", request.name_any())
}

/// Secret holding the kubeconfig for `request`, owned by the request
/// so it is garbage collected along with it.
pub fn kubeconfig_secret(request: &AccessRequest, access: &ClusterAccess) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(secret_name(request)),
            namespace: request.namespace(),
            owner_references: request.controller_owner_ref(&()).map(|owner| vec![owner]),
            ..Default::default()
        },
        type_: Some("Opaque".to_owned()),
        data: Some(BTreeMap::from([(
            KUBECONFIG_KEY.to_owned(),
            ByteString(access.kubeconfig.clone().into_bytes()),
        )])),
        ..Default::default()
    }
}

fn set_phase(request: &mut AccessRequest, phase: AccessRequestPhase, message: &str) {
    let status = request.status_mut();
    status.phase = phase;
    status.message = Some(message.to_owned());
}

/// The request names no cluster and can never be granted as is.
pub fn denied(request: &mut AccessRequest, message: &str) {
    set_phase(request, AccessRequestPhase::Denied, message);
    request.status_mut().secret_ref = None;
}

/// The referenced cluster is not usable yet. Any kubeconfig issued
/// earlier is no longer advertised.
pub fn cluster_not_ready(request: &mut AccessRequest) {
    set_phase(request, AccessRequestPhase::Pending, messages::CLUSTER_NOT_READY);
    request.status_mut().secret_ref = None;
}

pub fn granted(request: &mut AccessRequest, secret: &Secret) {
    set_phase(request, AccessRequestPhase::Granted, messages::GRANTED);
    request.status_mut().secret_ref = Some(SecretReference {
        name: secret.name_any(),
        namespace: secret.namespace().unwrap_or_default(),
        key: KUBECONFIG_KEY.to_owned(),
    });
}
