use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, DynamicObject, GroupVersionKind, ListParams, PostParams},
    discovery::ApiResource,
    Client, ResourceExt,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

use super::{
    pods_ready, LoadBalancer, SubnetConfig, MANAGED_BY_LABEL, METALLB_NAMESPACE, POOL_NAME,
};
use crate::{
    kind::{ClusterAccess, Ipv4Cidr},
    store::UpsertOutcome,
    util::{Error, MANAGER_NAME},
};

const METALLB_API_VERSION: &str = "metallb.io/v1beta1";

/// MetalLB installed from its native manifest.
pub struct MetalLb {
    objects: Vec<DynamicObject>,
}

impl MetalLb {
    /// Reads the multi-document MetalLB manifest from `path`.
    pub fn from_manifest_file(path: &Path) -> Result<Self, Error> {
        let manifest = std::fs::read_to_string(path)?;
        Self::from_manifest(&manifest)
    }

    pub fn from_manifest(manifest: &str) -> Result<Self, Error> {
        let objects = parse_manifest(manifest)?;
        info!(objects = objects.len(), "loaded MetalLB manifest");
        Ok(MetalLb { objects })
    }
}

/// Splits a multi-document manifest into objects and labels each one
/// as managed by this controller. Empty documents are skipped.
pub fn parse_manifest(manifest: &str) -> Result<Vec<DynamicObject>, Error> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let mut object: DynamicObject = serde_yaml::from_value(value)?;
        if object.types.is_none() {
            return Err(Error::UserInputError(format!(
                "manifest object '{}' has no apiVersion/kind",
                object.name_any()
            )));
        }
        object
            .labels_mut()
            .insert(MANAGED_BY_LABEL.to_owned(), MANAGER_NAME.to_owned());
        objects.push(object);
    }
    Ok(objects)
}

/// Resolves the API resource of `object` from its apiVersion and kind.
fn api_resource(object: &DynamicObject) -> Result<ApiResource, Error> {
    let types = object.types.as_ref().ok_or_else(|| {
        Error::UserInputError(format!("object '{}' has no apiVersion/kind", object.name_any()))
    })?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Ok(ApiResource::from_gvk(&GroupVersionKind::gvk(
        group,
        version,
        &types.kind,
    )))
}

fn dynamic_api(client: Client, object: &DynamicObject) -> Result<Api<DynamicObject>, Error> {
    let resource = api_resource(object)?;
    Ok(match object.namespace() {
        Some(namespace) => Api::namespaced_with(client, &namespace, &resource),
        None => Api::all_with(client, &resource),
    })
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(MANAGER_NAME.to_owned()),
        ..Default::default()
    }
}

/// Creates `object` unless it already exists.
async fn create(client: Client, object: &DynamicObject) -> Result<UpsertOutcome, Error> {
    let api = dynamic_api(client, object)?;
    match api.create(&post_params(), object).await {
        Ok(_) => Ok(UpsertOutcome::Created),
        Err(e) => match Error::from_api(e, &object.name_any()) {
            Error::AlreadyExists(_) => Ok(UpsertOutcome::AlreadyPresent),
            e => Err(e),
        },
    }
}

/// Creates `object` or overwrites the spec of the existing one.
async fn upsert(client: Client, object: &DynamicObject) -> Result<UpsertOutcome, Error> {
    let api = dynamic_api(client, object)?;
    let name = object.name_any();
    match api.get_opt(&name).await? {
        None => {
            api.create(&post_params(), object)
                .await
                .map_err(|e| Error::from_api(e, &name))?;
            Ok(UpsertOutcome::Created)
        }
        Some(existing) if existing.data.get("spec") == object.data.get("spec") => {
            Ok(UpsertOutcome::AlreadyPresent)
        }
        Some(mut existing) => {
            existing.data["spec"] = object.data["spec"].clone();
            api.replace(&name, &post_params(), &existing)
                .await
                .map_err(|e| Error::from_api(e, &name))?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

fn metallb_object(kind: &str, spec: serde_json::Value) -> Result<DynamicObject, Error> {
    Ok(serde_json::from_value(json!({
        "apiVersion": METALLB_API_VERSION,
        "kind": kind,
        "metadata": {
            "name": POOL_NAME,
            "namespace": METALLB_NAMESPACE,
            "labels": { MANAGED_BY_LABEL: MANAGER_NAME },
        },
        "spec": spec,
    }))?)
}

/// Address pool handing out every address of `subnet`.
pub fn address_pool(subnet: Ipv4Cidr) -> Result<DynamicObject, Error> {
    metallb_object(
        "IPAddressPool",
        json!({
            "addresses": [subnet.to_string()],
            "avoidBuggyIPs": true,
        }),
    )
}

/// L2 advertisement of every address pool.
pub fn l2_advertisement() -> Result<DynamicObject, Error> {
    metallb_object("L2Advertisement", json!({}))
}

#[async_trait]
impl LoadBalancer for MetalLb {
    async fn install(&self, access: &ClusterAccess) -> Result<Vec<UpsertOutcome>, Error> {
        let client = access.client().await?;
        let mut outcomes = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let outcome = create(client.clone(), object).await?;
            debug!(object = %object.name_any(), outcome = outcome.as_str(), "installed");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn is_ready(&self, access: &ClusterAccess) -> Result<bool, Error> {
        let client = access.client().await?;
        let api: Api<Pod> = Api::namespaced(client, METALLB_NAMESPACE);
        let pods = api.list(&ListParams::default().labels("app=metallb")).await?;
        Ok(pods_ready(&pods.items))
    }

    async fn configure(
        &self,
        access: &ClusterAccess,
        subnet: Ipv4Cidr,
    ) -> Result<SubnetConfig, Error> {
        let client = access.client().await?;
        let pool = upsert(client.clone(), &address_pool(subnet)?).await?;
        let advertisement = upsert(client, &l2_advertisement()?).await?;
        Ok(SubnetConfig {
            pool,
            advertisement,
        })
    }
}
