use kind_types::*;
use kube::CustomResourceExt;
use std::fs;

fn main() {
    println!("cargo:rerun-if-changed=types/src");
    let _ = fs::create_dir("crds");
    fs::write(
        "crds/clusters.openmcp.cloud_clusters.yaml",
        serde_yaml::to_string(&Cluster::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "crds/clusters.openmcp.cloud_accessrequests.yaml",
        serde_yaml::to_string(&AccessRequest::crd()).unwrap(),
    )
    .unwrap();
}
