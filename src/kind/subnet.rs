use kind_types::Cluster;
use kube::ResourceExt;
use std::{collections::HashSet, net::Ipv4Addr, ops::RangeInclusive, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{Ipv4Cidr, NetworkInspector};
use crate::{
    store::{persist_cluster, ClusterStore},
    util::{Error, ANNOTATION_ASSIGNED_SUBNET},
};

/// Third-octet offsets handed out to load balancer address pools.
pub const SUBNET_OFFSETS: RangeInclusive<u8> = 200..=255;

/// Hands each [`Cluster`] a distinct /24 out of the kind network.
///
/// Allocation lists every `Cluster` and picks the smallest offset nobody
/// holds. The list, the pick and the write of the winning annotation run
/// under one lock, so two resources reconciled at the same time in this
/// process can never both win the same subnet.
pub struct SubnetAllocator {
    network: Arc<dyn NetworkInspector>,
    offsets: RangeInclusive<u8>,
    lock: Mutex<()>,
}

impl SubnetAllocator {
    pub fn new(network: Arc<dyn NetworkInspector>) -> Self {
        SubnetAllocator {
            network,
            offsets: SUBNET_OFFSETS,
            lock: Mutex::new(()),
        }
    }

    /// Ensures `cluster` carries a subnet annotation, allocating and
    /// persisting one if it has none. An existing annotation is never
    /// replaced.
    pub async fn assign(
        &self,
        store: &dyn ClusterStore,
        cluster: &mut Cluster,
    ) -> Result<Ipv4Cidr, Error> {
        if let Some(subnet) = assigned_subnet(cluster)? {
            return Ok(subnet);
        }
        let _guard = self.lock.lock().await;
        let subnet = self.next_free(store).await?;
        cluster
            .annotations_mut()
            .insert(ANNOTATION_ASSIGNED_SUBNET.to_owned(), subnet.to_string());
        persist_cluster(store, cluster).await?;
        info!(%subnet, "assigned subnet");
        Ok(subnet)
    }

    async fn next_free(&self, store: &dyn ClusterStore) -> Result<Ipv4Cidr, Error> {
        let parent = self.network.ipv4_network().await?;
        let clusters = store.list_clusters().await?;
        let taken: HashSet<Ipv4Addr> = clusters
            .iter()
            .filter_map(|c| match assigned_subnet(c) {
                Ok(subnet) => subnet.map(|s| s.addr()),
                Err(e) => {
                    warn!(
                        cluster = %c.name_any(),
                        namespace = %c.namespace().unwrap_or_default(),
                        "ignoring subnet annotation: {}",
                        e
                    );
                    None
                }
            })
            .collect();
        for offset in self.offsets.clone() {
            let candidate = calculate_subnet(parent, offset)?;
            if !taken.contains(&candidate.addr()) {
                return Ok(candidate);
            }
        }
        Err(Error::NoSubnetsAvailable)
    }
}

/// Returns the /24 of `parent` whose third octet is `offset`. Only /8
/// and /16 parents can be carved this way.
pub fn calculate_subnet(parent: Ipv4Cidr, offset: u8) -> Result<Ipv4Cidr, Error> {
    if parent.prefix() != 8 && parent.prefix() != 16 {
        return Err(Error::UnsupportedNetwork(parent.to_string()));
    }
    let mut octets = parent.addr().octets();
    octets[2] = offset;
    octets[3] = 0;
    Ipv4Cidr::new(Ipv4Addr::from(octets), 24)
}

/// Reads the subnet annotation of `cluster`, if it has one.
pub fn assigned_subnet(cluster: &Cluster) -> Result<Option<Ipv4Cidr>, Error> {
    cluster
        .annotations()
        .get(ANNOTATION_ASSIGNED_SUBNET)
        .map(|s| s.parse())
        .transpose()
}
