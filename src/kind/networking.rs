use async_trait::async_trait;
use serde::Deserialize;
use std::{fmt, net::Ipv4Addr, str::FromStr};

use super::{run, NetworkInspector};
use crate::util::Error;

/// Name of the docker network kind attaches its nodes to.
pub const DEFAULT_NETWORK: &str = "kind";

/// An IPv4 network in CIDR notation. Parsing masks off host bits, so
/// `172.18.5.7/16` and `172.18.0.0/16` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, Error> {
        if prefix > 32 {
            return Err(Error::InvalidCidr(format!("{}/{}", addr, prefix)));
        }
        let mask = match prefix {
            0 => 0,
            p => u32::MAX << (32 - p),
        };
        Ok(Ipv4Cidr {
            addr: Ipv4Addr::from(u32::from(addr) & mask),
            prefix,
        })
    }

    /// Network address.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for Ipv4Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCidr(s.to_owned());
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr = addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        Ipv4Cidr::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Inspects a docker network through the `docker` CLI.
pub struct DockerNetwork {
    name: String,
}

impl DockerNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        DockerNetwork { name: name.into() }
    }
}

#[async_trait]
impl NetworkInspector for DockerNetwork {
    async fn ipv4_network(&self) -> Result<Ipv4Cidr, Error> {
        let output = run("docker", &["network", "inspect", &self.name]).await?;
        parse_docker_network(&output)
    }
}

#[derive(Deserialize)]
struct Network {
    #[serde(rename = "IPAM")]
    ipam: Ipam,
}

#[derive(Deserialize)]
struct Ipam {
    #[serde(rename = "Config", default)]
    config: Option<Vec<IpamConfig>>,
}

#[derive(Deserialize)]
struct IpamConfig {
    #[serde(rename = "Subnet", default)]
    subnet: String,
}

/// Picks the first IPv4 subnet out of `docker network inspect` output.
pub fn parse_docker_network(output: &str) -> Result<Ipv4Cidr, Error> {
    let networks: Vec<Network> = serde_json::from_str(output)?;
    let network = networks.into_iter().next().ok_or(Error::Ipv4NetworkNotFound)?;
    network
        .ipam
        .config
        .unwrap_or_default()
        .iter()
        .map(|cfg| cfg.subnet.as_str())
        .find(|subnet| !subnet.is_empty() && !subnet.contains(':'))
        .ok_or(Error::Ipv4NetworkNotFound)?
        .parse()
}
