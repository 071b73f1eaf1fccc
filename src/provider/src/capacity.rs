use std::{collections::HashSet, fmt, net::IpAddr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use egressd_neutron::{directory::NetworkDirectory, port::Port};

use crate::{config::EgressConfig, error::Error, instance::ServerId, locator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn bits(&self) -> u32 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Subnet prefix currently bound to a port, per address family. `None`
/// when the port has no subnet of that family.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IfAddr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
}

/// Remaining assignable addresses, per address family. `None` when the
/// port has no subnet of that family.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capacity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<i64>,
}

/// Egress address capacity for one attached port. Derived on demand, never
/// stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEgressIpConfiguration {
    pub interface: String,
    pub ifaddr: IfAddr,
    pub capacity: Capacity,
}

/// `min(ceiling, 2^(bits - prefix) - 2)`. A /31 yields 0 and a /32 yields
/// -1; the report is advisory and schedulers treat anything non-positive
/// as full.
fn family_capacity(ceiling: i64, family: AddressFamily, prefix: u8) -> i64 {
    let host_bits = family.bits().saturating_sub(prefix as u32);
    if host_bits >= 63 {
        return ceiling;
    }
    ceiling.min((1i64 << host_bits) - 2)
}

/// Distinct addresses consumed on the port per family: the union of fixed
/// IPs and allowed-pair addresses, deduplicated on parsed values. Pair
/// entries that do not parse count toward neither family.
fn addresses_in_use(port: &Port) -> (usize, usize) {
    let mut v4: HashSet<IpAddr> = HashSet::new();
    let mut v6: HashSet<IpAddr> = HashSet::new();
    let fixed = port.fixed_ips.iter().map(|fip| fip.ip_address);
    let paired = port
        .allowed_address_pairs
        .iter()
        .filter_map(|pair| pair.parsed_address());
    for addr in fixed.chain(paired) {
        match addr {
            IpAddr::V4(_) => v4.insert(addr),
            IpAddr::V6(_) => v6.insert(addr),
        };
    }
    (v4.len(), v6.len())
}

/// Renders the capacity report for a single attached port. More than one
/// subnet of the same family on a port cannot be accounted for and fails.
#[tracing::instrument(skip_all, fields(port = %port.id))]
pub async fn port_configuration<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    port: &Port,
) -> Result<NodeEgressIpConfiguration, Error> {
    let subnets = locator::subnets_for_network(dir, &port.network_id).await?;

    let mut ifaddr = IfAddr::default();
    let mut capacity = Capacity::default();
    for subnet in &subnets {
        let net = subnet.parse_cidr().map_err(|_| Error::InvalidCidr {
            cidr: subnet.cidr.clone(),
            network: port.network_id.clone(),
        })?;
        match net {
            IpNet::V4(v4) => {
                if ifaddr.ipv4.is_some() {
                    return Err(Error::MultipleFamilySubnets {
                        family: AddressFamily::Ipv4,
                        port: port.id.clone(),
                    });
                }
                ifaddr.ipv4 = Some(v4.trunc().to_string());
                capacity.ipv4 = Some(family_capacity(
                    cfg.max_capacity_per_port,
                    AddressFamily::Ipv4,
                    v4.prefix_len(),
                ));
            }
            IpNet::V6(v6) => {
                if ifaddr.ipv6.is_some() {
                    return Err(Error::MultipleFamilySubnets {
                        family: AddressFamily::Ipv6,
                        port: port.id.clone(),
                    });
                }
                ifaddr.ipv6 = Some(v6.trunc().to_string());
                capacity.ipv6 = Some(family_capacity(
                    cfg.max_capacity_per_port,
                    AddressFamily::Ipv6,
                    v6.prefix_len(),
                ));
            }
        }
    }

    let (used_v4, used_v6) = addresses_in_use(port);
    if let Some(cap) = capacity.ipv4.as_mut() {
        *cap -= used_v4 as i64;
    }
    if let Some(cap) = capacity.ipv6.as_mut() {
        *cap -= used_v6 as i64;
    }

    Ok(NodeEgressIpConfiguration {
        interface: port.id.clone(),
        ifaddr,
        capacity,
    })
}

/// One capacity report per attached port. The same CIDR bound to two
/// different ports of a node leaves no way to tell where an egress IP
/// should land, so that is rejected. Only meaningful while no egress
/// addresses are granted on the node; the numbers are skewed otherwise.
#[tracing::instrument(skip_all, fields(server = %server, node = node))]
pub async fn node_configuration<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    server: &ServerId,
    node: &str,
) -> Result<Vec<NodeEgressIpConfiguration>, Error> {
    let ports = locator::attached_ports(dir, cfg, server).await?;

    let mut seen = HashSet::new();
    let mut configurations = Vec::with_capacity(ports.len());
    for port in &ports {
        let config = port_configuration(dir, cfg, port).await?;
        if let Some(cidr) = &config.ifaddr.ipv4 {
            if !seen.insert(cidr.clone()) {
                return Err(Error::DuplicateCidr {
                    family: AddressFamily::Ipv4,
                    cidr: cidr.clone(),
                    node: node.to_string(),
                });
            }
        }
        if let Some(cidr) = &config.ifaddr.ipv6 {
            if !seen.insert(cidr.clone()) {
                return Err(Error::DuplicateCidr {
                    family: AddressFamily::Ipv6,
                    cidr: cidr.clone(),
                    node: node.to_string(),
                });
            }
        }
        configurations.push(config);
    }
    Ok(configurations)
}
