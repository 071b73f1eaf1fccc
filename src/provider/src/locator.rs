use std::net::IpAddr;

use uuid::Uuid;

use egressd_neutron::{
    directory::NetworkDirectory,
    port::{Port, PortFilter},
    subnet::Subnet,
};

use crate::{config::EgressConfig, error::Error, instance::ServerId};

/// The attached port and subnet that should host an address.
#[derive(Debug, Clone)]
pub struct Placement {
    pub subnet: Subnet,
    pub port: Port,
}

/// All ports attached to the given compute instance, in listing order.
#[tracing::instrument(skip_all, fields(server = %server))]
pub async fn attached_ports<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    server: &ServerId,
) -> Result<Vec<Port>, Error> {
    let filter = PortFilter::device(&cfg.compute_device_owner, server.as_str());
    Ok(dir.list_all_ports(&filter).await?)
}

/// All subnets on the given network. The network ID is validated before
/// the directory is queried.
pub async fn subnets_for_network<D: NetworkDirectory>(
    dir: &D,
    network_id: &str,
) -> Result<Vec<Subnet>, Error> {
    if Uuid::parse_str(network_id).is_err() {
        return Err(Error::InvalidNetworkId(network_id.to_string()));
    }
    Ok(dir.list_all_subnets(network_id).await?)
}

/// Finds the attached port and the subnet that can host `addr` on the
/// given instance.
///
/// Ports are scanned in listing order. When more than one port could host
/// the address, whichever the directory lists first wins; no ordering
/// guarantee is given in that case. Returns the [`Error::AlreadyBound`]
/// sentinel as soon as the address shows up in any port's allowed address
/// pairs. Two subnets on the same port both containing the address is a
/// broken configuration and fails rather than picking one.
#[tracing::instrument(skip_all, fields(%addr, server = %server))]
pub async fn locate_subnet_and_port<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    addr: IpAddr,
    server: &ServerId,
    node: &str,
) -> Result<Placement, Error> {
    let ports = attached_ports(dir, cfg, server).await?;
    for port in ports {
        if port.allows_address(addr) {
            return Err(Error::AlreadyBound(addr));
        }

        // A network we cannot read must not wedge the scan of the
        // remaining ports.
        let subnets = match subnets_for_network(dir, &port.network_id).await {
            Ok(subnets) => subnets,
            Err(e) => {
                tracing::warn!(
                    network = %port.network_id,
                    "could not list subnets for network: {e}"
                );
                continue;
            }
        };

        let mut matching: Option<Subnet> = None;
        for subnet in subnets {
            let net = match subnet.parse_cidr() {
                Ok(net) => net,
                Err(e) => {
                    tracing::warn!(
                        subnet = %subnet.id,
                        cidr = %subnet.cidr,
                        "could not parse subnet CIDR: {e}"
                    );
                    continue;
                }
            };
            if !net.contains(&addr) {
                continue;
            }
            if let Some(first) = matching {
                return Err(Error::AmbiguousSubnets {
                    address: addr,
                    node: node.to_string(),
                    port: port.id,
                    first: first.id,
                    second: subnet.id,
                });
            }
            matching = Some(subnet);
        }

        if let Some(subnet) = matching {
            return Ok(Placement { subnet, port });
        }
    }
    Err(Error::NoMatchingSubnet {
        address: addr,
        node: node.to_string(),
    })
}
