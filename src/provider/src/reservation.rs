use std::net::IpAddr;

use egressd_neutron::{
    directory::NetworkDirectory,
    port::{FixedIp, Port, PortCreate, PortFilter},
    subnet::Subnet,
};

use crate::{
    config::EgressConfig,
    error::Error,
    instance::{OwnershipToken, ServerId},
};

/// Reserves `addr` on the subnet by creating a detached port whose single
/// fixed IP is the address. The directory refuses a second port with the
/// same fixed IP on one subnet; that uniqueness constraint is the actual
/// allocation lock, no extra locking happens here.
#[tracing::instrument(skip_all, fields(subnet = %subnet.id, %addr))]
pub async fn reserve_ip<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    subnet: &Subnet,
    addr: IpAddr,
    server: &ServerId,
) -> Result<Port, Error> {
    let token = OwnershipToken::for_server(&cfg.egress_tag, server)?;
    let create = PortCreate {
        network_id: subnet.network_id.clone(),
        name: format!("egressip-{addr}"),
        device_owner: token.device_owner().to_string(),
        device_id: token.device_id().to_string(),
        fixed_ips: vec![FixedIp {
            subnet_id: subnet.id.clone(),
            ip_address: addr,
        }],
    };
    let port = dir.create_port(&create).await?;
    tracing::info!(port = %port.id, "reserved address");
    Ok(port)
}

/// Deletes a reservation port. Refuses with [`Error::OwnershipMismatch`]
/// when the port's tags do not match the expected token for `server`; a
/// resource belonging to another owner is never deleted.
#[tracing::instrument(skip_all, fields(port = %port.id))]
pub async fn release_reservation<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    port: &Port,
    server: &ServerId,
) -> Result<(), Error> {
    let token = OwnershipToken::for_server(&cfg.egress_tag, server)?;
    if !token.matches(port) {
        return Err(Error::OwnershipMismatch {
            port: port.id.clone(),
            server: server.to_string(),
            owner: port.device_owner.clone(),
            device: port.device_id.clone(),
        });
    }
    dir.delete_port(&port.id).await?;
    tracing::info!("released reservation");
    Ok(())
}

/// Looks up the reservation port holding `(subnet, addr)` for `server`.
/// `Ok(None)` when no such port exists. More than one match is an
/// integrity error: the directory's fixed-IP uniqueness should make it
/// impossible.
pub async fn find_reservation<D: NetworkDirectory>(
    dir: &D,
    cfg: &EgressConfig,
    subnet: &Subnet,
    addr: IpAddr,
    server: &ServerId,
) -> Result<Option<Port>, Error> {
    let token = OwnershipToken::for_server(&cfg.egress_tag, server)?;
    let ports = dir
        .list_all_ports(&PortFilter::network(&subnet.network_id))
        .await?;
    let mut matches: Vec<Port> = ports
        .into_iter()
        .filter(|p| token.matches(p) && p.has_fixed_ip(&subnet.id, addr))
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        count => Err(Error::DuplicateReservations {
            address: addr,
            subnet: subnet.id.clone(),
            count,
        }),
    }
}
