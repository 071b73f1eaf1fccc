use std::net::IpAddr;

use egressd_neutron::{directory::NetworkDirectory, port::Port};

use crate::{
    capacity::{self, NodeEgressIpConfiguration},
    config::EgressConfig,
    error::Error,
    instance::{NodeRef, ServerId},
    locator, pairs, reservation,
};

/// Egress IP allocation against the network directory.
///
/// Wraps an authenticated directory handle and the egress configuration;
/// everything is threaded through this struct, there is no global state,
/// and no state of record is held here either: the directory is the only
/// source of truth.
///
/// Operations are idempotent-safe to retry individually, but there is no
/// cross-operation lock. Callers that interleave assign and release for
/// the same (address, node) pair must serialize those themselves.
pub struct EgressIpProvider<D> {
    directory: D,
    config: EgressConfig,
}

impl<D: NetworkDirectory> EgressIpProvider<D> {
    pub fn new(directory: D, config: EgressConfig) -> EgressIpProvider<D> {
        EgressIpProvider { directory, config }
    }

    pub fn config(&self) -> &EgressConfig {
        &self.config
    }

    /// Assigns `addr` to the instance behind `node`.
    ///
    /// Two steps that are not atomic: reserve the address on its subnet
    /// (detached tagged port), then allow it on the attached port. When the
    /// second step fails, the reservation is released again with a bounded
    /// number of attempts; the original error surfaces regardless, with the
    /// compensation outcome appended, so the caller knows whether a retry
    /// starts clean. A crash between the two steps leaves a reservation
    /// that only [`EgressIpProvider::release_private_ip`] cleans up.
    ///
    /// Returns the [`Error::AlreadyBound`] sentinel when the address is
    /// already allowed on one of the node's ports; callers treat that as
    /// success.
    #[tracing::instrument(skip_all, fields(%addr, node = %node.name))]
    pub async fn assign_private_ip(&self, addr: IpAddr, node: &NodeRef) -> Result<(), Error> {
        let server = node.server_id(&self.config.provider_prefix)?;
        let placement =
            locator::locate_subnet_and_port(&self.directory, &self.config, addr, &server, &node.name)
                .await?;

        let reserved = reservation::reserve_ip(
            &self.directory,
            &self.config,
            &placement.subnet,
            addr,
            &server,
        )
        .await?;

        match pairs::allow_ip(
            &self.directory,
            &placement.port.id,
            addr,
            &self.config.conflict_retry,
        )
        .await
        {
            Ok(()) => Ok(()),
            // A concurrent writer granted the address between locate and
            // allow; the operation is satisfied and the reservation stays.
            Err(Error::AlreadyBound(_)) => Ok(()),
            Err(e) => {
                let compensation = self.compensate_failed_grant(&reserved, &server).await;
                Err(Error::GrantFailed {
                    address: addr,
                    port: placement.port.id,
                    source: Box::new(e),
                    compensation,
                })
            }
        }
    }

    /// Bounded best-effort release of a reservation left behind by a failed
    /// grant. Returns a description of the outcome for the surfaced error;
    /// when every attempt fails, the reservation dangles until a release
    /// call sweeps it up.
    async fn compensate_failed_grant(&self, reserved: &Port, server: &ServerId) -> String {
        let mut status = String::from("no compensation attempted");
        for attempt in 0..self.config.compensation_attempts {
            match reservation::release_reservation(&self.directory, &self.config, reserved, server)
                .await
            {
                Ok(()) => return "released the reservation port".to_string(),
                Err(e) => {
                    status = format!(
                        "could not release reservation port '{}' after {} tries: {e}",
                        reserved.id,
                        attempt + 1
                    );
                }
            }
        }
        tracing::warn!(port = %reserved.id, "{status}");
        status
    }

    /// Whether moving an egress address between nodes is supported without
    /// a release/assign cycle. It is: only the allowed-address grant has to
    /// change hands.
    pub fn allows_move_private_ip(&self) -> bool {
        true
    }

    /// Moves `addr` from `from` to `to`.
    ///
    /// The address is revoked from every port of `from` where it is
    /// currently allowed; absence is tolerated, a previous attempt may
    /// already have revoked it. Reservation ports are neither moved nor
    /// recreated, they stay with the instance that created them. The
    /// AlreadyBound sentinel on the target node means the move is already
    /// complete and is swallowed.
    #[tracing::instrument(skip_all, fields(%addr, from = %from.name, to = %to.name))]
    pub async fn move_private_ip(
        &self,
        addr: IpAddr,
        from: &NodeRef,
        to: &NodeRef,
    ) -> Result<(), Error> {
        let from_server = from.server_id(&self.config.provider_prefix)?;
        let ports = locator::attached_ports(&self.directory, &self.config, &from_server).await?;
        for port in ports {
            if port.allows_address(addr) {
                pairs::revoke_ip(&self.directory, &port.id, addr, &self.config.conflict_retry)
                    .await?;
            }
        }

        let to_server = to.server_id(&self.config.provider_prefix)?;
        let placement = match locator::locate_subnet_and_port(
            &self.directory,
            &self.config,
            addr,
            &to_server,
            &to.name,
        )
        .await
        {
            Ok(placement) => placement,
            Err(Error::AlreadyBound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        match pairs::allow_ip(
            &self.directory,
            &placement.port.id,
            addr,
            &self.config.conflict_retry,
        )
        .await
        {
            Ok(()) | Err(Error::AlreadyBound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Releases `addr` from the instance behind `node`.
    ///
    /// Sweeps every attached port: revokes the grant where present, then
    /// deletes the owned reservation on every subnet of the port whose
    /// CIDR contains the address. The sweep never stops at the first hit:
    /// subnets may share a CIDR, so a reservation can exist on more than
    /// one candidate subnet at once and stopping early would leak it.
    /// Grants and reservations are cleared independently because a prior
    /// partial failure can leave either one dangling.
    ///
    /// Returns the [`Error::NotBound`] sentinel when nothing was found
    /// anywhere on the node; callers treat that as a no-op.
    #[tracing::instrument(skip_all, fields(%addr, node = %node.name))]
    pub async fn release_private_ip(&self, addr: IpAddr, node: &NodeRef) -> Result<(), Error> {
        let server = node.server_id(&self.config.provider_prefix)?;
        let ports = locator::attached_ports(&self.directory, &self.config, &server).await?;

        let mut found = false;
        for port in ports {
            if port.allows_address(addr) {
                found = true;
                pairs::revoke_ip(&self.directory, &port.id, addr, &self.config.conflict_retry)
                    .await?;
            }

            let subnets = match locator::subnets_for_network(&self.directory, &port.network_id)
                .await
            {
                Ok(subnets) => subnets,
                Err(e) => {
                    tracing::warn!(
                        network = %port.network_id,
                        "could not list subnets for network: {e}"
                    );
                    continue;
                }
            };
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
                if let Some(reserved) = reservation::find_reservation(
                    &self.directory,
                    &self.config,
                    &subnet,
                    addr,
                    &server,
                )
                .await?
                {
                    found = true;
                    reservation::release_reservation(
                        &self.directory,
                        &self.config,
                        &reserved,
                        &server,
                    )
                    .await?;
                }
            }
        }

        if !found {
            return Err(Error::NotBound(addr));
        }
        Ok(())
    }

    /// Capacity report for every attached port of the node. Only
    /// meaningful while no egress addresses have been granted on the node;
    /// the numbers are skewed otherwise.
    #[tracing::instrument(skip_all, fields(node = %node.name))]
    pub async fn node_egress_ip_configuration(
        &self,
        node: &NodeRef,
    ) -> Result<Vec<NodeEgressIpConfiguration>, Error> {
        let server = node.server_id(&self.config.provider_prefix)?;
        capacity::node_configuration(&self.directory, &self.config, &server, &node.name).await
    }
}
