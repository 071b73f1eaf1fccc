use std::net::IpAddr;

use egressd_neutron::{
    directory::NetworkDirectory,
    port::{AddressPair, PortUpdate},
};

use crate::{
    error::Error,
    retry::{retry_on_conflict, RetryPolicy},
};

/// Adds `addr` to the port's allowed address pairs.
///
/// Every attempt re-reads the port, checks for the address (parsed
/// comparison) and submits a conditional update carrying the observed
/// revision. A stale revision means a concurrent writer won; the attempt is
/// repeated against fresh state until the retry budget runs out. Returns
/// the [`Error::AlreadyBound`] sentinel when the address is already
/// present. The MAC is left unset; the directory fills in the port's own.
#[tracing::instrument(skip_all, fields(port = port_id, %addr))]
pub async fn allow_ip<D: NetworkDirectory>(
    dir: &D,
    port_id: &str,
    addr: IpAddr,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    let result = retry_on_conflict(policy, Error::is_conflict, || {
        let dir = dir;
        let port_id = port_id;
        async move {
            let port = dir.get_port(port_id).await?;
            if port.allows_address(addr) {
                return Err(Error::AlreadyBound(addr));
            }
            let mut pairs = port.allowed_address_pairs.clone();
            pairs.push(AddressPair::new(addr));
            dir.update_port(
                port_id,
                &PortUpdate {
                    allowed_address_pairs: pairs,
                    revision_number: port.revision_number,
                },
            )
            .await?;
            Ok(())
        }
    })
    .await;
    surface_conflict(result, port_id, policy)
}

/// Removes `addr` from the port's allowed address pairs, under the same
/// conditional-update loop as [`allow_ip`].
///
/// Exactly the entries whose parsed address equals `addr` are dropped;
/// everything else survives, including entries that do not parse and
/// duplicates of other addresses. Fails with [`Error::NotAllowed`] when the
/// address is not present.
#[tracing::instrument(skip_all, fields(port = port_id, %addr))]
pub async fn revoke_ip<D: NetworkDirectory>(
    dir: &D,
    port_id: &str,
    addr: IpAddr,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    let result = retry_on_conflict(policy, Error::is_conflict, || {
        let dir = dir;
        let port_id = port_id;
        async move {
            let port = dir.get_port(port_id).await?;
            if !port.allows_address(addr) {
                return Err(Error::NotAllowed {
                    address: addr,
                    port: port_id.to_string(),
                });
            }
            let pairs: Vec<AddressPair> = port
                .allowed_address_pairs
                .iter()
                .filter(|pair| pair.parsed_address() != Some(addr))
                .cloned()
                .collect();
            dir.update_port(
                port_id,
                &PortUpdate {
                    allowed_address_pairs: pairs,
                    revision_number: port.revision_number,
                },
            )
            .await?;
            Ok(())
        }
    })
    .await;
    surface_conflict(result, port_id, policy)
}

/// A conflict that survived the whole retry budget surfaces as
/// [`Error::ConflictRetriesExhausted`]; the requested change was not
/// applied and the caller must decide whether to try again.
fn surface_conflict(
    result: Result<(), Error>,
    port_id: &str,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    match result {
        Err(Error::Directory(e)) if e.is_revision_mismatch() => {
            Err(Error::ConflictRetriesExhausted {
                port: port_id.to_string(),
                attempts: policy.attempts,
                source: e,
            })
        }
        other => other,
    }
}
