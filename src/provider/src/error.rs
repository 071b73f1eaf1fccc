use std::net::IpAddr;

use thiserror::Error;

use egressd_neutron::error::DirectoryError;

use crate::capacity::AddressFamily;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse a valid server ID from provider ID '{0}'")]
    InvalidProviderId(String),

    #[error("node '{0}' carries no provider ID")]
    MissingProviderId(String),

    #[error("server ID '{server}' leaves no room for the '{tag}' ownership tag")]
    InvalidServerId { server: String, tag: String },

    #[error("network ID '{0}' is not a valid UUID")]
    InvalidNetworkId(String),

    /// The address is already granted on the node. Part of normal control
    /// flow; callers treat it as success.
    #[error("IP address {0} is already assigned")]
    AlreadyBound(IpAddr),

    /// The address is granted nowhere on the node. Part of normal control
    /// flow for release; callers treat it as a no-op.
    #[error("IP address {0} is not assigned")]
    NotBound(IpAddr),

    #[error("requested IP address {address} for node '{node}' and port '{port}' matches 2 different subnets, '{first}' and '{second}'")]
    AmbiguousSubnets {
        address: IpAddr,
        node: String,
        port: String,
        first: String,
        second: String,
    },

    #[error("found multiple {family} subnets attached to port '{port}'")]
    MultipleFamilySubnets { family: AddressFamily, port: String },

    #[error("{family} CIDR '{cidr}' is attached more than once to node '{node}'")]
    DuplicateCidr {
        family: AddressFamily,
        cidr: String,
        node: String,
    },

    #[error("could not parse subnet CIDR '{cidr}' on network '{network}'")]
    InvalidCidr { cidr: String, network: String },

    #[error("could not assign IP address {address} to node '{node}'")]
    NoMatchingSubnet { address: IpAddr, node: String },

    #[error("IP address {address} is not allowed on port '{port}', cannot revoke it")]
    NotAllowed { address: IpAddr, port: String },

    #[error("expected a single reservation for IP address {address} on subnet '{subnet}', found {count}")]
    DuplicateReservations {
        address: IpAddr,
        subnet: String,
        count: usize,
    },

    #[error("cannot delete port '{port}' for server '{server}', it belongs to another device owner ({owner}) and/or device ({device})")]
    OwnershipMismatch {
        port: String,
        server: String,
        owner: String,
        device: String,
    },

    #[error("update of port '{port}' kept conflicting with concurrent writers after {attempts} attempts")]
    ConflictRetriesExhausted {
        port: String,
        attempts: u32,
        #[source]
        source: DirectoryError,
    },

    #[error("could not allow IP address {address} on port '{port}': {source}. {compensation}")]
    GrantFailed {
        address: IpAddr,
        port: String,
        #[source]
        source: Box<Error>,
        compensation: String,
    },

    #[error("network directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl Error {
    /// True for an update that lost an optimistic-concurrency race and is
    /// worth retrying against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Directory(e) if e.is_revision_mismatch())
    }
}
