use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use egressd_neutron::port::Port;

use crate::error::Error;

/// Longest string the directory accepts for port names and device IDs.
pub const DIRECTORY_NAME_MAX: usize = 254;

/// Externally-defined node handle. The provider ID carries the server UUID
/// behind a fixed prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRef {
    pub name: String,
    pub provider_id: String,
}

impl NodeRef {
    pub fn new(name: &str, provider_id: &str) -> NodeRef {
        NodeRef {
            name: name.to_string(),
            provider_id: provider_id.to_string(),
        }
    }

    pub fn server_id(&self, prefix: &str) -> Result<ServerId, Error> {
        if self.provider_id.is_empty() {
            return Err(Error::MissingProviderId(self.name.clone()));
        }
        ServerId::from_provider_id(&self.provider_id, prefix)
    }
}

/// A compute instance identity, always a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerId(String);

impl ServerId {
    /// Strips `prefix` from a provider ID and validates the remainder as a
    /// UUID. No side effects.
    pub fn from_provider_id(provider_id: &str, prefix: &str) -> Result<ServerId, Error> {
        let raw = provider_id.strip_prefix(prefix).unwrap_or(provider_id);
        if Uuid::parse_str(raw).is_err() {
            return Err(Error::InvalidProviderId(provider_id.to_string()));
        }
        Ok(ServerId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ownership marker for reservation ports. The device owner is the egress
/// tag and the device ID is derived from tag and server; both must match
/// before a reservation may be deleted. Every ownership comparison goes
/// through [`OwnershipToken::matches`], never ad-hoc string checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipToken {
    device_owner: String,
    device_id: String,
}

impl OwnershipToken {
    /// Fails when the server ID would push the derived device ID past the
    /// directory's name-length limit.
    pub fn for_server(tag: &str, server: &ServerId) -> Result<OwnershipToken, Error> {
        if server.as_str().is_empty()
            || tag.len() >= DIRECTORY_NAME_MAX
            || server.as_str().len() > DIRECTORY_NAME_MAX - tag.len()
        {
            return Err(Error::InvalidServerId {
                server: server.to_string(),
                tag: tag.to_string(),
            });
        }
        Ok(OwnershipToken {
            device_owner: tag.to_string(),
            device_id: format!("{}_{}", tag, server),
        })
    }

    pub fn device_owner(&self) -> &str {
        &self.device_owner
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn matches(&self, port: &Port) -> bool {
        port.device_owner == self.device_owner && port.device_id == self.device_id
    }
}
