use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A network attachment point.
///
/// Attached ports carry the compute device owner tag and the instance ID as
/// their device ID. Reservation ports are detached and carry the egress
/// ownership tag instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    #[serde(default)]
    pub allowed_address_pairs: Vec<AddressPair>,
    #[serde(default)]
    pub revision_number: i64,
}

impl Port {
    /// Whether `addr` is present in the port's allowed address pairs.
    /// Pair addresses are wire strings, so comparison happens on parsed
    /// values; entries that do not parse never match.
    pub fn allows_address(&self, addr: IpAddr) -> bool {
        self.allowed_address_pairs
            .iter()
            .any(|pair| pair.parsed_address() == Some(addr))
    }

    /// Whether the port holds `addr` as a fixed IP on exactly `subnet_id`.
    pub fn has_fixed_ip(&self, subnet_id: &str, addr: IpAddr) -> bool {
        self.fixed_ips
            .iter()
            .any(|fip| fip.subnet_id == subnet_id && fip.ip_address == addr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: IpAddr,
}

/// An allowed-address-pairs entry. The MAC is optional; the directory falls
/// back to the port's own MAC when it is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressPair {
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl AddressPair {
    pub fn new(addr: IpAddr) -> AddressPair {
        AddressPair {
            ip_address: addr.to_string(),
            mac_address: None,
        }
    }

    pub fn parsed_address(&self) -> Option<IpAddr> {
        self.ip_address.parse().ok()
    }
}

/// Request body for creating a port.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortCreate {
    pub network_id: String,
    pub name: String,
    pub device_owner: String,
    pub device_id: String,
    pub fixed_ips: Vec<FixedIp>,
}

/// Conditional update of a port's allowed address pairs. `revision_number`
/// is the revision last observed by the writer; the directory rejects the
/// update when it is stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortUpdate {
    pub allowed_address_pairs: Vec<AddressPair>,
    pub revision_number: i64,
}

/// Server-side filter for port listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortFilter {
    pub device_owner: Option<String>,
    pub device_id: Option<String>,
    pub network_id: Option<String>,
}

impl PortFilter {
    /// Ports tagged with the given device owner and device ID.
    pub fn device(owner: &str, id: &str) -> PortFilter {
        PortFilter {
            device_owner: Some(owner.to_string()),
            device_id: Some(id.to_string()),
            network_id: None,
        }
    }

    /// All ports on the given network.
    pub fn network(network_id: &str) -> PortFilter {
        PortFilter {
            network_id: Some(network_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, port: &Port) -> bool {
        if let Some(owner) = &self.device_owner {
            if port.device_owner.ne(owner) {
                return false;
            }
        }
        if let Some(id) = &self.device_id {
            if port.device_id.ne(id) {
                return false;
            }
        }
        if let Some(network) = &self.network_id {
            if port.network_id.ne(network) {
                return false;
            }
        }
        true
    }
}
