//! Builders for test resources, shared by unit and integration tests.

use egressd_neutron::{
    port::{FixedIp, Port},
    server::Server,
    subnet::Subnet,
};

use crate::{config, instance::NodeRef};

pub fn test_trace() {
    egressd_trace::init::prepare_tracing(egressd_trace::init::TraceConfig {
        level: "info".to_string(),
        format: String::new(),
    });
}

/// Deterministic UUIDs, so fixtures can be cross-referenced in assertions.
pub fn test_uuid(n: u32) -> String {
    format!("00000000-0000-4000-8000-{n:012x}")
}

pub fn test_node(name: &str, server_id: &str) -> NodeRef {
    NodeRef::new(
        name,
        &format!("{}{}", config::DEFAULT_PROVIDER_PREFIX, server_id),
    )
}

pub fn test_server(id: &str, name: &str) -> Server {
    Server {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn test_subnet(id: &str, network_id: &str, cidr: &str) -> Subnet {
    Subnet {
        id: id.to_string(),
        network_id: network_id.to_string(),
        name: format!("subnet-{id}"),
        cidr: cidr.to_string(),
    }
}

/// A port attached to a compute instance, with the given fixed
/// `(subnet, address)` pairs.
pub fn test_attached_port(
    id: &str,
    network_id: &str,
    server_id: &str,
    fixed: &[(&str, &str)],
) -> Port {
    Port {
        id: id.to_string(),
        network_id: network_id.to_string(),
        name: format!("port-{id}"),
        device_owner: config::DEFAULT_COMPUTE_DEVICE_OWNER.to_string(),
        device_id: server_id.to_string(),
        fixed_ips: fixed
            .iter()
            .map(|(subnet_id, addr)| FixedIp {
                subnet_id: subnet_id.to_string(),
                ip_address: addr.parse().unwrap(),
            })
            .collect(),
        allowed_address_pairs: Vec::new(),
        revision_number: 1,
    }
}

/// A detached reservation port holding `addr` on `subnet_id`, tagged for
/// the given server with the default egress tag.
pub fn test_reservation_port(id: &str, network_id: &str, subnet_id: &str, addr: &str, server_id: &str) -> Port {
    Port {
        id: id.to_string(),
        network_id: network_id.to_string(),
        name: format!("egressip-{addr}"),
        device_owner: config::DEFAULT_EGRESS_TAG.to_string(),
        device_id: format!("{}_{}", config::DEFAULT_EGRESS_TAG, server_id),
        fixed_ips: vec![FixedIp {
            subnet_id: subnet_id.to_string(),
            ip_address: addr.parse().unwrap(),
        }],
        allowed_address_pairs: Vec::new(),
        revision_number: 1,
    }
}
