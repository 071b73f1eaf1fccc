use std::{net::IpAddr, str::FromStr};

use egressd_mock::MemoryDirectory;
use egressd_neutron::port::AddressPair;
use egressd_provider::{
    config::EgressConfig,
    error::Error,
    fixture::{test_attached_port, test_node, test_subnet, test_uuid},
    provider::EgressIpProvider,
};

#[tokio::test]
async fn capacity_for_dual_stack_port() {
    let dir = MemoryDirectory::new();
    let network = test_uuid(1);
    let server = test_uuid(2);
    dir.add_subnet(test_subnet("subnet-4", &network, "192.168.26.0/24"));
    dir.add_subnet(test_subnet("subnet-6", &network, "2001:db8:abcd::/64"));
    let mut port = test_attached_port(
        "port-1",
        &network,
        &server,
        &[("subnet-4", "192.168.26.4"), ("subnet-6", "2001:db8:abcd::4")],
    );
    port.allowed_address_pairs
        .push(AddressPair::new(IpAddr::from_str("192.168.26.10").unwrap()));
    dir.add_port(port);

    let provider = EgressIpProvider::new(dir, EgressConfig::default());
    let node = test_node("node-1", &server);
    let reports = provider.node_egress_ip_configuration(&node).await.unwrap();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert_eq!(report.interface, "port-1");
    assert_eq!(report.ifaddr.ipv4.as_deref(), Some("192.168.26.0/24"));
    assert_eq!(report.ifaddr.ipv6.as_deref(), Some("2001:db8:abcd::/64"));
    // /24 gives min(64, 254) = 64, minus the fixed IP and the pair.
    assert_eq!(report.capacity.ipv4, Some(62));
    // /64 gives the ceiling, minus the fixed IP.
    assert_eq!(report.capacity.ipv6, Some(63));
}

#[tokio::test]
async fn capacity_is_bounded_by_small_subnets() {
    let dir = MemoryDirectory::new();
    let network = test_uuid(1);
    let server = test_uuid(2);
    dir.add_subnet(test_subnet("subnet-1", &network, "10.0.0.0/30"));
    dir.add_port(test_attached_port(
        "port-1",
        &network,
        &server,
        &[("subnet-1", "10.0.0.2")],
    ));

    let provider = EgressIpProvider::new(dir, EgressConfig::default());
    let node = test_node("node-1", &server);
    let reports = provider.node_egress_ip_configuration(&node).await.unwrap();
    // min(64, 2^2 - 2) = 2, minus the one fixed IP.
    assert_eq!(reports[0].capacity.ipv4, Some(1));
    // No IPv6 subnet: nothing to report for that family.
    assert_eq!(reports[0].capacity.ipv6, None);
    assert_eq!(reports[0].ifaddr.ipv6, None);
}

#[tokio::test]
async fn capacity_fails_on_two_same_family_subnets() {
    let dir = MemoryDirectory::new();
    let network = test_uuid(1);
    let server = test_uuid(2);
    dir.add_subnet(test_subnet("subnet-1", &network, "10.0.0.0/24"));
    dir.add_subnet(test_subnet("subnet-2", &network, "10.0.1.0/24"));
    dir.add_port(test_attached_port("port-1", &network, &server, &[]));

    let provider = EgressIpProvider::new(dir, EgressConfig::default());
    let node = test_node("node-1", &server);
    let err = provider
        .node_egress_ip_configuration(&node)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MultipleFamilySubnets { .. }));
}

#[tokio::test]
async fn capacity_fails_on_duplicate_cidr_across_ports() {
    let dir = MemoryDirectory::new();
    let network_a = test_uuid(1);
    let network_b = test_uuid(2);
    let server = test_uuid(3);
    dir.add_subnet(test_subnet("subnet-a", &network_a, "10.30.0.0/24"));
    dir.add_subnet(test_subnet("subnet-b", &network_b, "10.30.0.0/24"));
    dir.add_port(test_attached_port("port-a", &network_a, &server, &[]));
    dir.add_port(test_attached_port("port-b", &network_b, &server, &[]));

    let provider = EgressIpProvider::new(dir, EgressConfig::default());
    let node = test_node("node-1", &server);
    match provider
        .node_egress_ip_configuration(&node)
        .await
        .unwrap_err()
    {
        Error::DuplicateCidr { cidr, .. } => assert_eq!(cidr, "10.30.0.0/24"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn capacity_respects_configured_ceiling() {
    let dir = MemoryDirectory::new();
    let network = test_uuid(1);
    let server = test_uuid(2);
    dir.add_subnet(test_subnet("subnet-1", &network, "10.0.0.0/24"));
    dir.add_port(test_attached_port("port-1", &network, &server, &[]));

    let config = EgressConfig {
        max_capacity_per_port: 8,
        ..Default::default()
    };
    let provider = EgressIpProvider::new(dir, config);
    let node = test_node("node-1", &server);
    let reports = provider.node_egress_ip_configuration(&node).await.unwrap();
    assert_eq!(reports[0].capacity.ipv4, Some(8));
}
