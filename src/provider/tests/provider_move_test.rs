use std::{net::IpAddr, str::FromStr};

use egressd_mock::MemoryDirectory;
use egressd_provider::{
    config::EgressConfig,
    error::Error,
    fixture::{test_attached_port, test_node, test_subnet, test_uuid},
    provider::EgressIpProvider,
};

fn two_node_setup(dir: &MemoryDirectory) -> (String, String) {
    let network_a = test_uuid(1);
    let network_b = test_uuid(2);
    let server_a = test_uuid(3);
    let server_b = test_uuid(4);
    // Both nodes sit on subnets with the same CIDR; the subnets are still
    // distinct entities on distinct networks.
    dir.add_subnet(test_subnet("subnet-a", &network_a, "10.10.0.0/24"));
    dir.add_subnet(test_subnet("subnet-b", &network_b, "10.10.0.0/24"));
    dir.add_port(test_attached_port("port-a", &network_a, &server_a, &[]));
    dir.add_port(test_attached_port("port-b", &network_b, &server_b, &[]));
    (server_a, server_b)
}

#[tokio::test]
async fn move_rebinds_grant_and_keeps_reservation() {
    let dir = MemoryDirectory::new();
    let (server_a, server_b) = two_node_setup(&dir);
    let node_a = test_node("node-a", &server_a);
    let node_b = test_node("node-b", &server_b);
    let addr = IpAddr::from_str("10.10.0.100").unwrap();

    let provider = EgressIpProvider::new(dir.clone(), EgressConfig::default());
    provider.assign_private_ip(addr, &node_a).await.unwrap();
    let reservation_before = dir
        .ports()
        .into_iter()
        .find(|p| p.name == format!("egressip-{addr}"))
        .unwrap();

    provider
        .move_private_ip(addr, &node_a, &node_b)
        .await
        .unwrap();

    // Gone from every port of node A, present on exactly one port of node B.
    assert!(!dir.port("port-a").unwrap().allows_address(addr));
    assert!(dir.port("port-b").unwrap().allows_address(addr));

    // The reservation did not move: same port, still owned by node A's
    // instance.
    let reservation_after = dir.port(&reservation_before.id).unwrap();
    assert_eq!(reservation_after.device_id, format!("EgressIP_{server_a}"));
    assert_eq!(reservation_after.fixed_ips, reservation_before.fixed_ips);
}

#[tokio::test]
async fn move_is_idempotent() {
    let dir = MemoryDirectory::new();
    let (server_a, server_b) = two_node_setup(&dir);
    let node_a = test_node("node-a", &server_a);
    let node_b = test_node("node-b", &server_b);
    let addr = IpAddr::from_str("10.10.0.100").unwrap();

    let provider = EgressIpProvider::new(dir.clone(), EgressConfig::default());
    provider.assign_private_ip(addr, &node_a).await.unwrap();
    provider
        .move_private_ip(addr, &node_a, &node_b)
        .await
        .unwrap();

    // A repeated move finds nothing to revoke on A and the address already
    // allowed on B; both are tolerated.
    provider
        .move_private_ip(addr, &node_a, &node_b)
        .await
        .unwrap();
    assert!(dir.port("port-b").unwrap().allows_address(addr));
    assert_eq!(
        dir.port("port-b")
            .unwrap()
            .allowed_address_pairs
            .len(),
        1
    );
}

#[tokio::test]
async fn move_fails_when_target_cannot_host_address() {
    let dir = MemoryDirectory::new();
    let (server_a, server_b) = two_node_setup(&dir);
    let node_a = test_node("node-a", &server_a);
    let node_b = test_node("node-b", &server_b);
    // Fits neither node's subnets.
    let addr = IpAddr::from_str("172.16.0.5").unwrap();

    let provider = EgressIpProvider::new(dir.clone(), EgressConfig::default());
    let err = provider
        .move_private_ip(addr, &node_a, &node_b)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoMatchingSubnet { .. }));
}

#[tokio::test]
async fn allows_move() {
    let provider = EgressIpProvider::new(MemoryDirectory::new(), EgressConfig::default());
    assert!(provider.allows_move_private_ip());
}
