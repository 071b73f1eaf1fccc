use std::{net::IpAddr, str::FromStr};

use egressd::provider::{
    config::EgressConfig,
    fixture::{test_attached_port, test_node, test_subnet, test_trace, test_uuid},
};
use egressd::EgressIpProvider;
use egressd_mock::MemoryDirectory;

#[tokio::test]
async fn assign_and_release_through_facade() {
    test_trace();

    let dir = MemoryDirectory::new();
    let network = test_uuid(1);
    let server = test_uuid(2);
    dir.add_subnet(test_subnet("subnet-1", &network, "192.168.10.0/24"));
    dir.add_port(test_attached_port("port-1", &network, &server, &[]));

    let provider = EgressIpProvider::new(dir.clone(), EgressConfig::default());
    let node = test_node("node-1", &server);
    let addr = IpAddr::from_str("192.168.10.64").unwrap();

    provider.assign_private_ip(addr, &node).await.unwrap();
    assert!(dir.port("port-1").unwrap().allows_address(addr));

    provider.release_private_ip(addr, &node).await.unwrap();
    assert!(dir.port("port-1").unwrap().allowed_address_pairs.is_empty());
    assert_eq!(dir.port_count(), 1);
}
