use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// An address block belonging to exactly one network. Distinct subnets may
/// carry identical CIDRs; subnet identity, never CIDR equality, drives all
/// decisions made from this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: String,
}

impl Subnet {
    /// The CIDR is stored as the wire string and parsed at use sites.
    pub fn parse_cidr(&self) -> Result<IpNet, ipnet::AddrParseError> {
        self.cidr.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn works_parse_cidr() {
        let subnet = Subnet {
            id: "s1".to_string(),
            network_id: "n1".to_string(),
            name: String::new(),
            cidr: "10.0.0.0/24".to_string(),
        };
        let net = subnet.parse_cidr().unwrap();
        assert_eq!(net.prefix_len(), 24);
        assert!(subnet
            .parse_cidr()
            .unwrap()
            .contains(&"10.0.0.5".parse::<std::net::IpAddr>().unwrap()));
    }

    #[test]
    fn fails_parse_cidr() {
        let subnet = Subnet {
            id: "s1".to_string(),
            network_id: "n1".to_string(),
            name: String::new(),
            cidr: "10.0.0.0".to_string(),
        };
        assert!(subnet.parse_cidr().is_err());
    }
}
