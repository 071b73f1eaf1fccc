pub use egressd_neutron as neutron;
pub use egressd_provider as provider;

pub use egressd_provider::provider::EgressIpProvider;
