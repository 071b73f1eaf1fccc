use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const DEFAULT_PROVIDER_PREFIX: &str = "openstack:///";
pub const DEFAULT_COMPUTE_DEVICE_OWNER: &str = "compute:nova";
pub const DEFAULT_EGRESS_TAG: &str = "EgressIP";

// The directory has no per-port address quota, so capacity is reported
// against a fixed ceiling per interface. Raise it if schedulers run into it.
pub const DEFAULT_MAX_CAPACITY: i64 = 64;

pub const DEFAULT_COMPENSATION_ATTEMPTS: u32 = 10;

/// Configuration for the egress IP provider. Constructed once by the
/// embedder and threaded through every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    /// Prefix stripped from a node's provider ID to obtain the server UUID.
    pub provider_prefix: String,
    /// Device owner carried by ports attached to compute instances.
    pub compute_device_owner: String,
    /// Ownership tag stamped on reservation ports.
    pub egress_tag: String,
    /// Per-interface, per-family ceiling on assignable addresses.
    pub max_capacity_per_port: i64,
    /// Retry policy for optimistic-concurrency conflicts on port updates.
    pub conflict_retry: RetryPolicy,
    /// How many times a failed assign retries the compensating release of
    /// its reservation before giving up.
    pub compensation_attempts: u32,
}

impl Default for EgressConfig {
    fn default() -> EgressConfig {
        EgressConfig {
            provider_prefix: DEFAULT_PROVIDER_PREFIX.to_string(),
            compute_device_owner: DEFAULT_COMPUTE_DEVICE_OWNER.to_string(),
            egress_tag: DEFAULT_EGRESS_TAG.to_string(),
            max_capacity_per_port: DEFAULT_MAX_CAPACITY,
            conflict_retry: RetryPolicy::default(),
            compensation_attempts: DEFAULT_COMPENSATION_ATTEMPTS,
        }
    }
}
