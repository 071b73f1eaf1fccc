use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use uuid::Uuid;

use egressd_neutron::{
    directory::{NetworkDirectory, Page},
    error::DirectoryError,
    port::{Port, PortCreate, PortFilter, PortUpdate},
    server::Server,
    subnet::Subnet,
};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory [`NetworkDirectory`] for tests.
///
/// It keeps the two directory-side guarantees the provider relies on:
/// fixed-IP uniqueness per subnet on port creation, and revision
/// preconditions on port updates (every successful update bumps the
/// revision). Listings are marker-paginated; shrink the page size to force
/// multi-page reads.
///
/// Conflicts and delete failures can be injected to simulate concurrent
/// writers and a flaky control plane.
#[derive(Clone)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<Inner>>,
    page_size: usize,
}

#[derive(Default)]
struct Inner {
    ports: BTreeMap<String, Port>,
    subnets: BTreeMap<String, Subnet>,
    servers: BTreeMap<String, Server>,
    injected_update_conflicts: u32,
    injected_delete_failures: u32,
}

impl MemoryDirectory {
    pub fn new() -> MemoryDirectory {
        MemoryDirectory {
            inner: Arc::new(Mutex::new(Inner::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(page_size: usize) -> MemoryDirectory {
        MemoryDirectory {
            inner: Arc::new(Mutex::new(Inner::default())),
            page_size,
        }
    }

    pub fn add_port(&self, port: Port) {
        let mut inner = self.inner.lock().unwrap();
        inner.ports.insert(port.id.clone(), port);
    }

    pub fn add_subnet(&self, subnet: Subnet) {
        let mut inner = self.inner.lock().unwrap();
        inner.subnets.insert(subnet.id.clone(), subnet);
    }

    pub fn add_server(&self, server: Server) {
        let mut inner = self.inner.lock().unwrap();
        inner.servers.insert(server.id.clone(), server);
    }

    /// The next `n` port updates fail with a stale revision, as if a
    /// concurrent writer won the race. The revision is bumped on each, so a
    /// retry that re-reads the port will observe fresh state.
    pub fn inject_update_conflicts(&self, n: u32) {
        self.inner.lock().unwrap().injected_update_conflicts = n;
    }

    /// The next `n` port deletions fail with a remote error.
    pub fn inject_delete_failures(&self, n: u32) {
        self.inner.lock().unwrap().injected_delete_failures = n;
    }

    pub fn port(&self, id: &str) -> Option<Port> {
        self.inner.lock().unwrap().ports.get(id).cloned()
    }

    /// Snapshot of every port, in listing order.
    pub fn ports(&self) -> Vec<Port> {
        self.inner.lock().unwrap().ports.values().cloned().collect()
    }

    pub fn port_count(&self) -> usize {
        self.inner.lock().unwrap().ports.len()
    }

    fn paginate<T: Clone>(&self, items: Vec<(String, T)>, marker: Option<&str>) -> Page<T> {
        let start = match marker {
            Some(m) => items.iter().position(|(id, _)| id.as_str() > m).unwrap_or(items.len()),
            None => 0,
        };
        let end = usize::min(start + self.page_size, items.len());
        let next_marker = if end < items.len() {
            items.get(end - 1).map(|(id, _)| id.clone())
        } else {
            None
        };
        Page {
            items: items[start..end].iter().map(|(_, item)| item.clone()).collect(),
            next_marker,
        }
    }
}

impl Default for MemoryDirectory {
    fn default() -> MemoryDirectory {
        MemoryDirectory::new()
    }
}

#[async_trait]
impl NetworkDirectory for MemoryDirectory {
    async fn list_ports(
        &self,
        filter: &PortFilter,
        marker: Option<&str>,
    ) -> Result<Page<Port>, DirectoryError> {
        let inner = self.inner.lock().unwrap();
        let matching: Vec<(String, Port)> = inner
            .ports
            .values()
            .filter(|p| filter.matches(p))
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        drop(inner);
        Ok(self.paginate(matching, marker))
    }

    async fn get_port(&self, id: &str) -> Result<Port, DirectoryError> {
        self.inner
            .lock()
            .unwrap()
            .ports
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                resource: "port",
                id: id.to_string(),
            })
    }

    async fn create_port(&self, create: &PortCreate) -> Result<Port, DirectoryError> {
        let mut inner = self.inner.lock().unwrap();
        for fip in &create.fixed_ips {
            let subnet =
                inner
                    .subnets
                    .get(&fip.subnet_id)
                    .ok_or_else(|| DirectoryError::NotFound {
                        resource: "subnet",
                        id: fip.subnet_id.clone(),
                    })?;
            if subnet.network_id != create.network_id {
                return Err(DirectoryError::BadRequest(format!(
                    "subnet '{}' does not belong to network '{}'",
                    fip.subnet_id, create.network_id
                )));
            }
            let taken = inner
                .ports
                .values()
                .any(|p| p.has_fixed_ip(&fip.subnet_id, fip.ip_address));
            if taken {
                return Err(DirectoryError::AddressInUse {
                    address: fip.ip_address.to_string(),
                    subnet: fip.subnet_id.clone(),
                });
            }
        }
        let port = Port {
            id: Uuid::new_v4().to_string(),
            network_id: create.network_id.clone(),
            name: create.name.clone(),
            device_owner: create.device_owner.clone(),
            device_id: create.device_id.clone(),
            fixed_ips: create.fixed_ips.clone(),
            allowed_address_pairs: Vec::new(),
            revision_number: 1,
        };
        inner.ports.insert(port.id.clone(), port.clone());
        Ok(port)
    }

    async fn update_port(&self, id: &str, update: &PortUpdate) -> Result<Port, DirectoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.injected_update_conflicts > 0 {
            inner.injected_update_conflicts -= 1;
            if let Some(port) = inner.ports.get_mut(id) {
                port.revision_number += 1;
            }
            return Err(DirectoryError::RevisionMismatch {
                port: id.to_string(),
                expected: update.revision_number,
            });
        }
        let port = inner
            .ports
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound {
                resource: "port",
                id: id.to_string(),
            })?;
        if port.revision_number != update.revision_number {
            return Err(DirectoryError::RevisionMismatch {
                port: id.to_string(),
                expected: update.revision_number,
            });
        }
        port.allowed_address_pairs = update.allowed_address_pairs.clone();
        port.revision_number += 1;
        Ok(port.clone())
    }

    async fn delete_port(&self, id: &str) -> Result<(), DirectoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.injected_delete_failures > 0 {
            inner.injected_delete_failures -= 1;
            return Err(DirectoryError::Remote {
                status: 503,
                message: format!("injected failure deleting port '{id}'"),
            });
        }
        inner
            .ports
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::NotFound {
                resource: "port",
                id: id.to_string(),
            })
    }

    async fn list_subnets(
        &self,
        network_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Subnet>, DirectoryError> {
        let inner = self.inner.lock().unwrap();
        let matching: Vec<(String, Subnet)> = inner
            .subnets
            .values()
            .filter(|s| s.network_id == network_id)
            .map(|s| (s.id.clone(), s.clone()))
            .collect();
        drop(inner);
        Ok(self.paginate(matching, marker))
    }

    async fn get_server(&self, id: &str) -> Result<Server, DirectoryError> {
        self.inner
            .lock()
            .unwrap()
            .servers
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                resource: "server",
                id: id.to_string(),
            })
    }
}
