use async_trait::async_trait;

use crate::{
    error::DirectoryError,
    port::{Port, PortCreate, PortFilter, PortUpdate},
    server::Server,
    subnet::Subnet,
};

/// One page of a listing. `next_marker` is the ID to resume after; `None`
/// means the listing is exhausted.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

/// The remote network directory: ports, subnets and compute instances on a
/// named network, with marker pagination and revision-conditional port
/// updates. Implementations are authenticated handles supplied by the
/// embedder.
#[async_trait]
pub trait NetworkDirectory: Send + Sync {
    async fn list_ports(
        &self,
        filter: &PortFilter,
        marker: Option<&str>,
    ) -> Result<Page<Port>, DirectoryError>;

    async fn get_port(&self, id: &str) -> Result<Port, DirectoryError>;

    /// Fails with [`DirectoryError::AddressInUse`] when a requested fixed IP
    /// is already allocated on its subnet. That uniqueness constraint is the
    /// directory's own and is what makes reservation ports safe to use as an
    /// allocation record.
    async fn create_port(&self, create: &PortCreate) -> Result<Port, DirectoryError>;

    /// Conditional update. Fails with [`DirectoryError::RevisionMismatch`]
    /// when `update.revision_number` no longer matches the port.
    async fn update_port(&self, id: &str, update: &PortUpdate) -> Result<Port, DirectoryError>;

    async fn delete_port(&self, id: &str) -> Result<(), DirectoryError>;

    async fn list_subnets(
        &self,
        network_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Subnet>, DirectoryError>;

    async fn get_server(&self, id: &str) -> Result<Server, DirectoryError>;

    /// Drains every page of a port listing. A failure on any page aborts the
    /// whole read; partial results are never returned.
    async fn list_all_ports(&self, filter: &PortFilter) -> Result<Vec<Port>, DirectoryError> {
        let mut ports = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self.list_ports(filter, marker.as_deref()).await?;
            ports.extend(page.items);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(ports)
    }

    /// Drains every page of a subnet listing, with the same all-or-nothing
    /// contract as [`NetworkDirectory::list_all_ports`].
    async fn list_all_subnets(&self, network_id: &str) -> Result<Vec<Subnet>, DirectoryError> {
        let mut subnets = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self.list_subnets(network_id, marker.as_deref()).await?;
            subnets.extend(page.items);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(subnets)
    }
}
