use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("revision {expected} of port '{port}' is stale")]
    RevisionMismatch { port: String, expected: i64 },

    #[error("address {address} is already allocated on subnet '{subnet}'")]
    AddressInUse { address: String, subnet: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("remote API error (status {status}): {message}")]
    Remote { status: u16, message: String },
}

impl DirectoryError {
    /// True when a conditional update lost an optimistic-concurrency race
    /// and may be retried against fresh state.
    pub fn is_revision_mismatch(&self) -> bool {
        matches!(self, DirectoryError::RevisionMismatch { .. })
    }
}
