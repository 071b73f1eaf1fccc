use serde::{Deserialize, Serialize};

/// A compute instance, identified by UUID. Not owned by this component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
}
