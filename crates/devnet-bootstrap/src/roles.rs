//! Network roles and their assignment to node indices.

use std::fmt;
use std::path::{Path, PathBuf};

/// The part a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Block sealer. Exactly one per network.
    Validator,
    /// Plain peer.
    Peer,
    /// Node exposing JSON-RPC to tooling.
    RpcEndpoint,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validator => write!(f, "validator"),
            Self::Peer => write!(f, "peer"),
            Self::RpcEndpoint => write!(f, "rpc"),
        }
    }
}

/// A role bound to a node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleDescriptor {
    /// The node's role.
    pub role: Role,
    /// The node's index (`node<i>`).
    pub index: usize,
}

impl RoleDescriptor {
    /// Environment/placeholder name of the node's address.
    #[must_use]
    pub fn env_key(&self) -> String {
        match self.role {
            Role::Validator => "VALIDATOR_ADDRESS".to_string(),
            Role::Peer => format!("NODE{}_ADDRESS", self.index),
            Role::RpcEndpoint => "RPC_ADDRESS".to_string(),
        }
    }

    /// Environment name of the node's decrypted private key.
    #[must_use]
    pub fn key_env_key(&self) -> String {
        match self.role {
            Role::RpcEndpoint => "RPC_PK".to_string(),
            Role::Validator | Role::Peer => format!("NODE{}_PK", self.index),
        }
    }

    /// Container name the compose file gives this node.
    #[must_use]
    pub fn container_name(&self) -> String {
        match self.role {
            Role::RpcEndpoint => "eth-rpc".to_string(),
            Role::Validator | Role::Peer => format!("eth-node{}", self.index),
        }
    }

    /// The node's data directory under `data_dir`.
    #[must_use]
    pub fn node_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("node{}", self.index))
    }
}

/// Ordered role assignment for a network of a given size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLayout {
    descriptors: Vec<RoleDescriptor>,
}

impl RoleLayout {
    /// Index 0 validates, the last index serves RPC (when there are at
    /// least two nodes), everything between is a peer.
    #[must_use]
    pub fn for_count(count: usize) -> Self {
        let descriptors = (0..count)
            .map(|index| {
                let role = if index == 0 {
                    Role::Validator
                } else if index == count - 1 {
                    Role::RpcEndpoint
                } else {
                    Role::Peer
                };
                RoleDescriptor { role, index }
            })
            .collect();
        Self { descriptors }
    }

    /// Descriptors in index order.
    #[must_use]
    pub fn descriptors(&self) -> &[RoleDescriptor] {
        &self.descriptors
    }

    /// Iterates descriptors in index order.
    pub fn iter(&self) -> impl Iterator<Item = &RoleDescriptor> {
        self.descriptors.iter()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the layout has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
