//! Node identities.

use crate::config::Password;
use crate::roles::{Role, RoleDescriptor};
use devnet_genesis::Substitutions;
use devnet_keys::Address;
use std::path::PathBuf;

/// A generated account bound to a network role.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Role and node index.
    pub descriptor: RoleDescriptor,
    /// The account address.
    pub address: Address,
    /// The encrypted keystore record, when known.
    pub keystore: Option<PathBuf>,
    /// Password protecting the keystore record.
    pub password: Password,
}

impl Identity {
    /// The node's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.descriptor.role
    }

    /// The node's index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.descriptor.index
    }
}

/// Placeholder substitutions for a set of identities, keyed by each
/// identity's environment name.
#[must_use]
pub fn substitutions(identities: &[Identity]) -> Substitutions {
    identities.iter().fold(Substitutions::new(), |subs, id| {
        subs.with(id.descriptor.env_key(), id.address)
    })
}
