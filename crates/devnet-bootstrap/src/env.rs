//! Environment files consumed by the compose file and dapp tooling.
//!
//! `.env` carries every node address plus the keystore password;
//! `.env.keys` carries decrypted private keys and is only written on
//! request. Both are plain `KEY=value` lines in insertion order.

use crate::bootnode::BootnodeIdentity;
use crate::config::{BootstrapConfig, Password};
use crate::error::{BootstrapError, Result};
use crate::identity::Identity;
use crate::keygen::KEYSTORE_DIR;
use devnet_genesis::write_atomic;
use devnet_keys::keystore;
use std::fmt;
use std::path::Path;
use tracing::info;
use zeroize::Zeroizing;

/// Ordered `KEY=value` entries.
///
/// Values are zeroized on drop and never shown by `Debug`.
#[derive(Default)]
pub struct EnvironmentRecord {
    entries: Vec<(String, Zeroizing<String>)>,
}

impl EnvironmentRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Environment`] if the key is not an
    /// upper-case identifier, is already present, or the value spans lines.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = Zeroizing::new(value.into());

        if !is_valid_key(&key) {
            return Err(BootstrapError::Environment(format!("invalid key {key:?}")));
        }
        if self.get(&key).is_some() {
            return Err(BootstrapError::Environment(format!("duplicate key {key}")));
        }
        if value.contains(['\n', '\r']) {
            return Err(BootstrapError::Environment(format!(
                "value of {key} spans several lines"
            )));
        }

        self.entries.push((key, value));
        Ok(())
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The file text, one `KEY=value` line per entry.
    #[must_use]
    pub fn render(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::new());
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Writes the record to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())?;
        info!(path = %path.display(), entries = self.len(), "Environment file written");
        Ok(())
    }
}

impl fmt::Debug for EnvironmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentRecord")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Builds the `.env` record: one address per node, then `PASSWORD`, then
/// `BOOTNODE_ID` when `bootnode` is given.
///
/// # Errors
///
/// Returns an error if two identities share an environment name.
pub fn address_record(
    identities: &[Identity],
    password: &Password,
    bootnode: Option<&BootnodeIdentity>,
) -> Result<EnvironmentRecord> {
    let mut record = EnvironmentRecord::new();
    for identity in identities {
        record.push(identity.descriptor.env_key(), identity.address.prefixed())?;
    }
    record.push("PASSWORD", password.expose())?;
    if let Some(bootnode) = bootnode {
        record.push("BOOTNODE_ID", bootnode.node_id.clone())?;
    }
    Ok(record)
}

/// Builds the `.env.keys` record by decrypting every node's keystore.
///
/// Every record is decrypted and checked against the node's address before
/// anything is returned, so a failure leaves no partial key file behind.
///
/// # Errors
///
/// Returns the first missing, undecryptable or mismatched keystore,
/// attributed to its node.
pub fn private_key_record(
    config: &BootstrapConfig,
    identities: &[Identity],
) -> Result<EnvironmentRecord> {
    let data_dir = config.data_dir();
    let mut record = EnvironmentRecord::new();

    for identity in identities {
        let key = decrypt_checked(identity, &data_dir).map_err(|e| e.at_node(identity.index()))?;
        record.push(identity.descriptor.key_env_key(), key.as_str())?;
    }

    info!(count = record.len(), "Private keys exported");
    Ok(record)
}

fn decrypt_checked(identity: &Identity, data_dir: &Path) -> Result<Zeroizing<String>> {
    let path = match &identity.keystore {
        Some(path) => path.clone(),
        None => {
            let dir = identity.descriptor.node_dir(data_dir).join(KEYSTORE_DIR);
            keystore::find(&dir, &identity.address)?
        }
    };
    if !path.is_file() {
        return Err(BootstrapError::MissingInput {
            what: "keystore",
            path,
        });
    }

    let keypair = keystore::decrypt(&path, identity.password.expose())?;
    if keypair.address() != identity.address {
        return Err(BootstrapError::AddressMismatch {
            path,
            expected: identity.address.prefixed(),
            found: keypair.address().prefixed(),
        });
    }
    Ok(keypair.private_key_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleLayout;
    use devnet_keys::Address;
    use pretty_assertions::assert_eq;

    fn identities(count: usize) -> Vec<Identity> {
        RoleLayout::for_count(count)
            .iter()
            .map(|d| Identity {
                descriptor: *d,
                address: Address::from_bytes([u8::try_from(d.index).unwrap() + 1; 20]),
                keystore: None,
                password: Password::default(),
            })
            .collect()
    }

    #[test]
    fn address_record_layout() {
        let record = address_record(&identities(4), &Password::default(), None).unwrap();
        let text = record.render();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec!["VALIDATOR_ADDRESS", "NODE1_ADDRESS", "NODE2_ADDRESS", "RPC_ADDRESS", "PASSWORD"]
        );
        assert_eq!(lines[4], "PASSWORD=passw0rd");
        assert!(lines[0].starts_with("VALIDATOR_ADDRESS=0x"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn rejects_bad_entries() {
        let mut record = EnvironmentRecord::new();
        record.push("A", "1").unwrap();
        assert!(record.push("A", "2").is_err());
        assert!(record.push("lower", "x").is_err());
        assert!(record.push("9LIVES", "x").is_err());
        assert!(record.push("B", "two\nlines").is_err());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn debug_hides_values() {
        let record = address_record(&identities(2), &Password::new("hunter22"), None).unwrap();
        let shown = format!("{record:?}");
        assert!(shown.contains("PASSWORD"));
        assert!(!shown.contains("hunter22"));
    }

    #[cfg(unix)]
    #[test]
    fn write_replaces_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let mut record = EnvironmentRecord::new();
        record.push("A", "1").unwrap();
        record.write(&path).unwrap();

        let mut record = EnvironmentRecord::new();
        record.push("B", "2").unwrap();
        record.write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "B=2\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_keystore_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = BootstrapConfig::with_root(dir.path());

        let err = private_key_record(&config, &identities(2)).unwrap_err();
        assert!(matches!(err, BootstrapError::Node { index: 0, .. }));
    }

    #[test]
    fn decrypts_matching_keystores() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = BootstrapConfig::with_root(dir.path());
        config.count = 2;
        let ids = crate::keygen::generate(&config, &RoleLayout::for_count(2)).unwrap();

        let record = private_key_record(&config, &ids).unwrap();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["NODE0_PK", "RPC_PK"]);

        let pk = record.get("NODE0_PK").unwrap();
        assert_eq!(pk.len(), 66);
        let keypair = devnet_keys::Keypair::from_secret_bytes(&hex::decode(&pk[2..]).unwrap()).unwrap();
        assert_eq!(keypair.address(), ids[0].address);
    }

    #[test]
    fn wrong_record_is_a_mismatch() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = BootstrapConfig::with_root(dir.path());
        config.count = 2;
        let mut ids = crate::keygen::generate(&config, &RoleLayout::for_count(2)).unwrap();
        ids[1].keystore = ids[0].keystore.clone();

        let err = private_key_record(&config, &ids).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Node { index: 1, ref source }
                if matches!(**source, BootstrapError::AddressMismatch { .. })
        ));
    }
}
