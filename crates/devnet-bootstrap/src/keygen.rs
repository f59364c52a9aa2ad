//! Per-node key material.
//!
//! Each node directory ends up holding:
//!
//! ```text
//! node<i>/
//!   keystore/UTC--<timestamp>--<address>   encrypted key record
//!   address.addr                           0x-prefixed checksummed address
//!   password.txt                           keystore password, mode 0600
//! ```

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Result};
use crate::files::write_private;
use crate::identity::Identity;
use crate::roles::{RoleDescriptor, RoleLayout};
use devnet_keys::{keystore, Address, KeyError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Address file name inside a node directory.
pub const ADDRESS_FILE: &str = "address.addr";
/// Password file name inside a node directory.
pub const PASSWORD_FILE: &str = "password.txt";
/// Keystore directory name inside a node directory.
pub const KEYSTORE_DIR: &str = "keystore";

/// Generates key material for every node in `layout`.
///
/// Stops at the first failure and removes whatever this call already wrote
/// for earlier nodes; a partially generated batch is not valid and the run
/// must be repeated. Records reused under `skip_if_exists` are kept.
///
/// # Errors
///
/// Returns the first error, attributed to the node that caused it.
pub fn generate(config: &BootstrapConfig, layout: &RoleLayout) -> Result<Vec<Identity>> {
    let data_dir = config.data_dir();
    info!(data_dir = %data_dir.display(), count = layout.len(), "Generating node keys");

    let mut created = Vec::new();
    let mut identities = Vec::with_capacity(layout.len());
    for descriptor in layout.iter() {
        match generate_one(config, &data_dir, *descriptor, &mut created) {
            Ok(identity) => identities.push(identity),
            Err(e) => {
                discard(&created);
                return Err(e.at_node(descriptor.index));
            }
        }
    }

    info!(count = identities.len(), "Keystores and password files generated");
    Ok(identities)
}

/// Removes files written by an aborted batch. Reused records are never
/// listed in `created`.
fn discard(created: &[PathBuf]) {
    for path in created.iter().rev() {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed partial key output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial key output"),
        }
    }
}

fn generate_one(
    config: &BootstrapConfig,
    data_dir: &Path,
    descriptor: RoleDescriptor,
    created: &mut Vec<PathBuf>,
) -> Result<Identity> {
    let node_dir = descriptor.node_dir(data_dir);
    let keystore_dir = node_dir.join(KEYSTORE_DIR);
    fs::create_dir_all(&keystore_dir)?;

    let password = config.password.clone();
    let password_file = node_dir.join(PASSWORD_FILE);
    let password_line = format!("{}\n", password.expose());

    if config.skip_if_exists {
        if let Some(identity) = reuse(&node_dir, descriptor, &password)? {
            info!(
                index = descriptor.index,
                role = %descriptor.role,
                address = %identity.address,
                "Reusing existing keystore"
            );
            write_private(&password_file, password_line.as_bytes())?;
            return Ok(identity);
        }
    }

    let (_, record) = keystore::create(&keystore_dir, password.expose())?;
    created.push(record.path.clone());

    let address_file = node_dir.join(ADDRESS_FILE);
    fs::write(&address_file, record.address.prefixed())?;
    created.push(address_file);

    let fresh_password = !password_file.exists();
    write_private(&password_file, password_line.as_bytes())?;
    if fresh_password {
        created.push(password_file);
    }

    info!(
        index = descriptor.index,
        role = %descriptor.role,
        address = %record.address,
        "Node key generated"
    );

    Ok(Identity {
        descriptor,
        address: record.address,
        keystore: Some(record.path),
        password,
    })
}

fn reuse(
    node_dir: &Path,
    descriptor: RoleDescriptor,
    password: &crate::config::Password,
) -> Result<Option<Identity>> {
    let Some(address) = read_address(&node_dir.join(ADDRESS_FILE))? else {
        return Ok(None);
    };

    match keystore::find(&node_dir.join(KEYSTORE_DIR), &address) {
        Ok(path) => Ok(Some(Identity {
            descriptor,
            address,
            keystore: Some(path),
            password: password.clone(),
        })),
        Err(KeyError::KeystoreNotFound { .. }) => {
            debug!(index = descriptor.index, "Address file without keystore, regenerating");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn read_address(path: &Path) -> Result<Option<Address>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.parse()?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rebuilds identities from the address files a previous run left behind.
///
/// # Errors
///
/// Returns [`BootstrapError::MissingInput`] for the first node without an
/// address file.
pub fn load(config: &BootstrapConfig, layout: &RoleLayout) -> Result<Vec<Identity>> {
    let data_dir = config.data_dir();

    layout
        .iter()
        .map(|descriptor| {
            let node_dir = descriptor.node_dir(&data_dir);
            let path = node_dir.join(ADDRESS_FILE);
            let address = read_address(&path)
                .and_then(|address| {
                    address.ok_or(BootstrapError::MissingInput {
                        what: "address file",
                        path,
                    })
                })
                .map_err(|e| e.at_node(descriptor.index))?;

            let keystore = match keystore::find(&node_dir.join(KEYSTORE_DIR), &address) {
                Ok(path) => Some(path),
                Err(KeyError::KeystoreNotFound { .. }) => None,
                Err(e) => return Err(BootstrapError::from(e).at_node(descriptor.index)),
            };
            debug!(index = descriptor.index, address = %address, "Loaded node address");

            Ok(Identity {
                descriptor: *descriptor,
                address,
                keystore,
                password: config.password.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn config(dir: &TempDir, count: usize) -> BootstrapConfig {
        let mut config = BootstrapConfig::with_root(dir.path());
        config.count = count;
        config
    }

    #[test]
    fn generates_distinct_identities() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3);
        let layout = RoleLayout::for_count(3);

        let identities = generate(&config, &layout).unwrap();

        assert_eq!(identities.len(), 3);
        let unique: HashSet<_> = identities.iter().map(|id| id.address).collect();
        assert_eq!(unique.len(), 3);

        for id in &identities {
            let node_dir = id.descriptor.node_dir(&config.data_dir());
            let on_disk = fs::read_to_string(node_dir.join(ADDRESS_FILE)).unwrap();
            assert_eq!(on_disk, id.address.prefixed());
            assert_eq!(
                fs::read_to_string(node_dir.join(PASSWORD_FILE)).unwrap(),
                "passw0rd\n"
            );

            let keypair = keystore::decrypt(id.keystore.as_ref().unwrap(), "passw0rd").unwrap();
            assert_eq!(keypair.address(), id.address);
        }
    }

    #[test]
    fn skip_if_exists_reuses_keys() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 2);
        let layout = RoleLayout::for_count(2);

        let first = generate(&config, &layout).unwrap();
        config.skip_if_exists = true;
        let second = generate(&config, &layout).unwrap();

        let a: Vec<_> = first.iter().map(|id| id.address).collect();
        let b: Vec<_> = second.iter().map(|id| id.address).collect();
        assert_eq!(a, b);

        let records = fs::read_dir(config.data_dir().join("node0").join(KEYSTORE_DIR))
            .unwrap()
            .count();
        assert_eq!(records, 1);
    }

    #[test]
    fn rerun_without_skip_makes_fresh_keys() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1);
        let layout = RoleLayout::for_count(1);

        let first = generate(&config, &layout).unwrap();
        let second = generate(&config, &layout).unwrap();
        assert_ne!(first[0].address, second[0].address);
    }

    #[test]
    fn load_reads_address_files() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2);
        let layout = RoleLayout::for_count(2);
        let generated = generate(&config, &layout).unwrap();

        let loaded = load(&config, &layout).unwrap();
        assert_eq!(loaded[1].address, generated[1].address);
        assert_eq!(loaded[1].keystore, generated[1].keystore);
    }

    #[test]
    fn load_fails_on_missing_address() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2);

        let err = load(&config, &RoleLayout::for_count(2)).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Node { index: 0, ref source }
                if matches!(**source, BootstrapError::MissingInput { .. })
        ));
    }

    #[test]
    fn failure_removes_earlier_nodes_output() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 4);
        let node2 = config.data_dir().join("node2");
        fs::create_dir_all(&node2).unwrap();
        fs::write(node2.join(KEYSTORE_DIR), "not a directory").unwrap();

        let err = generate(&config, &RoleLayout::for_count(4)).unwrap_err();
        assert!(matches!(err, BootstrapError::Node { index: 2, .. }));

        for i in 0..2 {
            let node_dir = config.data_dir().join(format!("node{i}"));
            assert!(!node_dir.join(ADDRESS_FILE).exists());
            assert!(!node_dir.join(PASSWORD_FILE).exists());
            assert_eq!(fs::read_dir(node_dir.join(KEYSTORE_DIR)).unwrap().count(), 0);
        }
    }

    #[test]
    fn failure_keeps_reused_records() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, 3);
        let first = generate(&config, &RoleLayout::for_count(2)).unwrap();

        config.skip_if_exists = true;
        let node2 = config.data_dir().join("node2");
        fs::create_dir_all(&node2).unwrap();
        fs::write(node2.join(KEYSTORE_DIR), "not a directory").unwrap();
        assert!(generate(&config, &RoleLayout::for_count(3)).is_err());

        let node0 = config.data_dir().join("node0");
        assert_eq!(
            fs::read_to_string(node0.join(ADDRESS_FILE)).unwrap(),
            first[0].address.prefixed()
        );
        assert!(first[0].keystore.as_ref().unwrap().is_file());
    }

    #[test]
    fn load_propagates_unreadable_keystore_dir() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1);
        let layout = RoleLayout::for_count(1);
        generate(&config, &layout).unwrap();

        let keystore_dir = config.data_dir().join("node0").join(KEYSTORE_DIR);
        fs::remove_dir_all(&keystore_dir).unwrap();
        fs::write(&keystore_dir, "not a directory").unwrap();

        let err = load(&config, &layout).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Node { index: 0, ref source }
                if matches!(**source, BootstrapError::Keys(KeyError::Io(_)))
        ));
    }
}
