//! Password-encrypted keystore records.
//!
//! Records use the Web3 Secret Storage v3 format (scrypt + AES-128-CTR)
//! and are named the way geth names them:
//! `UTC--<timestamp>--<address>`.

use crate::{Address, KeyError, Keypair, Result};
use chrono::{DateTime, Utc};
use ethers::signers::LocalWallet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A keystore record persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreRecord {
    /// The address whose key the record encrypts.
    pub address: Address,
    /// Location of the encrypted record.
    pub path: PathBuf,
}

/// Returns the geth-style file name for a record created at `created`.
#[must_use]
pub fn file_name(created: DateTime<Utc>, address: &Address) -> String {
    format!(
        "UTC--{}--{}",
        created.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
        address.raw()
    )
}

/// Generates a fresh key and stores it encrypted under `password` in `dir`.
///
/// The directory is created if missing. The record carries the lowercase
/// `address` field that geth uses to index its keystore.
///
/// # Errors
///
/// Returns [`KeyError::Encryption`] if the record cannot be produced, or an
/// I/O error if it cannot be written.
pub fn create(dir: &Path, password: &str) -> Result<(Keypair, KeystoreRecord)> {
    fs::create_dir_all(dir)?;

    let (wallet, uuid) = LocalWallet::new_keystore(dir, &mut rand::thread_rng(), password, None)
        .map_err(|e| KeyError::Encryption(e.to_string()))?;
    let keypair = Keypair::from_wallet(wallet);
    let address = keypair.address();

    let pending = dir.join(&uuid);
    let path = dir.join(file_name(Utc::now(), &address));
    if let Err(e) = finalize(&pending, &path, &address) {
        let _ = fs::remove_file(&pending);
        return Err(e);
    }

    debug!(address = %address, path = %path.display(), "Keystore record written");
    Ok((keypair, KeystoreRecord { address, path }))
}

fn finalize(pending: &Path, path: &Path, address: &Address) -> Result<()> {
    let mut record: serde_json::Value = serde_json::from_slice(&fs::read(pending)?)?;
    let Some(fields) = record.as_object_mut() else {
        return Err(KeyError::Encryption(
            "keystore record is not a JSON object".into(),
        ));
    };
    fields.insert(
        "address".to_string(),
        serde_json::Value::String(address.lower_hex()),
    );

    fs::write(path, serde_json::to_vec(&record)?)?;
    fs::remove_file(pending)?;
    Ok(())
}

/// Decrypts the record at `path` with `password`.
///
/// # Errors
///
/// Returns [`KeyError::Decryption`] if the password is wrong or the record
/// is unreadable.
pub fn decrypt(path: &Path, password: &str) -> Result<Keypair> {
    let wallet =
        LocalWallet::decrypt_keystore(path, password).map_err(|e| KeyError::Decryption {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(Keypair::from_wallet(wallet))
}

/// Finds the record for `address` in `dir`.
///
/// Matches any file whose lowercase name contains the lowercase address
/// digits. When several match, the lexicographically first (oldest) wins.
///
/// # Errors
///
/// Returns [`KeyError::KeystoreNotFound`] if the directory is missing or
/// holds no matching record.
pub fn find(dir: &Path, address: &Address) -> Result<PathBuf> {
    let not_found = || KeyError::KeystoreNotFound {
        address: address.prefixed(),
        dir: dir.to_path_buf(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let needle = address.lower_hex();
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.contains(&needle) {
            matches.push(entry.path());
        }
    }

    matches.sort();
    matches.into_iter().next().ok_or_else(not_found)
}
