//! Error types for key operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while creating or opening account keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Encrypting a private key into a keystore record failed.
    #[error("keystore encryption failed: {0}")]
    Encryption(String),

    /// A keystore record could not be decrypted (wrong password or corrupt file).
    #[error("failed to decrypt keystore {}: {reason}", .path.display())]
    Decryption {
        /// The record that was being opened.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The address is not 40 hex digits.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The secret key is malformed.
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// No keystore record for the address exists in the directory.
    #[error("no keystore for {address} in {}", .dir.display())]
    KeystoreNotFound {
        /// The address that was searched for.
        address: String,
        /// The keystore directory that was searched.
        dir: PathBuf,
    },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A keystore record is not valid JSON.
    #[error("malformed keystore record: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;
