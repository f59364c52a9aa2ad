//! # Devnet Keys
//!
//! Account key material for a local Ethereum development network:
//! addresses, secp256k1 keypairs, and password-encrypted keystore records
//! in the format geth reads.
//!
//! ## Example
//!
//! ```rust,no_run
//! use devnet_keys::keystore;
//! use std::path::Path;
//!
//! let dir = Path::new("data/node0/keystore");
//! let (keypair, record) = keystore::create(dir, "passw0rd")?;
//!
//! let reopened = keystore::decrypt(&record.path, "passw0rd")?;
//! assert_eq!(reopened.address(), keypair.address());
//! # Ok::<(), devnet_keys::KeyError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod error;
mod keypair;
pub mod keystore;

pub use address::Address;
pub use error::{KeyError, Result};
pub use keypair::Keypair;
pub use keystore::KeystoreRecord;
