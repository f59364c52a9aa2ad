//! secp256k1 account keypairs.

use crate::{Address, KeyError, Result};
use ethers::signers::{LocalWallet, Signer};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// A secp256k1 account keypair.
#[derive(Clone)]
pub struct Keypair {
    wallet: LocalWallet,
}

impl Keypair {
    /// Generates a new random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            wallet: LocalWallet::new(&mut OsRng),
        }
    }

    pub(crate) fn from_wallet(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Creates a keypair from a secret key (32 bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid secp256k1 scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(KeyError::InvalidSecretKey);
        }
        let wallet = LocalWallet::from_bytes(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { wallet })
    }

    /// Returns the account address derived from the public key.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from(self.wallet.address())
    }

    /// Returns the secret key bytes.
    ///
    /// # Security
    ///
    /// The returned buffer is zeroized on drop. Do not copy it out.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&self.wallet.signer().to_bytes());
        secret
    }

    /// Returns the secret key as `0x`-prefixed hex (66 chars).
    #[must_use]
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.secret_bytes())))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
