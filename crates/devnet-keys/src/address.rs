//! 20-byte account addresses.

use crate::{KeyError, Result};
use ethers::types::H160;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An account address.
///
/// Two textual forms are used when wiring a network together: the
/// prefixed form (`0x` + 40 checksummed hex digits) for account and
/// allocation fields, and the raw form (the same 40 digits, no prefix)
/// for packed binary fields such as clique `extraData`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(H160);

impl Address {
    /// The length of an address in bytes.
    pub const LEN: usize = 20;

    /// Creates an address from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(H160::from(bytes))
    }

    /// Returns the raw bytes of this address.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        self.0.as_fixed_bytes()
    }

    /// Returns the EIP-55 checksummed form with the `0x` prefix (42 chars).
    #[must_use]
    pub fn prefixed(&self) -> String {
        to_checksum(&self.0, None)
    }

    /// Returns the checksummed hex digits without a prefix (40 chars).
    #[must_use]
    pub fn raw(&self) -> String {
        let mut prefixed = self.prefixed();
        prefixed.split_off(2)
    }

    /// Returns the lowercase hex digits without a prefix.
    #[must_use]
    pub fn lower_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl From<H160> for Address {
    fn from(value: H160) -> Self {
        Self(value)
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != Self::LEN * 2 {
            return Err(KeyError::InvalidAddress(format!(
                "expected 40 hex digits, got {:?}",
                s
            )));
        }

        let bytes = hex::decode(digits).map_err(|e| KeyError::InvalidAddress(e.to_string()))?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.prefixed())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefixed())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.prefixed())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
