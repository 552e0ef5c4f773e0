//! Remote component addresses.

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};

/// A 20-byte address rendered as `0x` followed by 40 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalise an address. Accepts upper or mixed case hex.
    pub fn parse(s: &str) -> ChainResult<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ChainError::InvalidAddress(s.to_string()))?;
        if digits.len() != 40 {
            return Err(ChainError::InvalidAddress(s.to_string()));
        }
        let bytes = hex::decode(digits).map_err(|_| ChainError::InvalidAddress(s.to_string()))?;
        Ok(Self::from_bytes(&bytes))
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    /// Deterministic address derived from a counter.
    pub fn from_index(index: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&index.to_be_bytes());
        Self::from_bytes(&bytes)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ChainError;

    fn try_from(s: String) -> ChainResult<Self> {
        Address::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
