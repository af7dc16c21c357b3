//! Core identity types and the call context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte account identifier.
///
/// Used for stakers, delegators, gauges, liquidity managers and token
/// contracts alike. Serializes as lowercase hex so account-keyed maps
/// round-trip through JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 32]);

/// Tokens are identified by the account that issues them.
pub type TokenId = AccountId;

impl AccountId {
    /// The zero account. Never a valid spender or receiver.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Deterministic identifier for a human-readable label (BLAKE3 of the label).
    ///
    /// Used by the simulator and tests to name accounts.
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// Identifier controlled by an Ed25519 public key: BLAKE3 of the raw key bytes.
    pub fn from_public_key(key: &[u8; 32]) -> Self {
        Self(*blake3::hash(key).as_bytes())
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short())
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Error parsing an [`AccountId`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account id: {0}")]
pub struct ParseAccountIdError(String);

impl FromStr for AccountId {
    type Err = ParseAccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseAccountIdError(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ParseAccountIdError(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(array))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Who is calling and when.
///
/// Every state-changing operation takes a context; `now` is the single
/// logical clock, advanced by the caller between operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Context {
    pub sender: AccountId,
    pub now: u64,
}

impl Context {
    pub fn new(sender: AccountId, now: u64) -> Self {
        Self { sender, now }
    }

    /// Same sender at a different instant.
    pub fn at(&self, now: u64) -> Self {
        Self { now, ..*self }
    }

    /// Same instant, different sender.
    pub fn with_sender(&self, sender: AccountId) -> Self {
        Self { sender, ..*self }
    }
}
