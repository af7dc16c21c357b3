//! Signed allowance approvals.
//!
//! An owner authorizes a spender off-line by signing the BLAKE3 digest of
//! `(owner, spender, value, nonce, deadline)` with the Ed25519 key whose
//! BLAKE3 hash is the owner's account id. Each accepted permit consumes the
//! owner's current nonce, so a signature can be used at most once.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use sluice_core::AccountId;
use sluice_core::error::BoostError;

const PERMIT_DOMAIN: &[u8] = b"sluice-boost/permit/v1";

/// A signed approval for `spender` to delegate up to `value` of `owner`'s power.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    pub owner: AccountId,
    pub spender: AccountId,
    pub value: u128,
    pub deadline: u64,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// Message signed by the owner for a permit at `nonce`.
pub fn permit_digest(
    owner: &AccountId,
    spender: &AccountId,
    value: u128,
    nonce: u64,
    deadline: u64,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(PERMIT_DOMAIN);
    hasher.update(owner.as_bytes());
    hasher.update(spender.as_bytes());
    hasher.update(&value.to_le_bytes());
    hasher.update(&nonce.to_le_bytes());
    hasher.update(&deadline.to_le_bytes());
    *hasher.finalize().as_bytes()
}

impl Permit {
    /// Sign a permit for the account controlled by `key`.
    pub fn sign(
        key: &SigningKey,
        spender: AccountId,
        value: u128,
        nonce: u64,
        deadline: u64,
    ) -> Self {
        let public_key = key.verifying_key().to_bytes();
        let owner = AccountId::from_public_key(&public_key);
        let digest = permit_digest(&owner, &spender, value, nonce, deadline);
        Self {
            owner,
            spender,
            value,
            deadline,
            public_key,
            signature: key.sign(&digest).to_bytes(),
        }
    }

    /// Check the key binding and signature against `nonce`.
    pub fn verify(&self, nonce: u64) -> Result<(), BoostError> {
        if AccountId::from_public_key(&self.public_key) != self.owner {
            return Err(BoostError::InvalidSignature);
        }
        let key =
            VerifyingKey::from_bytes(&self.public_key).map_err(|_| BoostError::InvalidSignature)?;
        let digest = permit_digest(&self.owner, &self.spender, self.value, nonce, self.deadline);
        key.verify(&digest, &Signature::from_bytes(&self.signature))
            .map_err(|_| BoostError::InvalidSignature)
    }
}
