//! In-memory collaborators for testing and simulation.
//!
//! [`MemoryEscrow`], [`MemoryTokenLedger`] and [`MemoryWeights`] implement the
//! external traits with plain maps behind `parking_lot` locks. No persistence;
//! not suitable for production use.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{MAX_LOCK_TIME, week_start};
use crate::error::TokenError;
use crate::traits::{GaugeWeights, TokenLedger, VotingEscrow};
use crate::types::{AccountId, TokenId};

/// A single account's lock in the [`MemoryEscrow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPosition {
    pub amount: u128,
    /// Week-aligned expiry.
    pub unlock_time: u64,
}

impl LockedPosition {
    /// Decay per second: `amount / MAX_LOCK_TIME`.
    pub fn slope(&self) -> u128 {
        self.amount / MAX_LOCK_TIME as u128
    }

    /// `slope · (unlock_time − now)`, zero once expired.
    pub fn voting_power(&self, now: u64) -> u128 {
        if now >= self.unlock_time {
            return 0;
        }
        self.slope() * (self.unlock_time - now) as u128
    }
}

/// Voting escrow with one lock per account.
#[derive(Debug, Default)]
pub struct MemoryEscrow {
    locks: RwLock<HashMap<AccountId, LockedPosition>>,
}

impl MemoryEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `account`'s lock. `unlock_time` is rounded down to a week.
    pub fn lock(&self, account: AccountId, amount: u128, unlock_time: u64) {
        let position = LockedPosition {
            amount,
            unlock_time: week_start(unlock_time),
        };
        debug!(account = %account.short(), amount, unlock = position.unlock_time, "escrow: lock set");
        self.locks.write().insert(account, position);
    }

    /// Drop `account`'s lock entirely.
    pub fn unlock(&self, account: &AccountId) {
        self.locks.write().remove(account);
    }

    pub fn position(&self, account: &AccountId) -> Option<LockedPosition> {
        self.locks.read().get(account).copied()
    }
}

impl VotingEscrow for MemoryEscrow {
    fn balance_of(&self, account: &AccountId, now: u64) -> u128 {
        self.locks
            .read()
            .get(account)
            .map_or(0, |p| p.voting_power(now))
    }

    fn unlock_time(&self, account: &AccountId) -> u64 {
        self.locks.read().get(account).map_or(0, |p| p.unlock_time)
    }

    fn total_supply(&self, now: u64) -> u128 {
        self.locks
            .read()
            .values()
            .map(|p| p.voting_power(now))
            .fold(0u128, u128::saturating_add)
    }
}

/// Multi-token balance ledger.
#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    balances: RwLock<HashMap<(TokenId, AccountId), u128>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `account` out of thin air.
    pub fn mint(&self, token: &TokenId, account: &AccountId, amount: u128) {
        let mut balances = self.balances.write();
        let entry = balances.entry((*token, *account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Sum of all balances of `token`.
    pub fn total_supply(&self, token: &TokenId) -> u128 {
        self.balances
            .read()
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, v)| *v)
            .fold(0u128, u128::saturating_add)
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> u128 {
        self.balances
            .read()
            .get(&(*token, *account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAccount);
        }
        let mut balances = self.balances.write();
        let have = balances.get(&(*token, *from)).copied().unwrap_or(0);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        balances.insert((*token, *from), have - amount);
        let entry = balances.entry((*token, *to)).or_insert(0);
        *entry = entry.saturating_add(amount);
        debug!(token = %token.short(), from = %from.short(), to = %to.short(), amount, "ledger: transfer");
        Ok(())
    }
}

/// Gauge weights set per week; each value holds until the next one.
#[derive(Debug, Default)]
pub struct MemoryWeights {
    weights: RwLock<HashMap<AccountId, BTreeMap<u64, u128>>>,
    activations: RwLock<HashMap<AccountId, u64>>,
}

impl MemoryWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of `gauge` from the week containing `from` onward.
    pub fn set_weight(&self, gauge: AccountId, from: u64, weight: u128) {
        self.weights
            .write()
            .entry(gauge)
            .or_default()
            .insert(week_start(from), weight);
    }

    pub fn set_activation(&self, gauge: AccountId, timestamp: u64) {
        self.activations.write().insert(gauge, timestamp);
    }
}

impl GaugeWeights for MemoryWeights {
    fn relative_weight(&self, gauge: &AccountId, week: u64) -> u128 {
        self.weights
            .read()
            .get(gauge)
            .and_then(|schedule| schedule.range(..=week).next_back().map(|(_, w)| *w))
            .unwrap_or(0)
    }

    fn activation_timestamp(&self, gauge: &AccountId) -> u64 {
        self.activations.read().get(gauge).copied().unwrap_or(0)
    }
}
