//! Persistable gauge state.
//!
//! Everything a [`Gauge`](crate::gauge::Gauge) mutates lives in
//! [`GaugeState`]; collaborators (voting power, schedule, weights, token
//! ledger, liquidity manager) are injected separately and never serialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sluice_core::{AccountId, TokenId};

use crate::sharing::VoteSharing;

/// Primary reward integral and the inflation parameters it was last advanced with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeSnapshot {
    pub timestamp: u64,
    /// Σ rate · weight · dt / working_supply, scaled by `SCALE`.
    pub integral: u128,
    pub inflation_rate: u128,
    /// Next inflation-epoch boundary; the rate is refreshed when it is crossed.
    pub future_epoch_time: u64,
}

/// Per-account primary reward accounting read by the external minter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionCheckpoint {
    pub checkpoint_integral: u128,
    /// Total primary reward ever attributed to the account. Never decreases.
    pub accumulated: u128,
}

/// Per-account, per-token secondary reward accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRewardSnapshot {
    pub checkpoint_integral: u128,
    pub claimed: u128,
    pub pending: u128,
}

/// A secondary reward token.
///
/// `period_length == 0` means deposits are distributed instantly; otherwise
/// each deposit drips linearly until `finish_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTokenState {
    pub distributor: AccountId,
    pub rate: u128,
    pub finish_at: u64,
    pub last_update: u64,
    pub period_length: u64,
    /// Σ reward per staked unit, scaled by `SCALE`.
    pub integral: u128,
    /// Unregistered tokens stay here so accrued rewards remain claimable.
    pub active: bool,
    /// When the token was last unregistered.
    pub paused_at: u64,
}

impl RewardTokenState {
    pub fn new(distributor: AccountId, period_length: u64, now: u64) -> Self {
        Self {
            distributor,
            rate: 0,
            finish_at: now,
            last_update: now,
            period_length,
            integral: 0,
            active: true,
            paused_at: 0,
        }
    }

    pub fn is_instant(&self) -> bool {
        self.period_length == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Raw staked balance.
    pub balance: u128,
    /// Boost-weighted balance; always `<= balance`.
    pub working_balance: u128,
    pub primary: FractionCheckpoint,
    pub rewards: BTreeMap<TokenId, UserRewardSnapshot>,
    pub rewards_receiver: Option<AccountId>,
    /// Adjusted voting power the working balance was last computed with.
    pub voting_power_at_checkpoint: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeState {
    pub snapshot: GaugeSnapshot,
    pub total_staked: u128,
    pub working_supply: u128,
    pub accounts: BTreeMap<AccountId, AccountState>,
    pub reward_tokens: BTreeMap<TokenId, RewardTokenState>,
    pub sharing: VoteSharing,
    /// Primary accrual frozen.
    pub killed: bool,
    /// Held while collaborators are being called.
    pub locked: bool,
}

impl GaugeState {
    pub fn account(&self, account: &AccountId) -> Option<&AccountState> {
        self.accounts.get(account)
    }

    pub fn active_reward_tokens(&self) -> impl Iterator<Item = (&TokenId, &RewardTokenState)> {
        self.reward_tokens.iter().filter(|(_, r)| r.active)
    }
}
