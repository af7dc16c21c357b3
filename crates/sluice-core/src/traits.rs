//! Trait interfaces for the Sluice engine.
//!
//! These traits are the seams to everything the engine does not own:
//! - [`VotingEscrow`]: locked-position oracle (raw voting power, unlock times)
//! - [`VotingPower`]: voting power after boosts (sluice-boost implements)
//! - [`InflationSchedule`]: primary reward mint rate and epoch boundaries
//! - [`GaugeWeights`]: per-gauge relative weight, piecewise constant per week
//! - [`TokenLedger`]: balances and transfers of staking and reward tokens
//! - [`LiquidityManager`]: pluggable custodian for staked tokens

use crate::error::TokenError;
use crate::types::{AccountId, TokenId};

/// Locked governance positions and their linearly decaying voting power.
pub trait VotingEscrow: Send + Sync {
    /// Voting power of `account` at `now`. Zero once the lock has expired.
    fn balance_of(&self, account: &AccountId, now: u64) -> u128;

    /// Timestamp at which `account`'s lock expires. Zero if it has none.
    fn unlock_time(&self, account: &AccountId) -> u64;

    /// Sum of all voting power at `now`.
    fn total_supply(&self, now: u64) -> u128;
}

/// Voting power as seen by a gauge, after delegation.
pub trait VotingPower: Send + Sync {
    /// Own voting power minus what was delegated away plus what was received.
    fn adjusted_balance_of(&self, account: &AccountId, now: u64) -> u128;

    /// Own voting power before any delegation.
    fn own_balance_of(&self, account: &AccountId, now: u64) -> u128;

    /// Denominator for the working-balance share.
    fn total_supply(&self, now: u64) -> u128;
}

/// Source of the primary reward's mint rate.
///
/// The rate is piecewise constant and changes only at epoch boundaries.
pub trait InflationSchedule: Send + Sync {
    /// Mint rate (base units per second) in force at `at`.
    fn rate(&self, at: u64) -> u128;

    /// First epoch boundary strictly after `at`.
    fn next_epoch_boundary(&self, at: u64) -> u64;
}

/// Relative gauge weights, scaled by [`SCALE`](crate::constants::SCALE).
pub trait GaugeWeights: Send + Sync {
    /// Weight of `gauge` for the week starting at `week_start`.
    fn relative_weight(&self, gauge: &AccountId, week_start: u64) -> u128;

    /// Before this timestamp the gauge's weight is zero.
    fn activation_timestamp(&self, gauge: &AccountId) -> u64;
}

/// Fungible token balances for staking and reward tokens.
pub trait TokenLedger: Send + Sync {
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> u128;

    /// Move `amount` of `token` from `from` to `to`.
    fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TokenError>;
}

/// Pluggable custodian that may hold or deploy staked tokens.
///
/// The gauge forwards staked tokens to [`address`](Self::address) and then
/// notifies the manager; on withdrawal the manager pays the receiver itself.
pub trait LiquidityManager: Send + Sync {
    /// Account holding the managed tokens on the token ledger.
    fn address(&self) -> AccountId;

    /// Whether the manager currently accepts and serves funds.
    fn is_active(&self) -> bool;

    /// `amount` staked on behalf of `account` has been moved to [`address`](Self::address).
    /// An error refuses the deposit and the gauge moves the tokens back.
    fn on_deposit(
        &self,
        tokens: &dyn TokenLedger,
        account: &AccountId,
        amount: u128,
        use_manager: bool,
    ) -> Result<(), TokenError>;

    /// Deliver `amount` staked tokens to `receiver`.
    fn on_withdraw(
        &self,
        tokens: &dyn TokenLedger,
        receiver: &AccountId,
        amount: u128,
    ) -> Result<(), TokenError>;
}
