//! Error types for the Sluice engine.
//!
//! Every failed operation leaves ledger state untouched; callers decide
//! whether to resubmit.
use thiserror::Error;

use crate::types::TokenId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient token balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("transfer to the zero account")] ZeroAccount,
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoostError {
    #[error("boost amount is zero")] BoostZeroAmount,
    #[error("end time {end_time} is not after now {now}")] EndTimeSmallerThanCurrentTimestamp { end_time: u64, now: u64 },
    #[error("end time {0} is not aligned with a week boundary")] EndTimeNotAlignedWithWeek(u64),
    #[error("end time {end_time} exceeds lock end {lock_end}")] EndTimeExceedLockEnd { end_time: u64, lock_end: u64 },
    #[error("boost exceeds delegable balance: requested {requested}, available {available}")] BoostExceedBalance { requested: u128, available: u128 },
    #[error("insufficient allowance: have {allowance}, need {needed}")] InsufficientAllowance { allowance: u128, needed: u128 },
    #[error("only the boost receiver can cancel")] OnlyCancelByReceiver,
    #[error("boost index {index} out of bound ({len} boosts)")] IndexOutOfBound { index: usize, len: usize },
    #[error("cannot cancel an expired boost")] CancelExpiredBoost,
    #[error("cancel exceeds remaining boost: requested {requested}, remaining {remaining}")] CancelBoostExceedBalance { requested: u128, remaining: u128 },
    #[error("approve to the zero account")] ApproveToZeroAddress,
    #[error("allowance below zero: have {allowance}, decrease {decrease}")] AllowanceBelowZero { allowance: u128, decrease: u128 },
    #[error("permit deadline {deadline} expired at {now}")] ExpiredDeadline { deadline: u64, now: u64 },
    #[error("invalid permit signature")] InvalidSignature,
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GaugeError {
    #[error("deposit amount is zero")] DepositZeroAmount,
    #[error("withdraw amount is zero")] WithdrawZeroAmount,
    #[error("reward amount is zero")] RewardZeroAmount,
    #[error("insufficient staked balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("cannot claim another account's rewards to a third party")] ClaimOthersRewardToAnother,
    #[error("kick not needed: working balance would not shrink")] KickNotNeeded,
    #[error("kick not allowed: voting power unchanged since last checkpoint")] KickNotAllowed,
    #[error("cannot share voting power with yourself")] SelfSharingIsNotAllowed,
    #[error("cascaded vote sharing is not allowed")] CascadedSharingIsNotAllowed,
    #[error("vote sharing not permitted by owner")] SharingNotPermitted,
    #[error("account is not sharing votes")] NotSharingVote,
    #[error("unauthorized caller")] Unauthorized,
    #[error("reward token already registered: {0}")] RewardTokenAlreadyRegistered(TokenId),
    #[error("reward token not registered: {0}")] RewardTokenNotRegistered(TokenId),
    #[error("unknown reward token: {0}")] UnknownRewardToken(TokenId),
    #[error("staking token cannot be a reward token: {0}")] StakingTokenAsReward(TokenId),
    #[error("too many reward tokens (max {max})")] TooManyRewardTokens { max: usize },
    #[error("no stake to distribute an instant reward over")] NoStakeForInstantReward,
    #[error("current liquidity manager is still active")] ManagerStillActive,
    #[error("new liquidity manager is not active")] ManagerNotActive,
    #[error("liquidity manager still holds funds: gauge holds {held}, staked {staked}")] ManagerHoldsFunds { held: u128, staked: u128 },
    #[error("custody shortfall: available {available}, needed {needed}")] CustodyShortfall { available: u128, needed: u128 },
    #[error("re-entrant call")] Reentrant,
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config load: {0}")] Load(String),
    #[error("invalid config: {0}")] Invalid(String),
}

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error(transparent)] Boost(#[from] BoostError),
    #[error(transparent)] Gauge(#[from] GaugeError),
    #[error(transparent)] Token(#[from] TokenError),
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_boost_exceed_balance() {
        let e = BoostError::BoostExceedBalance { requested: 10, available: 3 };
        assert_eq!(e.to_string(), "boost exceeds delegable balance: requested 10, available 3");
    }

    #[test]
    fn display_misaligned_end() {
        assert_eq!(
            BoostError::EndTimeNotAlignedWithWeek(5).to_string(),
            "end time 5 is not aligned with a week boundary"
        );
    }

    #[test]
    fn math_converts_into_domain_errors() {
        let boost: BoostError = MathError::Overflow.into();
        assert_eq!(boost, BoostError::Math(MathError::Overflow));
        let gauge: GaugeError = MathError::DivisionByZero.into();
        assert_eq!(gauge, GaugeError::Math(MathError::DivisionByZero));
    }

    #[test]
    fn token_error_converts_into_gauge_error() {
        let e: GaugeError = TokenError::ZeroAccount.into();
        assert_eq!(e, GaugeError::Token(TokenError::ZeroAccount));
        assert_eq!(e.to_string(), "transfer to the zero account");
    }

    #[test]
    fn umbrella_wraps_every_domain() {
        let e: SluiceError = GaugeError::KickNotNeeded.into();
        assert!(matches!(e, SluiceError::Gauge(GaugeError::KickNotNeeded)));
        let e: SluiceError = ConfigError::Load("missing".into()).into();
        assert_eq!(e.to_string(), "config load: missing");
    }
}
