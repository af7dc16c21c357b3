//! Observable gauge events, drained with [`Gauge::take_events`](crate::gauge::Gauge::take_events).

use serde::{Deserialize, Serialize};

use sluice_core::{AccountId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeEvent {
    Deposit {
        sender: AccountId,
        account: AccountId,
        amount: u128,
    },
    Withdraw {
        account: AccountId,
        receiver: AccountId,
        amount: u128,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    Claim {
        account: AccountId,
        to: AccountId,
        token: TokenId,
        amount: u128,
    },
    UpdateLiquidityLimit {
        account: AccountId,
        balance: u128,
        total_staked: u128,
        working_balance: u128,
        working_supply: u128,
    },
    ShareVote {
        owner: AccountId,
        staker: AccountId,
        enabled: bool,
    },
    AcceptSharedVote {
        staker: AccountId,
        owner: AccountId,
    },
    RejectSharedVote {
        staker: AccountId,
        owner: AccountId,
    },
    RewardTokenRegistered {
        token: TokenId,
        distributor: AccountId,
        period_length: u64,
    },
    RewardTokenUnregistered {
        token: TokenId,
    },
    RewardDistributorChanged {
        token: TokenId,
        distributor: AccountId,
    },
    RewardDeposited {
        token: TokenId,
        amount: u128,
        rate: u128,
        finish_at: u64,
    },
    GaugeDisabled {
        at: u64,
    },
    LiquidityManagerChanged {
        previous: Option<AccountId>,
        current: Option<AccountId>,
    },
}
