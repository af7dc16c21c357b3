//! Observable boost ledger events, drained with
//! [`BoostLedger::take_events`](crate::ledger::BoostLedger::take_events).

use serde::{Deserialize, Serialize};

use sluice_core::AccountId;

/// Which aggregate of an account a [`BoostEvent::Burn`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Delegated,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostEvent {
    Boost {
        delegator: AccountId,
        receiver: AccountId,
        index: usize,
        bias: u128,
        slope: u128,
        start_time: u64,
        end_time: u64,
    },
    Unboost {
        delegator: AccountId,
        receiver: AccountId,
        index: usize,
        amount: u128,
        slope_cut: u128,
    },
    /// Quantity that decayed away since the aggregate was last written.
    Burn {
        account: AccountId,
        aggregate: Aggregate,
        amount: u128,
    },
    Approval {
        owner: AccountId,
        spender: AccountId,
        value: u128,
    },
}
