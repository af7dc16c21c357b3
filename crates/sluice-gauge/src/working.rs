//! Working-balance arithmetic.
//!
//! A staker's working balance is its raw balance credited at
//! `tokenless_production` percent, topped up by its share of voting power:
//!
//! ```text
//! limit   = l·t/100 + L·ve/S·(100 − t)/100
//! working = min(l, limit)
//! ```
//!
//! with `l` the raw balance, `L` total staked, `ve` the account's adjusted
//! voting power and `S` the voting-power supply. Operations are performed in
//! exactly this order so results match integer expectations.

use sluice_core::AccountId;
use sluice_core::error::MathError;
use sluice_core::math::{add, mul_div};

pub fn working_balance(
    balance: u128,
    total_staked: u128,
    voting_power: u128,
    voting_supply: u128,
    tokenless_production: u128,
) -> Result<u128, MathError> {
    let mut limit = mul_div(balance, tokenless_production, 100)?;
    if voting_supply > 0 {
        // a share above the whole supply cannot boost further
        let voting_power = voting_power.min(voting_supply);
        let boosted = mul_div(total_staked, voting_power, voting_supply)?;
        limit = add(limit, mul_div(boosted, 100 - tokenless_production, 100)?)?;
    }
    Ok(limit.min(balance))
}

/// Split a group's capped working balance back over its members pro rata to
/// their raw balances. Each share is `<=` the member's balance.
pub fn split_pro_rata(
    members: &[(AccountId, u128)],
    capped: u128,
) -> Result<Vec<(AccountId, u128)>, MathError> {
    let combined = members
        .iter()
        .try_fold(0u128, |acc, (_, balance)| add(acc, *balance))?;
    members
        .iter()
        .map(|(account, balance)| {
            let share = if combined == 0 {
                0
            } else {
                mul_div(capped, *balance, combined)?
            };
            Ok((*account, share))
        })
        .collect()
}
