//! Reward integrals.
//!
//! Pure functions advancing the primary snapshot and secondary token states
//! to `now`, plus the per-account settlement rules. The gauge calls these
//! with pre-change working balances and totals.

use sluice_core::AccountId;
use sluice_core::constants::{SCALE, next_week, week_start};
use sluice_core::error::MathError;
use sluice_core::math::{add, mul_div, mul_mul_div};
use sluice_core::traits::{GaugeWeights, InflationSchedule};

use crate::state::{FractionCheckpoint, GaugeSnapshot, RewardTokenState, UserRewardSnapshot};

/// Advance the primary integral from `snapshot.timestamp` to `now`.
///
/// The interval is integrated piecewise, splitting at every week boundary
/// (weights change weekly), at the gauge's activation timestamp (weight is
/// zero before it) and at every inflation-epoch boundary (the rate is
/// refreshed from `schedule` once the boundary is reached). A killed gauge
/// only moves the timestamp.
pub fn advance_primary(
    snapshot: &GaugeSnapshot,
    now: u64,
    working_supply: u128,
    killed: bool,
    gauge: &AccountId,
    schedule: &dyn InflationSchedule,
    weights: &dyn GaugeWeights,
) -> Result<GaugeSnapshot, MathError> {
    let mut s = *snapshot;
    if now <= s.timestamp {
        return Ok(s);
    }
    if killed {
        s.timestamp = now;
        return Ok(s);
    }

    let activation = weights.activation_timestamp(gauge);
    let mut t = s.timestamp;
    while t < now {
        refresh_epoch(&mut s, t, schedule);

        let mut end = next_week(t).min(now);
        if t < activation && activation < end {
            end = activation;
        }
        if t < s.future_epoch_time && s.future_epoch_time < end {
            end = s.future_epoch_time;
        }

        if working_supply > 0 && t >= activation && s.inflation_rate > 0 {
            let weight = weights.relative_weight(gauge, week_start(t));
            let dt = (end - t) as u128;
            let delta = mul_mul_div(s.inflation_rate, weight, dt, working_supply)?;
            s.integral = add(s.integral, delta)?;
        }
        t = end;
    }
    refresh_epoch(&mut s, now, schedule);
    s.timestamp = now;
    Ok(s)
}

/// Roll the inflation rate forward over every boundary at or before `t`.
fn refresh_epoch(s: &mut GaugeSnapshot, t: u64, schedule: &dyn InflationSchedule) {
    while s.future_epoch_time <= t {
        let boundary = s.future_epoch_time;
        s.inflation_rate = schedule.rate(boundary);
        let next = schedule.next_epoch_boundary(boundary);
        s.future_epoch_time = if next > boundary { next } else { u64::MAX };
    }
}

/// Advance a secondary token's integral to `now`.
///
/// Linear drips accrue over `min(now, finish_at) − last_update`. Nothing
/// accrues while nothing is staked; that part of the drip is forfeited.
/// Unregistered tokens are frozen.
pub fn advance_reward(
    token: &RewardTokenState,
    now: u64,
    total_staked: u128,
) -> Result<RewardTokenState, MathError> {
    let mut r = *token;
    if !r.active || now <= r.last_update {
        return Ok(r);
    }
    let until = now.min(r.finish_at);
    if until > r.last_update && total_staked > 0 && r.rate > 0 {
        let dt = (until - r.last_update) as u128;
        let delta = mul_mul_div(r.rate, dt, SCALE, total_staked)?;
        r.integral = add(r.integral, delta)?;
    }
    r.last_update = now;
    Ok(r)
}

/// Credit `working · (integral − checkpoint) / SCALE` of primary reward.
pub fn settle_primary(
    checkpoint: &mut FractionCheckpoint,
    working_balance: u128,
    integral: u128,
) -> Result<(), MathError> {
    let delta = integral.saturating_sub(checkpoint.checkpoint_integral);
    if delta > 0 && working_balance > 0 {
        let earned = mul_div(working_balance, delta, SCALE)?;
        checkpoint.accumulated = add(checkpoint.accumulated, earned)?;
    }
    checkpoint.checkpoint_integral = integral;
    Ok(())
}

/// Credit `balance · (integral − checkpoint) / SCALE` of a secondary token.
pub fn settle_reward(
    snapshot: &mut UserRewardSnapshot,
    balance: u128,
    integral: u128,
) -> Result<(), MathError> {
    let delta = integral.saturating_sub(snapshot.checkpoint_integral);
    if delta > 0 && balance > 0 {
        let earned = mul_div(balance, delta, SCALE)?;
        snapshot.pending = add(snapshot.pending, earned)?;
    }
    snapshot.checkpoint_integral = integral;
    Ok(())
}
