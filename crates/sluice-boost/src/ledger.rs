//! The boost ledger.
//!
//! Delegators lend part of their voting-escrow power to receivers until a
//! week-aligned end time. Each boost decays linearly to zero at its end.
//! Per account the ledger keeps two aggregates (power delegated away and
//! power received) so balances are O(log n) reads regardless of how many
//! boosts are live:
//!
//! - `delegated(a, t) == Σ remaining(boost from a, t)`
//! - `received(a, t) == Σ remaining(boost into a, t)`
//!
//! Boost records are append-only; cancellation ([`BoostLedger::unboost`])
//! only bumps the record's cancelled amount and slope.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::constants::{UNLIMITED_ALLOWANCE, is_week_aligned};
use sluice_core::error::BoostError;
use sluice_core::math;
use sluice_core::traits::VotingEscrow;
use sluice_core::{AccountId, Context};

use crate::decay::{self, LinearDecay, SlopeChanges};
use crate::events::{Aggregate, BoostEvent};
use crate::permit::Permit;

/// A single delegation from `delegator` to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boost {
    pub delegator: AccountId,
    pub receiver: AccountId,
    pub start_time: u64,
    pub end_time: u64,
    /// Amount requested at creation; the live bias may be smaller by truncation dust.
    pub initial_amount: u128,
    /// Sum of all cancelled amounts.
    pub cancel_amount: u128,
    pub slope: u128,
    pub cancelled_slope: u128,
}

impl Boost {
    /// Initial delegated value: `slope · (end − start)`.
    pub fn bias(&self) -> u128 {
        self.slope * (self.end_time - self.start_time) as u128
    }

    /// Value still delegated at `t`.
    pub fn remaining(&self, t: u64) -> u128 {
        if t >= self.end_time {
            return 0;
        }
        let from = t.max(self.start_time);
        self.slope.saturating_sub(self.cancelled_slope) * (self.end_time - from) as u128
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.end_time <= now
    }
}

/// Both aggregates of one account and their slope-change schedules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBoostState {
    pub delegated: LinearDecay,
    pub received: LinearDecay,
    pub delegated_changes: SlopeChanges,
    pub received_changes: SlopeChanges,
}

impl AccountBoostState {
    pub fn delegated_at(&self, now: u64) -> LinearDecay {
        self.delegated.advance(now, &self.delegated_changes)
    }

    pub fn received_at(&self, now: u64) -> LinearDecay {
        self.received.advance(now, &self.received_changes)
    }

    /// Persist the delegated aggregate at `now`; returns the decayed-away quantity.
    fn settle_delegated(&mut self, now: u64) -> u128 {
        settle(&mut self.delegated, &mut self.delegated_changes, now)
    }

    fn settle_received(&mut self, now: u64) -> u128 {
        settle(&mut self.received, &mut self.received_changes, now)
    }
}

fn settle(point: &mut LinearDecay, changes: &mut SlopeChanges, now: u64) -> u128 {
    let advanced = point.advance(now, changes);
    let burned = point.bias.saturating_sub(advanced.bias);
    *point = advanced;
    decay::prune(changes, now);
    burned
}

/// Serializable contents of a [`BoostLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostLedgerState {
    pub accounts: BTreeMap<AccountId, AccountBoostState>,
    pub boosts: BTreeMap<AccountId, Vec<Boost>>,
    /// owner → spender → allowance
    pub allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
    pub nonces: BTreeMap<AccountId, u64>,
}

pub struct BoostLedger {
    escrow: Arc<dyn VotingEscrow>,
    state: BoostLedgerState,
    events: Vec<BoostEvent>,
}

impl std::fmt::Debug for BoostLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostLedger")
            .field("accounts", &self.state.accounts.len())
            .field("delegators", &self.state.boosts.len())
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl BoostLedger {
    pub fn new(escrow: Arc<dyn VotingEscrow>) -> Self {
        Self::with_state(escrow, BoostLedgerState::default())
    }

    /// Resume from previously persisted state.
    pub fn with_state(escrow: Arc<dyn VotingEscrow>, state: BoostLedgerState) -> Self {
        Self {
            escrow,
            state,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &BoostLedgerState {
        &self.state
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<BoostEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    fn account(&self, account: &AccountId) -> AccountBoostState {
        self.state.accounts.get(account).cloned().unwrap_or_default()
    }

    /// Voting-escrow power before any delegation.
    pub fn own_balance(&self, account: &AccountId, now: u64) -> u128 {
        self.escrow.balance_of(account, now)
    }

    pub fn delegated_balance(&self, account: &AccountId, now: u64) -> u128 {
        self.state
            .accounts
            .get(account)
            .map_or(0, |s| s.delegated_at(now).bias)
    }

    pub fn received_balance(&self, account: &AccountId, now: u64) -> u128 {
        self.state
            .accounts
            .get(account)
            .map_or(0, |s| s.received_at(now).bias)
    }

    /// `own − delegated + received`, floored at zero.
    pub fn adjusted_balance(&self, account: &AccountId, now: u64) -> u128 {
        self.delegable_balance(account, now)
            .saturating_add(self.received_balance(account, now))
    }

    /// `own − delegated`, floored at zero. Received power cannot be re-delegated.
    pub fn delegable_balance(&self, account: &AccountId, now: u64) -> u128 {
        self.own_balance(account, now)
            .saturating_sub(self.delegated_balance(account, now))
    }

    pub fn total_supply(&self, now: u64) -> u128 {
        self.escrow.total_supply(now)
    }

    pub fn boosts_of(&self, delegator: &AccountId) -> &[Boost] {
        self.state
            .boosts
            .get(delegator)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get_boost(&self, delegator: &AccountId, index: usize) -> Option<&Boost> {
        self.boosts_of(delegator).get(index)
    }

    pub fn boost_count(&self, delegator: &AccountId) -> usize {
        self.boosts_of(delegator).len()
    }

    pub fn remaining(
        &self,
        delegator: &AccountId,
        index: usize,
        now: u64,
    ) -> Result<u128, BoostError> {
        self.boost_at(delegator, index).map(|b| b.remaining(now))
    }

    fn boost_at(&self, delegator: &AccountId, index: usize) -> Result<&Boost, BoostError> {
        let boosts = self.boosts_of(delegator);
        boosts.get(index).ok_or(BoostError::IndexOutOfBound {
            index,
            len: boosts.len(),
        })
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.state
            .allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Nonce the next permit from `owner` must be signed over.
    pub fn nonce(&self, owner: &AccountId) -> u64 {
        self.state.nonces.get(owner).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Delegation
    // ------------------------------------------------------------------

    /// Delegate `amount` of the sender's power to `receiver` until `end_time`.
    /// Returns the new boost's index in the sender's list.
    pub fn boost(
        &mut self,
        ctx: &Context,
        receiver: AccountId,
        amount: u128,
        end_time: u64,
    ) -> Result<usize, BoostError> {
        self.delegate(ctx.now, ctx.sender, receiver, amount, end_time)
            .map(|(index, _)| index)
    }

    /// Delegate on behalf of `owner`, spending the sender's allowance.
    ///
    /// The allowance is reduced by the delegated bias, which may be slightly
    /// less than `amount`. An unlimited allowance is never reduced.
    pub fn boost_from(
        &mut self,
        ctx: &Context,
        owner: AccountId,
        receiver: AccountId,
        amount: u128,
        end_time: u64,
    ) -> Result<usize, BoostError> {
        let allowance = self.allowance(&owner, &ctx.sender);
        if allowance < amount {
            return Err(BoostError::InsufficientAllowance {
                allowance,
                needed: amount,
            });
        }
        let (index, bias) = self.delegate(ctx.now, owner, receiver, amount, end_time)?;
        if allowance != UNLIMITED_ALLOWANCE {
            self.set_allowance(owner, ctx.sender, allowance - bias);
        }
        Ok(index)
    }

    fn delegate(
        &mut self,
        now: u64,
        delegator: AccountId,
        receiver: AccountId,
        amount: u128,
        end_time: u64,
    ) -> Result<(usize, u128), BoostError> {
        if amount == 0 {
            return Err(BoostError::BoostZeroAmount);
        }
        if end_time <= now {
            return Err(BoostError::EndTimeSmallerThanCurrentTimestamp { end_time, now });
        }
        if !is_week_aligned(end_time) {
            return Err(BoostError::EndTimeNotAlignedWithWeek(end_time));
        }
        let lock_end = self.escrow.unlock_time(&delegator);
        if end_time > lock_end {
            return Err(BoostError::EndTimeExceedLockEnd { end_time, lock_end });
        }
        let available = self.delegable_balance(&delegator, now);
        if amount > available {
            return Err(BoostError::BoostExceedBalance {
                requested: amount,
                available,
            });
        }

        let duration = (end_time - now) as u128;
        let slope = amount / duration;
        if slope == 0 {
            return Err(BoostError::BoostZeroAmount);
        }
        let bias = slope * duration;

        let mut from = self.account(&delegator);
        let mut to = (receiver != delegator).then(|| self.account(&receiver));
        let mut events = Vec::new();

        let burned = from.settle_delegated(now);
        push_burn(&mut events, delegator, Aggregate::Delegated, burned);
        from.delegated = from.delegated.combine(bias, slope)?;
        decay::schedule_drop(&mut from.delegated_changes, end_time, slope)?;

        {
            let target = to.as_mut().unwrap_or(&mut from);
            let burned = target.settle_received(now);
            push_burn(&mut events, receiver, Aggregate::Received, burned);
            target.received = target.received.combine(bias, slope)?;
            decay::schedule_drop(&mut target.received_changes, end_time, slope)?;
        }

        let record = Boost {
            delegator,
            receiver,
            start_time: now,
            end_time,
            initial_amount: amount,
            cancel_amount: 0,
            slope,
            cancelled_slope: 0,
        };
        let list = self.state.boosts.entry(delegator).or_default();
        let index = list.len();
        list.push(record);
        self.state.accounts.insert(delegator, from);
        if let Some(to) = to {
            self.state.accounts.insert(receiver, to);
        }

        debug!(
            delegator = %delegator.short(),
            receiver = %receiver.short(),
            index,
            bias,
            slope,
            end_time,
            "boost: delegated"
        );
        events.push(BoostEvent::Boost {
            delegator,
            receiver,
            index,
            bias,
            slope,
            start_time: now,
            end_time,
        });
        self.events.extend(events);
        Ok((index, bias))
    }

    /// Cancel `amount` of the remaining value of `delegator`'s boost at `index`.
    ///
    /// Only the boost's receiver may cancel. The cancelled value leaves both
    /// aggregates immediately; the slope cut is `amount / (end − now)`.
    pub fn unboost(
        &mut self,
        ctx: &Context,
        delegator: AccountId,
        index: usize,
        amount: u128,
    ) -> Result<(), BoostError> {
        let now = ctx.now;
        let mut record = self.boost_at(&delegator, index)?.clone();
        if ctx.sender != record.receiver {
            return Err(BoostError::OnlyCancelByReceiver);
        }
        if record.is_expired(now) {
            return Err(BoostError::CancelExpiredBoost);
        }
        let remaining = record.remaining(now);
        if amount > remaining {
            return Err(BoostError::CancelBoostExceedBalance {
                requested: amount,
                remaining,
            });
        }

        let duration = (record.end_time - now) as u128;
        let slope_cut = amount / duration;
        let bias_cut = slope_cut * duration;
        let receiver = record.receiver;

        record.cancel_amount = math::add(record.cancel_amount, amount)?;
        record.cancelled_slope = math::add(record.cancelled_slope, slope_cut)?;

        let mut from = self.account(&delegator);
        let mut to = (receiver != delegator).then(|| self.account(&receiver));
        let mut events = Vec::new();

        let burned = from.settle_delegated(now);
        push_burn(&mut events, delegator, Aggregate::Delegated, burned);
        from.delegated = from.delegated.sub(bias_cut, slope_cut);
        decay::cancel_drop(&mut from.delegated_changes, record.end_time, slope_cut);

        {
            let target = to.as_mut().unwrap_or(&mut from);
            let burned = target.settle_received(now);
            push_burn(&mut events, receiver, Aggregate::Received, burned);
            target.received = target.received.sub(bias_cut, slope_cut);
            decay::cancel_drop(&mut target.received_changes, record.end_time, slope_cut);
        }

        if let Some(slot) = self
            .state
            .boosts
            .get_mut(&delegator)
            .and_then(|list| list.get_mut(index))
        {
            *slot = record;
        }
        self.state.accounts.insert(delegator, from);
        if let Some(to) = to {
            self.state.accounts.insert(receiver, to);
        }

        debug!(
            delegator = %delegator.short(),
            receiver = %receiver.short(),
            index,
            amount,
            slope_cut,
            "boost: cancelled"
        );
        events.push(BoostEvent::Unboost {
            delegator,
            receiver,
            index,
            amount,
            slope_cut,
        });
        self.events.extend(events);
        Ok(())
    }

    /// Persist `account`'s aggregates at `ctx.now`.
    pub fn checkpoint(&mut self, ctx: &Context, account: AccountId) {
        let mut state = self.account(&account);
        let delegated = state.settle_delegated(ctx.now);
        let received = state.settle_received(ctx.now);
        push_burn(&mut self.events, account, Aggregate::Delegated, delegated);
        push_burn(&mut self.events, account, Aggregate::Received, received);
        self.state.accounts.insert(account, state);
    }

    // ------------------------------------------------------------------
    // Allowances
    // ------------------------------------------------------------------

    pub fn approve(
        &mut self,
        ctx: &Context,
        spender: AccountId,
        value: u128,
    ) -> Result<(), BoostError> {
        if spender.is_zero() {
            return Err(BoostError::ApproveToZeroAddress);
        }
        self.set_allowance(ctx.sender, spender, value);
        Ok(())
    }

    pub fn increase_allowance(
        &mut self,
        ctx: &Context,
        spender: AccountId,
        added: u128,
    ) -> Result<(), BoostError> {
        if spender.is_zero() {
            return Err(BoostError::ApproveToZeroAddress);
        }
        let value = self.allowance(&ctx.sender, &spender).saturating_add(added);
        self.set_allowance(ctx.sender, spender, value);
        Ok(())
    }

    pub fn decrease_allowance(
        &mut self,
        ctx: &Context,
        spender: AccountId,
        subtracted: u128,
    ) -> Result<(), BoostError> {
        if spender.is_zero() {
            return Err(BoostError::ApproveToZeroAddress);
        }
        let allowance = self.allowance(&ctx.sender, &spender);
        if allowance < subtracted {
            return Err(BoostError::AllowanceBelowZero {
                allowance,
                decrease: subtracted,
            });
        }
        self.set_allowance(ctx.sender, spender, allowance - subtracted);
        Ok(())
    }

    /// Apply a signed approval. Anyone may submit it; the owner's nonce advances.
    pub fn permit(&mut self, ctx: &Context, permit: &Permit) -> Result<(), BoostError> {
        if permit.deadline < ctx.now {
            return Err(BoostError::ExpiredDeadline {
                deadline: permit.deadline,
                now: ctx.now,
            });
        }
        if permit.spender.is_zero() {
            return Err(BoostError::ApproveToZeroAddress);
        }
        let nonce = self.nonce(&permit.owner);
        permit.verify(nonce)?;
        self.state
            .nonces
            .insert(permit.owner, nonce.saturating_add(1));
        self.set_allowance(permit.owner, permit.spender, permit.value);
        Ok(())
    }

    fn set_allowance(&mut self, owner: AccountId, spender: AccountId, value: u128) {
        self.state
            .allowances
            .entry(owner)
            .or_default()
            .insert(spender, value);
        self.events.push(BoostEvent::Approval {
            owner,
            spender,
            value,
        });
    }
}

fn push_burn(events: &mut Vec<BoostEvent>, account: AccountId, aggregate: Aggregate, amount: u128) {
    if amount > 0 {
        events.push(BoostEvent::Burn {
            account,
            aggregate,
            amount,
        });
    }
}
