//! The liquidity gauge.
//!
//! A [`Gauge`] tracks staked balances, converts them to boost-weighted
//! working balances, and accrues the primary reward integral and any
//! secondary reward integrals over time.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. advance the global integrals to `now` with the pre-change totals,
//! 2. settle every account whose accrual is about to change,
//! 3. apply the change,
//! 4. recompute working balances for every affected sharing group,
//! 5. call out to the token ledger or liquidity manager.
//!
//! Steps 1-4 run on gauge state only and are rolled back on any error. Step 5
//! runs with the gauge locked; a collaborator calling back in gets
//! [`GaugeError::Reentrant`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use sluice_core::config::GaugeConfig;
use sluice_core::error::{ConfigError, GaugeError, TokenError};
use sluice_core::math::add;
use sluice_core::traits::{GaugeWeights, InflationSchedule, LiquidityManager, TokenLedger, VotingPower};
use sluice_core::{AccountId, Context, TokenId};

use crate::custody::Custody;
use crate::events::GaugeEvent;
use crate::integral;
use crate::state::{AccountState, GaugeSnapshot, GaugeState};
use crate::working::{split_pro_rata, working_balance};

/// Everything a gauge reads from or moves funds through.
#[derive(Clone)]
pub struct Collaborators {
    pub voting: Arc<dyn VotingPower>,
    pub schedule: Arc<dyn InflationSchedule>,
    pub weights: Arc<dyn GaugeWeights>,
    pub tokens: Arc<dyn TokenLedger>,
}

pub struct Gauge {
    id: AccountId,
    admin: AccountId,
    staking_token: TokenId,
    config: GaugeConfig,
    pub(crate) collab: Collaborators,
    custody: Custody,
    pub(crate) state: GaugeState,
    pub(crate) events: Vec<GaugeEvent>,
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge")
            .field("id", &self.id)
            .field("admin", &self.admin)
            .field("staking_token", &self.staking_token)
            .field("custody", &self.custody)
            .field("total_staked", &self.state.total_staked)
            .field("working_supply", &self.state.working_supply)
            .finish_non_exhaustive()
    }
}

impl Gauge {
    /// Create an empty gauge whose integrals start at `now`.
    pub fn new(
        id: AccountId,
        admin: AccountId,
        staking_token: TokenId,
        config: GaugeConfig,
        collab: Collaborators,
        now: u64,
    ) -> Result<Self, ConfigError> {
        let snapshot = GaugeSnapshot {
            timestamp: now,
            integral: 0,
            inflation_rate: collab.schedule.rate(now),
            future_epoch_time: collab.schedule.next_epoch_boundary(now),
        };
        let state = GaugeState {
            snapshot,
            ..GaugeState::default()
        };
        Self::with_state(id, admin, staking_token, config, collab, state)
    }

    /// Restore a gauge from previously saved state.
    pub fn with_state(
        id: AccountId,
        admin: AccountId,
        staking_token: TokenId,
        config: GaugeConfig,
        collab: Collaborators,
        state: GaugeState,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            admin,
            staking_token,
            config,
            collab,
            custody: Custody::Direct,
            state,
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    pub fn staking_token(&self) -> TokenId {
        self.staking_token
    }

    pub fn config(&self) -> &GaugeConfig {
        &self.config
    }

    pub fn custody(&self) -> &Custody {
        &self.custody
    }

    pub fn state(&self) -> &GaugeState {
        &self.state
    }

    pub fn snapshot(&self) -> GaugeSnapshot {
        self.state.snapshot
    }

    /// Drain the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<GaugeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.state.account(account).map_or(0, |a| a.balance)
    }

    pub fn working_balance_of(&self, account: &AccountId) -> u128 {
        self.state.account(account).map_or(0, |a| a.working_balance)
    }

    pub fn total_staked(&self) -> u128 {
        self.state.total_staked
    }

    pub fn working_supply(&self) -> u128 {
        self.state.working_supply
    }

    /// Primary reward attributed to `account` as of its last checkpoint.
    pub fn accumulated_fraction(&self, account: &AccountId) -> u128 {
        self.state.account(account).map_or(0, |a| a.primary.accumulated)
    }

    pub fn voting_power_at_checkpoint(&self, account: &AccountId) -> u128 {
        self.state
            .account(account)
            .map_or(0, |a| a.voting_power_at_checkpoint)
    }

    pub fn is_killed(&self) -> bool {
        self.state.killed
    }

    pub fn is_sharing_permitted(&self, owner: &AccountId, staker: &AccountId) -> bool {
        self.state.sharing.is_permitted(owner, staker)
    }

    pub fn accepted_owner(&self, staker: &AccountId) -> Option<AccountId> {
        self.state.sharing.owner_of(staker)
    }

    pub fn shared_balance(&self, owner: &AccountId) -> u128 {
        self.state.sharing.shared_balance(owner)
    }

    // ------------------------------------------------------------------
    // Staking
    // ------------------------------------------------------------------

    /// Stake `amount` from the caller on behalf of `receiver` (default: caller).
    ///
    /// With `use_manager` set and an active liquidity manager installed, the
    /// tokens are forwarded to the manager after they arrive.
    pub fn deposit(
        &mut self,
        ctx: &Context,
        amount: u128,
        receiver: Option<AccountId>,
        use_manager: bool,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            if amount == 0 {
                return Err(GaugeError::DepositZeroAmount);
            }
            let receiver = receiver.unwrap_or(ctx.sender);
            g.regroup(ctx.now, &[receiver], |g| {
                let entry = g.state.accounts.entry(receiver).or_default();
                entry.balance = add(entry.balance, amount)?;
                g.state.total_staked = add(g.state.total_staked, amount)?;
                g.state.sharing.credit(&receiver, amount)
            })?;

            g.call_out(|g| {
                g.collab
                    .tokens
                    .transfer(&g.staking_token, &ctx.sender, &g.id, amount)?;
                if let Some(manager) = g.custody.active_manager().filter(|_| use_manager) {
                    if let Err(e) = g.forward_to_manager(manager, &receiver, amount) {
                        g.unwind(&g.staking_token, &g.id, &ctx.sender, amount);
                        return Err(e);
                    }
                }
                Ok(())
            })?;

            debug!(
                gauge = %g.id.short(),
                account = %receiver.short(),
                amount,
                working = g.working_balance_of(&receiver),
                "gauge: deposit"
            );
            g.events.push(GaugeEvent::Deposit {
                sender: ctx.sender,
                account: receiver,
                amount,
            });
            Ok(())
        })
    }

    /// Unstake `amount` of the caller's balance and pay it to `receiver`
    /// (default: caller).
    ///
    /// The gauge pays from its own holdings when they cover the amount and
    /// otherwise asks the active liquidity manager to deliver.
    pub fn withdraw(
        &mut self,
        ctx: &Context,
        amount: u128,
        receiver: Option<AccountId>,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            if amount == 0 {
                return Err(GaugeError::WithdrawZeroAmount);
            }
            let account = ctx.sender;
            let receiver = receiver.unwrap_or(account);
            let have = g.balance_of(&account);
            if have < amount {
                return Err(GaugeError::InsufficientBalance { have, need: amount });
            }
            g.regroup(ctx.now, &[account], |g| {
                let entry = g.state.accounts.entry(account).or_default();
                entry.balance -= amount;
                g.state.total_staked = g.state.total_staked.saturating_sub(amount);
                g.state.sharing.debit(&account, amount);
                Ok(())
            })?;

            g.call_out(|g| g.pay_out(&receiver, amount))?;

            debug!(
                gauge = %g.id.short(),
                account = %account.short(),
                receiver = %receiver.short(),
                amount,
                "gauge: withdraw"
            );
            g.events.push(GaugeEvent::Withdraw {
                account,
                receiver,
                amount,
            });
            Ok(())
        })
    }

    /// Move staked balance between accounts without touching the underlying tokens.
    pub fn transfer_stake(
        &mut self,
        ctx: &Context,
        to: AccountId,
        amount: u128,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            if to.is_zero() {
                return Err(TokenError::ZeroAccount.into());
            }
            let from = ctx.sender;
            let have = g.balance_of(&from);
            if have < amount {
                return Err(GaugeError::InsufficientBalance { have, need: amount });
            }
            if amount > 0 && from != to {
                g.regroup(ctx.now, &[from, to], |g| {
                    let source = g.state.accounts.entry(from).or_default();
                    source.balance -= amount;
                    g.state.sharing.debit(&from, amount);
                    let dest = g.state.accounts.entry(to).or_default();
                    dest.balance = add(dest.balance, amount)?;
                    g.state.sharing.credit(&to, amount)
                })?;
            }
            g.events.push(GaugeEvent::Transfer { from, to, amount });
            Ok(())
        })
    }

    /// Settle `account` and refresh its group's working balances.
    /// Returns the account's accumulated primary reward.
    pub fn user_checkpoint(&mut self, ctx: &Context, account: AccountId) -> Result<u128, GaugeError> {
        self.atomically(|g| {
            g.regroup(ctx.now, &[account], |_| Ok(()))?;
            Ok(g.accumulated_fraction(&account))
        })
    }

    /// Recompute the working balance of an account whose voting power
    /// dropped since its last checkpoint.
    ///
    /// Fails with [`GaugeError::KickNotAllowed`] while the group owner still
    /// holds voting power at least as large as recorded, and with
    /// [`GaugeError::KickNotNeeded`] if the recomputed working balance would
    /// not shrink.
    pub fn kick(&mut self, ctx: &Context, account: AccountId) -> Result<(), GaugeError> {
        self.atomically(|g| {
            let now = ctx.now;
            let (owner, members) = g.state.sharing.group(&account);
            let voting = &g.collab.voting;
            let own = voting.own_balance_of(&owner, now);
            let adjusted = voting.adjusted_balance_of(&owner, now);
            if own > 0 && adjusted >= g.voting_power_at_checkpoint(&account) {
                return Err(GaugeError::KickNotAllowed);
            }
            let supply = voting.total_supply(now);
            let fresh = g
                .group_working(&members, adjusted, supply)?
                .into_iter()
                .find(|(member, _)| *member == account)
                .map_or(0, |(_, working)| working);
            if fresh >= g.working_balance_of(&account) {
                return Err(GaugeError::KickNotNeeded);
            }
            g.regroup(now, &[account], |_| Ok(()))?;
            info!(gauge = %g.id.short(), account = %account.short(), fresh, "gauge: kicked");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Freeze primary accrual from `now` on. Secondary rewards are unaffected.
    pub fn disable_gauge(&mut self, ctx: &Context) -> Result<(), GaugeError> {
        self.atomically(|g| {
            g.require_admin(ctx)?;
            g.checkpoint_globals(ctx.now)?;
            g.state.killed = true;
            info!(gauge = %g.id.short(), at = ctx.now, "gauge: disabled");
            g.events.push(GaugeEvent::GaugeDisabled { at: ctx.now });
            Ok(())
        })
    }

    /// Install, replace or remove the liquidity manager.
    ///
    /// The current manager must have been deactivated first. A new manager
    /// must be active and receives everything the gauge currently holds.
    /// Removing the manager requires the gauge to hold the full stake again.
    pub fn set_liquidity_manager(
        &mut self,
        ctx: &Context,
        manager: Option<Arc<dyn LiquidityManager>>,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            g.require_admin(ctx)?;
            if g.custody.manager().is_some_and(|current| current.is_active()) {
                return Err(GaugeError::ManagerStillActive);
            }
            match &manager {
                Some(next) if !next.is_active() => return Err(GaugeError::ManagerNotActive),
                Some(_) => {}
                None => {
                    let held = g.held();
                    if held < g.state.total_staked {
                        return Err(GaugeError::ManagerHoldsFunds {
                            held,
                            staked: g.state.total_staked,
                        });
                    }
                }
            }

            if let Some(next) = &manager {
                g.call_out(|g| {
                    let held = g.held();
                    if held > 0 {
                        g.forward_to_manager(next, &g.id, held)?;
                    }
                    Ok(())
                })?;
            }

            let previous = g.custody.manager_address();
            let current = manager.as_ref().map(|m| m.address());
            g.custody = manager.map_or(Custody::Direct, Custody::Managed);
            info!(
                gauge = %g.id.short(),
                previous = ?previous.map(|a| a.short()),
                current = ?current.map(|a| a.short()),
                "gauge: liquidity manager changed"
            );
            g.events
                .push(GaugeEvent::LiquidityManagerChanged { previous, current });
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Vote sharing
    // ------------------------------------------------------------------

    /// Caller permits `staker` to share its voting power, or revokes the
    /// permission. Returns whether sharing is now permitted.
    pub fn toggle_vote_sharing(&mut self, ctx: &Context, staker: AccountId) -> Result<bool, GaugeError> {
        self.atomically(|g| {
            let owner = ctx.sender;
            let balance = g.balance_of(&staker);
            let enabled = g.regroup(ctx.now, &[owner, staker], |g| {
                g.state.sharing.toggle(owner, staker, balance)
            })?;
            debug!(owner = %owner.short(), staker = %staker.short(), enabled, "gauge: vote sharing toggled");
            g.events.push(GaugeEvent::ShareVote {
                owner,
                staker,
                enabled,
            });
            Ok(enabled)
        })
    }

    /// Caller joins `owner`'s sharing group, leaving any previous one.
    pub fn accept_shared_vote(&mut self, ctx: &Context, owner: AccountId) -> Result<(), GaugeError> {
        self.atomically(|g| {
            let staker = ctx.sender;
            if g.state.sharing.owner_of(&staker) == Some(owner) {
                return Ok(());
            }
            let balance = g.balance_of(&staker);
            g.regroup(ctx.now, &[staker, owner], |g| {
                g.state.sharing.accept(staker, owner, balance)
            })?;
            g.events.push(GaugeEvent::AcceptSharedVote { staker, owner });
            Ok(())
        })
    }

    /// Caller leaves its sharing group. Returns the owner it left.
    pub fn reject_shared_vote(&mut self, ctx: &Context) -> Result<AccountId, GaugeError> {
        self.atomically(|g| {
            let staker = ctx.sender;
            if g.state.sharing.owner_of(&staker).is_none() {
                return Err(GaugeError::NotSharingVote);
            }
            let balance = g.balance_of(&staker);
            let owner = g.regroup(ctx.now, &[staker], |g| g.state.sharing.reject(staker, balance))?;
            g.events.push(GaugeEvent::RejectSharedVote { staker, owner });
            Ok(owner)
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn require_admin(&self, ctx: &Context) -> Result<(), GaugeError> {
        if ctx.sender != self.admin {
            return Err(GaugeError::Unauthorized);
        }
        Ok(())
    }

    /// Run `op` against the gauge, restoring state and events if it fails.
    pub(crate) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, GaugeError>,
    ) -> Result<T, GaugeError> {
        if self.state.locked {
            warn!(gauge = %self.id.short(), "gauge: re-entrant call rejected");
            return Err(GaugeError::Reentrant);
        }
        let saved = self.state.clone();
        let mark = self.events.len();
        let result = op(self);
        if result.is_err() {
            self.state = saved;
            self.events.truncate(mark);
        }
        result
    }

    /// Call collaborators with the gauge locked.
    pub(crate) fn call_out<T>(
        &mut self,
        call: impl FnOnce(&Self) -> Result<T, GaugeError>,
    ) -> Result<T, GaugeError> {
        self.state.locked = true;
        let result = call(self);
        self.state.locked = false;
        result
    }

    /// Staking tokens sitting in the gauge's own account.
    fn held(&self) -> u128 {
        self.collab.tokens.balance_of(&self.staking_token, &self.id)
    }

    /// Move `amount` staked tokens to `manager` and notify it. A refused
    /// notification returns the tokens to the gauge.
    fn forward_to_manager(
        &self,
        manager: &Arc<dyn LiquidityManager>,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), GaugeError> {
        let tokens = &*self.collab.tokens;
        let address = manager.address();
        tokens.transfer(&self.staking_token, &self.id, &address, amount)?;
        if let Err(e) = manager.on_deposit(tokens, account, amount, true) {
            self.unwind(&self.staking_token, &address, &self.id, amount);
            return Err(e.into());
        }
        Ok(())
    }

    /// Reverse a transfer made earlier in the same operation.
    pub(crate) fn unwind(&self, token: &TokenId, from: &AccountId, to: &AccountId, amount: u128) {
        if let Err(e) = self.collab.tokens.transfer(token, from, to, amount) {
            warn!(
                gauge = %self.id.short(),
                token = %token.short(),
                from = %from.short(),
                to = %to.short(),
                amount,
                error = %e,
                "gauge: unwind transfer failed"
            );
        }
    }

    fn pay_out(&self, receiver: &AccountId, amount: u128) -> Result<(), GaugeError> {
        let tokens = &*self.collab.tokens;
        let held = self.held();
        if held >= amount {
            tokens.transfer(&self.staking_token, &self.id, receiver, amount)?;
            return Ok(());
        }
        match self.custody.active_manager() {
            Some(manager) => Ok(manager.on_withdraw(tokens, receiver, amount)?),
            None => {
                warn!(gauge = %self.id.short(), held, amount, "gauge: custody shortfall");
                Err(GaugeError::CustodyShortfall {
                    available: held,
                    needed: amount,
                })
            }
        }
    }

    /// Advance the primary and secondary integrals to `now`.
    pub(crate) fn checkpoint_globals(&mut self, now: u64) -> Result<(), GaugeError> {
        let s = &mut self.state;
        s.snapshot = integral::advance_primary(
            &s.snapshot,
            now,
            s.working_supply,
            s.killed,
            &self.id,
            &*self.collab.schedule,
            &*self.collab.weights,
        )?;
        for reward in s.reward_tokens.values_mut() {
            *reward = integral::advance_reward(reward, now, s.total_staked)?;
        }
        Ok(())
    }

    /// Settle `account` against the current integrals.
    pub(crate) fn checkpoint_account(&mut self, account: &AccountId) -> Result<(), GaugeError> {
        let GaugeState {
            snapshot,
            accounts,
            reward_tokens,
            ..
        } = &mut self.state;
        let entry = accounts.entry(*account).or_default();
        integral::settle_primary(&mut entry.primary, entry.working_balance, snapshot.integral)?;
        for (token, reward) in reward_tokens.iter() {
            let snap = entry.rewards.entry(*token).or_default();
            integral::settle_reward(snap, entry.balance, reward.integral)?;
        }
        Ok(())
    }

    fn members_of<'a>(&self, accounts: impl IntoIterator<Item = &'a AccountId>) -> BTreeSet<AccountId> {
        accounts
            .into_iter()
            .flat_map(|a| self.state.sharing.group(a).1)
            .collect()
    }

    /// Checkpoint everything `change` can affect, apply it, then refresh the
    /// working balances of every group involved before or after.
    fn regroup<T>(
        &mut self,
        now: u64,
        accounts: &[AccountId],
        change: impl FnOnce(&mut Self) -> Result<T, GaugeError>,
    ) -> Result<T, GaugeError> {
        self.checkpoint_globals(now)?;
        let before = self.members_of(accounts);
        for member in &before {
            self.checkpoint_account(member)?;
        }

        let out = change(self)?;

        let after = self.members_of(before.iter().chain(accounts));
        for member in after.difference(&before) {
            self.checkpoint_account(member)?;
        }
        self.update_liquidity_limits(now, &after)?;
        Ok(out)
    }

    /// Recompute working balances of every group any of `touched` belongs to.
    fn update_liquidity_limits(&mut self, now: u64, touched: &BTreeSet<AccountId>) -> Result<(), GaugeError> {
        let owners: BTreeSet<AccountId> = touched
            .iter()
            .map(|a| self.state.sharing.group(a).0)
            .collect();
        let supply = self.collab.voting.total_supply(now);

        for owner in owners {
            let (_, members) = self.state.sharing.group(&owner);
            let voting_power = self.collab.voting.adjusted_balance_of(&owner, now);
            let shares = self.group_working(&members, voting_power, supply)?;

            for (account, working) in shares {
                let entry = self.state.accounts.entry(account).or_default();
                let previous = std::mem::replace(&mut entry.working_balance, working);
                entry.voting_power_at_checkpoint = voting_power;
                let balance = entry.balance;
                self.state.working_supply =
                    add(self.state.working_supply.saturating_sub(previous), working)?;
                self.events.push(GaugeEvent::UpdateLiquidityLimit {
                    account,
                    balance,
                    total_staked: self.state.total_staked,
                    working_balance: working,
                    working_supply: self.state.working_supply,
                });
            }
        }
        Ok(())
    }

    /// Working balance of each member of a group sharing `voting_power`.
    fn group_working(
        &self,
        members: &BTreeSet<AccountId>,
        voting_power: u128,
        supply: u128,
    ) -> Result<Vec<(AccountId, u128)>, GaugeError> {
        let balances: Vec<(AccountId, u128)> = members
            .iter()
            .map(|a| (*a, self.balance_of(a)))
            .collect();
        let combined = balances
            .iter()
            .try_fold(0u128, |acc, (_, balance)| add(acc, *balance))?;
        let capped = working_balance(
            combined,
            self.state.total_staked,
            voting_power,
            supply,
            self.config.tokenless_production as u128,
        )?;
        Ok(split_pro_rata(&balances, capped)?)
    }

    pub(crate) fn account_mut(&mut self, account: &AccountId) -> &mut AccountState {
        self.state.accounts.entry(*account).or_default()
    }
}
