//! Secondary reward tokens.
//!
//! Up to `max_reward_tokens` tokens can be active at once. Each is funded by
//! its distributor and accrues per raw staked unit (boosts do not apply).
//! A token with `period_length == 0` credits deposits instantly; otherwise a
//! deposit, plus whatever was left of the running drip, is spread linearly
//! over one period.

use tracing::{debug, info};

use sluice_core::constants::SCALE;
use sluice_core::error::{GaugeError, TokenError};
use sluice_core::math::{add, mul, mul_div};
use sluice_core::{AccountId, Context, TokenId};

use crate::events::GaugeEvent;
use crate::gauge::Gauge;
use crate::integral;
use crate::state::{RewardTokenState, UserRewardSnapshot};

impl Gauge {
    pub fn reward_token(&self, token: &TokenId) -> Option<&RewardTokenState> {
        self.state.reward_tokens.get(token)
    }

    /// Active reward tokens, in id order.
    pub fn reward_tokens(&self) -> Vec<TokenId> {
        self.state.active_reward_tokens().map(|(t, _)| *t).collect()
    }

    pub fn rewards_receiver(&self, account: &AccountId) -> Option<AccountId> {
        self.state.account(account).and_then(|a| a.rewards_receiver)
    }

    pub fn claimed_reward(&self, account: &AccountId, token: &TokenId) -> u128 {
        self.state
            .account(account)
            .and_then(|a| a.rewards.get(token))
            .map_or(0, |r| r.claimed)
    }

    /// Reward `account` could claim of `token` at `now`.
    pub fn claimable_reward(
        &self,
        account: &AccountId,
        token: &TokenId,
        now: u64,
    ) -> Result<u128, GaugeError> {
        let reward = self
            .state
            .reward_tokens
            .get(token)
            .ok_or(GaugeError::UnknownRewardToken(*token))?;
        let advanced = integral::advance_reward(reward, now, self.state.total_staked)?;
        let Some(state) = self.state.account(account) else {
            return Ok(0);
        };
        let mut snapshot = state.rewards.get(token).copied().unwrap_or_default();
        integral::settle_reward(&mut snapshot, state.balance, advanced.integral)?;
        Ok(snapshot.pending)
    }

    /// Start distributing `token`. `period_length` defaults to the configured
    /// reward period; zero makes deposits instant.
    ///
    /// Re-registering a token that was unregistered resumes its drip where it
    /// was paused.
    pub fn register_reward_token(
        &mut self,
        ctx: &Context,
        token: TokenId,
        distributor: AccountId,
        period_length: Option<u64>,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            g.require_admin(ctx)?;
            if token == g.staking_token() {
                return Err(GaugeError::StakingTokenAsReward(token));
            }
            if g.reward_token(&token).is_some_and(|r| r.active) {
                return Err(GaugeError::RewardTokenAlreadyRegistered(token));
            }
            let max = g.config().max_reward_tokens;
            if g.state.active_reward_tokens().count() >= max {
                return Err(GaugeError::TooManyRewardTokens { max });
            }
            g.checkpoint_globals(ctx.now)?;

            let period_length = period_length.unwrap_or(g.config().default_reward_period);
            let now = ctx.now;
            g.state
                .reward_tokens
                .entry(token)
                .and_modify(|r| {
                    if r.finish_at > r.paused_at {
                        r.finish_at = r.finish_at.saturating_add(now.saturating_sub(r.paused_at));
                    }
                    r.distributor = distributor;
                    r.period_length = period_length;
                    r.last_update = now;
                    r.active = true;
                })
                .or_insert_with(|| RewardTokenState::new(distributor, period_length, now));

            info!(
                gauge = %g.id().short(),
                token = %token.short(),
                distributor = %distributor.short(),
                period_length,
                "gauge: reward token registered"
            );
            g.events.push(GaugeEvent::RewardTokenRegistered {
                token,
                distributor,
                period_length,
            });
            Ok(())
        })
    }

    /// Stop distributing `token`. Accrued rewards stay claimable through
    /// [`claim_historical`](Self::claim_historical).
    pub fn unregister_reward_token(&mut self, ctx: &Context, token: TokenId) -> Result<(), GaugeError> {
        self.atomically(|g| {
            g.require_admin(ctx)?;
            if !g.reward_token(&token).is_some_and(|r| r.active) {
                return Err(GaugeError::RewardTokenNotRegistered(token));
            }
            g.checkpoint_globals(ctx.now)?;
            if let Some(r) = g.state.reward_tokens.get_mut(&token) {
                r.active = false;
                r.paused_at = ctx.now;
            }
            info!(gauge = %g.id().short(), token = %token.short(), "gauge: reward token unregistered");
            g.events.push(GaugeEvent::RewardTokenUnregistered { token });
            Ok(())
        })
    }

    /// Hand `token`'s distributor role to `distributor`. Callable by the
    /// admin or the current distributor.
    pub fn set_reward_distributor(
        &mut self,
        ctx: &Context,
        token: TokenId,
        distributor: AccountId,
    ) -> Result<(), GaugeError> {
        self.atomically(|g| {
            let admin = g.admin();
            let r = g
                .state
                .reward_tokens
                .get_mut(&token)
                .filter(|r| r.active)
                .ok_or(GaugeError::RewardTokenNotRegistered(token))?;
            if ctx.sender != admin && ctx.sender != r.distributor {
                return Err(GaugeError::Unauthorized);
            }
            r.distributor = distributor;
            g.events
                .push(GaugeEvent::RewardDistributorChanged { token, distributor });
            Ok(())
        })
    }

    /// Fund `token` with `amount` from the caller.
    pub fn deposit_reward(&mut self, ctx: &Context, token: TokenId, amount: u128) -> Result<(), GaugeError> {
        self.atomically(|g| {
            if amount == 0 {
                return Err(GaugeError::RewardZeroAmount);
            }
            let distributor = g
                .reward_token(&token)
                .filter(|r| r.active)
                .map(|r| r.distributor)
                .ok_or(GaugeError::RewardTokenNotRegistered(token))?;
            if ctx.sender != distributor && ctx.sender != g.admin() {
                return Err(GaugeError::Unauthorized);
            }
            g.checkpoint_globals(ctx.now)?;

            let now = ctx.now;
            let total_staked = g.state.total_staked;
            let r = g
                .state
                .reward_tokens
                .get_mut(&token)
                .ok_or(GaugeError::RewardTokenNotRegistered(token))?;
            if r.is_instant() {
                if total_staked == 0 {
                    return Err(GaugeError::NoStakeForInstantReward);
                }
                r.integral = add(r.integral, mul_div(amount, SCALE, total_staked)?)?;
            } else {
                let leftover = if now < r.finish_at {
                    mul((r.finish_at - now) as u128, r.rate)?
                } else {
                    0
                };
                r.rate = add(amount, leftover)? / r.period_length as u128;
                r.finish_at = now.saturating_add(r.period_length);
                r.last_update = now;
            }
            let (rate, finish_at) = (r.rate, r.finish_at);

            g.call_out(|g| {
                g.collab.tokens.transfer(&token, &ctx.sender, &g.id(), amount)?;
                Ok(())
            })?;

            debug!(token = %token.short(), amount, rate, finish_at, "gauge: reward deposited");
            g.events.push(GaugeEvent::RewardDeposited {
                token,
                amount,
                rate,
                finish_at,
            });
            Ok(())
        })
    }

    /// Caller's claims are routed to `receiver` when `to` is omitted.
    pub fn set_rewards_receiver(&mut self, ctx: &Context, receiver: Option<AccountId>) -> Result<(), GaugeError> {
        self.atomically(|g| {
            g.account_mut(&ctx.sender).rewards_receiver = receiver;
            Ok(())
        })
    }

    /// Pay out every active token's pending reward of `account` (default:
    /// caller). Returns what was paid per token.
    ///
    /// `to` defaults to the account's configured receiver, then the account
    /// itself. A third party may trigger a claim but only toward the account
    /// or its configured receiver.
    pub fn claim(
        &mut self,
        ctx: &Context,
        account: Option<AccountId>,
        to: Option<AccountId>,
    ) -> Result<Vec<(TokenId, u128)>, GaugeError> {
        let tokens = self.reward_tokens();
        self.claim_tokens(ctx, account, to, &tokens)
    }

    /// Like [`claim`](Self::claim) but for an explicit token list, which may
    /// include unregistered tokens.
    pub fn claim_historical(
        &mut self,
        ctx: &Context,
        account: Option<AccountId>,
        to: Option<AccountId>,
        tokens: &[TokenId],
    ) -> Result<Vec<(TokenId, u128)>, GaugeError> {
        if let Some(unknown) = tokens.iter().find(|t| self.reward_token(t).is_none()) {
            return Err(GaugeError::UnknownRewardToken(*unknown));
        }
        self.claim_tokens(ctx, account, to, tokens)
    }

    fn claim_tokens(
        &mut self,
        ctx: &Context,
        account: Option<AccountId>,
        to: Option<AccountId>,
        tokens: &[TokenId],
    ) -> Result<Vec<(TokenId, u128)>, GaugeError> {
        self.atomically(|g| {
            let (account, to) = g.route_claim(ctx, account, to)?;
            g.checkpoint_globals(ctx.now)?;
            g.checkpoint_account(&account)?;

            let entry = g.account_mut(&account);
            let mut paid = Vec::new();
            for token in tokens {
                let snapshot: &mut UserRewardSnapshot = entry.rewards.entry(*token).or_default();
                let amount = std::mem::take(&mut snapshot.pending);
                if amount > 0 {
                    snapshot.claimed = add(snapshot.claimed, amount)?;
                    paid.push((*token, amount));
                }
            }

            g.call_out(|g| g.pay_rewards(&paid, &to))?;

            for (token, amount) in &paid {
                debug!(account = %account.short(), to = %to.short(), token = %token.short(), amount, "gauge: claim");
                g.events.push(GaugeEvent::Claim {
                    account,
                    to,
                    token: *token,
                    amount: *amount,
                });
            }
            Ok(paid)
        })
    }

    /// Transfer every `(token, amount)` to `to`, or none of them.
    fn pay_rewards(&self, paid: &[(TokenId, u128)], to: &AccountId) -> Result<(), GaugeError> {
        let tokens = &*self.collab.tokens;
        let gauge = self.id();
        if to.is_zero() {
            return Err(TokenError::ZeroAccount.into());
        }
        for (token, amount) in paid {
            let have = tokens.balance_of(token, &gauge);
            if have < *amount {
                return Err(TokenError::InsufficientBalance { have, need: *amount }.into());
            }
        }
        for (i, (token, amount)) in paid.iter().enumerate() {
            if let Err(e) = tokens.transfer(token, &gauge, to, *amount) {
                for (token, amount) in paid[..i].iter().rev() {
                    self.unwind(token, to, &gauge, *amount);
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn route_claim(
        &self,
        ctx: &Context,
        account: Option<AccountId>,
        to: Option<AccountId>,
    ) -> Result<(AccountId, AccountId), GaugeError> {
        let account = account.unwrap_or(ctx.sender);
        let configured = self.rewards_receiver(&account);
        let to = to.or(configured).unwrap_or(account);
        if ctx.sender != account && to != account && Some(to) != configured {
            return Err(GaugeError::ClaimOthersRewardToAnother);
        }
        Ok((account, to))
    }
}

#[cfg(test)]
mod tests {
    use sluice_core::config::GaugeConfig;
    use sluice_core::constants::{UNIT, WEEK};
    use sluice_core::traits::TokenLedger;

    use super::*;
    use crate::testkit::{Harness, acct, harness, harness_with, T0};

    fn with_instant_token(h: &mut Harness) -> TokenId {
        let token = acct("bonus");
        h.tokens.mint(&token, &acct("dist"), 1_000_000 * UNIT);
        h.gauge
            .register_reward_token(&h.ctx("admin", T0), token, acct("dist"), Some(0))
            .unwrap();
        token
    }

    fn with_weekly_token(h: &mut Harness) -> TokenId {
        let token = acct("drip");
        h.tokens.mint(&token, &acct("dist"), 1_000_000 * UNIT);
        h.gauge
            .register_reward_token(&h.ctx("admin", T0), token, acct("dist"), None)
            .unwrap();
        token
    }

    #[test]
    fn registration_is_admin_only_and_unique() {
        let mut h = harness();
        let token = acct("bonus");
        assert_eq!(
            h.gauge.register_reward_token(&h.ctx("alice", T0), token, acct("dist"), None),
            Err(GaugeError::Unauthorized)
        );
        h.gauge
            .register_reward_token(&h.ctx("admin", T0), token, acct("dist"), None)
            .unwrap();
        assert_eq!(h.gauge.reward_token(&token).map(|r| r.period_length), Some(WEEK));
        assert_eq!(
            h.gauge.register_reward_token(&h.ctx("admin", T0), token, acct("dist"), None),
            Err(GaugeError::RewardTokenAlreadyRegistered(token))
        );
        assert_eq!(h.gauge.reward_tokens(), vec![token]);
    }

    #[test]
    fn reward_token_count_is_capped() {
        let mut h = harness_with(GaugeConfig {
            max_reward_tokens: 2,
            ..GaugeConfig::default()
        });
        for label in ["r1", "r2"] {
            h.gauge
                .register_reward_token(&h.ctx("admin", T0), acct(label), acct("dist"), None)
                .unwrap();
        }
        assert_eq!(
            h.gauge.register_reward_token(&h.ctx("admin", T0), acct("r3"), acct("dist"), None),
            Err(GaugeError::TooManyRewardTokens { max: 2 })
        );
        // an unregistered token frees its slot
        h.gauge.unregister_reward_token(&h.ctx("admin", T0), acct("r1")).unwrap();
        h.gauge
            .register_reward_token(&h.ctx("admin", T0), acct("r3"), acct("dist"), None)
            .unwrap();
    }

    #[test]
    fn instant_reward_credits_current_stakers() {
        let mut h = harness();
        let token = with_instant_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 100 * UNIT, None, false).unwrap();
        h.gauge.deposit_reward(&h.ctx("dist", T0 + 1), token, 50 * UNIT).unwrap();
        assert_eq!(h.gauge.reward_token(&token).map(|r| r.integral), Some(SCALE / 2));

        // a later staker does not share an instant reward already paid in
        h.gauge.deposit(&h.ctx("bob", T0 + 2), 100 * UNIT, None, false).unwrap();
        assert_eq!(h.gauge.claimable_reward(&acct("alice"), &token, T0 + 3), Ok(50 * UNIT));
        assert_eq!(h.gauge.claimable_reward(&acct("bob"), &token, T0 + 3), Ok(0));

        let paid = h.gauge.claim(&h.ctx("alice", T0 + 3), None, None).unwrap();
        assert_eq!(paid, vec![(token, 50 * UNIT)]);
        assert_eq!(h.tokens.balance_of(&token, &acct("alice")), 50 * UNIT);
        assert_eq!(h.gauge.claimed_reward(&acct("alice"), &token), 50 * UNIT);

        // nothing left to pay
        assert!(h.gauge.claim(&h.ctx("alice", T0 + 4), None, None).unwrap().is_empty());
        assert_eq!(h.tokens.balance_of(&token, &acct("alice")), 50 * UNIT);
    }

    #[test]
    fn instant_reward_needs_stake() {
        let mut h = harness();
        let token = with_instant_token(&mut h);
        assert_eq!(
            h.gauge.deposit_reward(&h.ctx("dist", T0), token, UNIT),
            Err(GaugeError::NoStakeForInstantReward)
        );
        assert_eq!(h.tokens.balance_of(&token, &acct("dist")), 1_000_000 * UNIT);
    }

    #[test]
    fn deposit_reward_checks() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        assert_eq!(
            h.gauge.deposit_reward(&h.ctx("dist", T0), token, 0),
            Err(GaugeError::RewardZeroAmount)
        );
        assert_eq!(
            h.gauge.deposit_reward(&h.ctx("dist", T0), acct("nope"), UNIT),
            Err(GaugeError::RewardTokenNotRegistered(acct("nope")))
        );
        assert_eq!(
            h.gauge.deposit_reward(&h.ctx("alice", T0), token, UNIT),
            Err(GaugeError::Unauthorized)
        );
    }

    #[test]
    fn linear_reward_drips_over_period() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 10 * UNIT, None, false).unwrap();
        h.gauge
            .deposit_reward(&h.ctx("dist", T0), token, WEEK as u128 * UNIT)
            .unwrap();
        let r = h.gauge.reward_token(&token).copied().unwrap();
        assert_eq!(r.rate, UNIT);
        assert_eq!(r.finish_at, T0 + WEEK);

        assert_eq!(h.gauge.claimable_reward(&acct("alice"), &token, T0 + 100), Ok(100 * UNIT));
        // nothing accrues after the period ends
        assert_eq!(
            h.gauge.claimable_reward(&acct("alice"), &token, T0 + 2 * WEEK),
            Ok(WEEK as u128 * UNIT)
        );
    }

    #[test]
    fn top_up_rolls_leftover_into_new_period() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 10 * UNIT, None, false).unwrap();
        h.gauge
            .deposit_reward(&h.ctx("dist", T0), token, WEEK as u128 * UNIT)
            .unwrap();
        let half = T0 + WEEK / 2;
        h.gauge
            .deposit_reward(&h.ctx("dist", half), token, WEEK as u128 * UNIT / 2)
            .unwrap();
        let r = h.gauge.reward_token(&token).copied().unwrap();
        assert_eq!(r.rate, UNIT);
        assert_eq!(r.finish_at, half + WEEK);
    }

    #[test]
    fn claim_routing_rules() {
        let mut h = harness();
        let token = with_instant_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 100 * UNIT, None, false).unwrap();
        h.gauge.deposit_reward(&h.ctx("dist", T0), token, 10 * UNIT).unwrap();

        assert_eq!(
            h.gauge.claim(&h.ctx("bob", T0 + 1), Some(acct("alice")), Some(acct("bob"))),
            Err(GaugeError::ClaimOthersRewardToAnother)
        );

        h.gauge
            .set_rewards_receiver(&h.ctx("alice", T0 + 1), Some(acct("carol")))
            .unwrap();
        assert_eq!(h.gauge.rewards_receiver(&acct("alice")), Some(acct("carol")));

        // a third party may trigger a claim toward the configured receiver
        let paid = h.gauge.claim(&h.ctx("bob", T0 + 2), Some(acct("alice")), None).unwrap();
        assert_eq!(paid, vec![(token, 10 * UNIT)]);
        assert_eq!(h.tokens.balance_of(&token, &acct("carol")), 10 * UNIT);
        assert!(matches!(
            h.gauge.take_events().last(),
            Some(GaugeEvent::Claim { to, .. }) if *to == acct("carol")
        ));
    }

    #[test]
    fn unregistered_token_stays_claimable() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 10 * UNIT, None, false).unwrap();
        h.gauge
            .deposit_reward(&h.ctx("dist", T0), token, WEEK as u128 * UNIT)
            .unwrap();
        h.gauge.unregister_reward_token(&h.ctx("admin", T0 + 100), token).unwrap();
        assert!(h.gauge.reward_tokens().is_empty());

        // frozen while unregistered
        assert_eq!(h.gauge.claimable_reward(&acct("alice"), &token, T0 + 500), Ok(100 * UNIT));
        assert!(h.gauge.claim(&h.ctx("alice", T0 + 500), None, None).unwrap().is_empty());
        assert_eq!(
            h.gauge.claim_historical(&h.ctx("alice", T0 + 500), None, None, &[acct("ghost")]),
            Err(GaugeError::UnknownRewardToken(acct("ghost")))
        );
        let paid = h
            .gauge
            .claim_historical(&h.ctx("alice", T0 + 500), None, None, &[token])
            .unwrap();
        assert_eq!(paid, vec![(token, 100 * UNIT)]);
    }

    #[test]
    fn re_registration_resumes_paused_drip() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        h.gauge.deposit(&h.ctx("alice", T0), 10 * UNIT, None, false).unwrap();
        h.gauge
            .deposit_reward(&h.ctx("dist", T0), token, WEEK as u128 * UNIT)
            .unwrap();
        h.gauge.unregister_reward_token(&h.ctx("admin", T0 + 100), token).unwrap();
        h.gauge
            .register_reward_token(&h.ctx("admin", T0 + 1_100), token, acct("dist"), None)
            .unwrap();
        let r = h.gauge.reward_token(&token).copied().unwrap();
        assert_eq!(r.finish_at, T0 + WEEK + 1_000);
        assert_eq!(h.gauge.claimable_reward(&acct("alice"), &token, T0 + 1_200), Ok(200 * UNIT));
    }

    #[test]
    fn distributor_handover() {
        let mut h = harness();
        let token = with_weekly_token(&mut h);
        assert_eq!(
            h.gauge.set_reward_distributor(&h.ctx("alice", T0), token, acct("alice")),
            Err(GaugeError::Unauthorized)
        );
        h.gauge
            .set_reward_distributor(&h.ctx("dist", T0), token, acct("bob"))
            .unwrap();
        assert_eq!(h.gauge.reward_token(&token).map(|r| r.distributor), Some(acct("bob")));
        h.gauge
            .set_reward_distributor(&h.ctx("admin", T0), token, acct("carol"))
            .unwrap();
        assert_eq!(h.gauge.reward_token(&token).map(|r| r.distributor), Some(acct("carol")));
    }

    #[test]
    fn unknown_token_has_no_claimable() {
        let h = harness();
        assert_eq!(
            h.gauge.claimable_reward(&acct("alice"), &acct("ghost"), T0),
            Err(GaugeError::UnknownRewardToken(acct("ghost")))
        );
    }

    #[test]
    fn staking_token_cannot_be_a_reward() {
        let mut h = harness();
        let lp = h.lp;
        assert_eq!(
            h.gauge.register_reward_token(&h.ctx("admin", T0), lp, acct("dist"), Some(0)),
            Err(GaugeError::StakingTokenAsReward(lp))
        );
        assert!(h.gauge.reward_token(&lp).is_none());
        assert!(h.gauge.reward_tokens().is_empty());
    }

    #[test]
    fn failed_payout_pays_nothing() {
        let mut h = harness();
        let bonus = with_instant_token(&mut h);
        let extra = acct("extra");
        h.tokens.mint(&extra, &acct("dist"), 1_000 * UNIT);
        h.gauge
            .register_reward_token(&h.ctx("admin", T0), extra, acct("dist"), Some(0))
            .unwrap();
        h.gauge.deposit(&h.ctx("alice", T0), 100 * UNIT, None, false).unwrap();
        h.gauge.deposit_reward(&h.ctx("dist", T0), bonus, 10 * UNIT).unwrap();
        h.gauge.deposit_reward(&h.ctx("dist", T0), extra, 10 * UNIT).unwrap();

        // one of the two tokens is no longer held by the gauge
        let gauge_id = h.gauge.id();
        h.tokens.transfer(&extra, &gauge_id, &acct("sink"), 10 * UNIT).unwrap();
        h.gauge.take_events();

        assert_eq!(
            h.gauge.claim(&h.ctx("alice", T0 + 1), None, None),
            Err(GaugeError::Token(TokenError::InsufficientBalance {
                have: 0,
                need: 10 * UNIT
            }))
        );
        assert_eq!(h.tokens.balance_of(&bonus, &acct("alice")), 0);
        assert_eq!(h.tokens.balance_of(&extra, &acct("alice")), 0);
        assert_eq!(h.gauge.claimable_reward(&acct("alice"), &bonus, T0 + 1), Ok(10 * UNIT));
        assert!(h.gauge.take_events().is_empty());

        // once funded again a single claim pays each token exactly once
        h.tokens.mint(&extra, &gauge_id, 10 * UNIT);
        h.gauge.claim(&h.ctx("alice", T0 + 2), None, None).unwrap();
        h.gauge.claim(&h.ctx("alice", T0 + 2), None, None).unwrap();
        assert_eq!(h.tokens.balance_of(&bonus, &acct("alice")), 10 * UNIT);
        assert_eq!(h.tokens.balance_of(&extra, &acct("alice")), 10 * UNIT);
        assert_eq!(h.gauge.claimed_reward(&acct("alice"), &bonus), 10 * UNIT);
    }
}
