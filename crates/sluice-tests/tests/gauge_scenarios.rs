//! Gauge scenarios against a real boost ledger.
//!
//! Covers:
//! - primary accrual across an inflation-epoch boundary
//! - pooled voting power in a sharing group
//! - instant and linear secondary rewards, claim idempotency
//! - restoring a gauge from serialized state

use sluice_core::config::GaugeConfig;
use sluice_core::constants::{SCALE, UNIT, WEEK};
use sluice_core::traits::TokenLedger;
use sluice_gauge::{Gauge, GaugeEvent, GaugeState};
use sluice_tests::helpers::*;

#[test]
fn primary_accrual_halves_at_epoch_boundary() {
    let boundary = START + 1_000;
    let mut w = World::with(GaugeConfig::default(), boundary);
    w.fund(&["alice"]);
    // 10 staked, working 4: the integral grows by rate / 4 per second
    w.gauge.deposit(&ctx("alice", START), 10 * UNIT, None, false).unwrap();

    let before = w.gauge.user_checkpoint(&ctx("alice", boundary - 1), acct("alice")).unwrap();
    let at = w.gauge.user_checkpoint(&ctx("alice", boundary), acct("alice")).unwrap();
    let after = w.gauge.user_checkpoint(&ctx("alice", boundary + 1), acct("alice")).unwrap();
    assert_eq!(before, RATE * 999);
    assert_eq!(at, RATE * 1_000);
    assert_eq!(after, RATE * 1_000 + RATE / 2);

    let end = w.gauge.user_checkpoint(&ctx("alice", boundary + 1_000), acct("alice")).unwrap();
    assert_eq!(end, RATE * 1_000 + RATE / 2 * 1_000);
    assert_eq!(w.gauge.snapshot().inflation_rate, RATE / 2);
}

#[test]
fn accrual_is_path_independent() {
    let mut stepped = World::new();
    let mut direct = World::new();
    for w in [&mut stepped, &mut direct] {
        w.fund(&["alice", "bob"]);
        w.gauge.deposit(&ctx("alice", START), 10 * UNIT, None, false).unwrap();
        w.gauge.deposit(&ctx("bob", START), 30 * UNIT, None, false).unwrap();
    }
    for step in 1..=20u64 {
        stepped
            .gauge
            .user_checkpoint(&ctx("alice", START + step * WEEK / 2), acct("alice"))
            .unwrap();
    }
    let end = START + 10 * WEEK;
    let a = stepped.gauge.user_checkpoint(&ctx("alice", end), acct("alice")).unwrap();
    let b = direct.gauge.user_checkpoint(&ctx("alice", end), acct("alice")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn sharing_group_uses_owner_power() {
    let mut w = World::new();
    w.fund(&["a", "b"]);
    w.lock("owner", 1_000_000 * UNIT, 200);
    w.gauge.deposit(&ctx("a", START), 123 * UNIT, None, false).unwrap();
    w.gauge.deposit(&ctx("b", START), 456 * UNIT, None, false).unwrap();
    assert_eq!(w.working_of(&["a", "b"]), 579 * UNIT * 40 / 100);

    for staker in ["a", "b"] {
        w.gauge.toggle_vote_sharing(&ctx("owner", START), acct(staker)).unwrap();
        w.gauge.accept_shared_vote(&ctx(staker, START), acct("owner")).unwrap();
    }
    assert_eq!(w.gauge.shared_balance(&acct("owner")), 579 * UNIT);
    // the owner holds the whole voting supply, so the group is fully boosted
    assert_eq!(w.gauge.working_balance_of(&acct("a")), 123 * UNIT);
    assert_eq!(w.gauge.working_balance_of(&acct("b")), 456 * UNIT);

    w.gauge.toggle_vote_sharing(&ctx("owner", START + 1), acct("a")).unwrap();
    assert_eq!(w.gauge.shared_balance(&acct("owner")), 456 * UNIT);
    assert_eq!(w.gauge.working_balance_of(&acct("a")), 123 * UNIT * 40 / 100);
    assert_eq!(w.gauge.working_supply(), w.working_of(&["a", "b", "owner"]));
}

#[test]
fn instant_reward_sets_integral() {
    let mut w = World::new();
    w.fund(&["alice", "bob"]);
    let token = acct("bonus");
    w.tokens.mint(&token, &acct("dist"), 1_000 * UNIT);
    w.gauge
        .register_reward_token(&ctx("admin", START), token, acct("dist"), Some(0))
        .unwrap();
    w.gauge.deposit(&ctx("alice", START), 100 * UNIT, None, false).unwrap();
    w.gauge.deposit(&ctx("bob", START), 200 * UNIT, None, false).unwrap();

    let (amount, staked) = (7 * UNIT, 300 * UNIT);
    w.gauge.deposit_reward(&ctx("dist", START + 5), token, amount).unwrap();
    let integral = w.gauge.reward_token(&token).map(|r| r.integral);
    assert_eq!(integral, Some(amount * SCALE / staked));

    let first = w.gauge.claim(&ctx("bob", START + 9), None, None).unwrap();
    assert!(w.gauge.take_events().iter().any(|e| matches!(e, GaugeEvent::Claim { .. })));
    let again = w.gauge.claim(&ctx("bob", START + 9), None, None).unwrap();
    assert_eq!(first, vec![(token, 200 * UNIT * (amount * SCALE / staked) / SCALE)]);
    assert!(again.is_empty());
    assert!(!w.gauge.take_events().iter().any(|e| matches!(e, GaugeEvent::Claim { .. })));
    assert_eq!(w.gauge.claimable_reward(&acct("bob"), &token, START + 9), Ok(0));
}

#[test]
fn secondary_rewards_ignore_boosts() {
    let mut w = World::new();
    w.fund(&["alice", "bob"]);
    w.lock("alice", 1_000_000 * UNIT, 200);
    let token = acct("drip");
    w.tokens.mint(&token, &acct("dist"), 1_000_000 * UNIT);
    w.gauge
        .register_reward_token(&ctx("admin", START), token, acct("dist"), None)
        .unwrap();
    w.gauge.deposit(&ctx("alice", START), 50 * UNIT, None, false).unwrap();
    w.gauge.deposit(&ctx("bob", START), 50 * UNIT, None, false).unwrap();
    assert!(w.gauge.working_balance_of(&acct("alice")) > w.gauge.working_balance_of(&acct("bob")));

    w.gauge
        .deposit_reward(&ctx("dist", START), token, WEEK as u128 * UNIT)
        .unwrap();
    let end = START + WEEK;
    let alice = w.gauge.claimable_reward(&acct("alice"), &token, end).unwrap();
    let bob = w.gauge.claimable_reward(&acct("bob"), &token, end).unwrap();
    assert_eq!(alice, bob);
    assert_eq!(alice, WEEK as u128 * UNIT / 2);

    w.gauge.claim(&ctx("alice", end), None, None).unwrap();
    assert_eq!(w.tokens.balance_of(&token, &acct("alice")), alice);
}

#[test]
fn restored_gauge_continues_identically() {
    let mut w = World::new();
    w.fund(&["alice"]);
    w.gauge.deposit(&ctx("alice", START), 10 * UNIT, None, false).unwrap();
    w.gauge.user_checkpoint(&ctx("alice", START + 100), acct("alice")).unwrap();

    let json = serde_json::to_string(w.gauge.state()).unwrap();
    let state: GaugeState = serde_json::from_str(&json).unwrap();
    let mut restored = Gauge::with_state(
        w.gauge.id(),
        w.gauge.admin(),
        w.lp,
        GaugeConfig::default(),
        w.collaborators(),
        state,
    )
    .unwrap();

    let later = START + 2 * WEEK;
    let original = w.gauge.user_checkpoint(&ctx("alice", later), acct("alice")).unwrap();
    let copy = restored.user_checkpoint(&ctx("alice", later), acct("alice")).unwrap();
    assert_eq!(original, copy);
    assert_eq!(restored.state(), w.gauge.state());
}
