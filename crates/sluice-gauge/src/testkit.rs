//! Shared fixtures for the gauge's unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use sluice_core::config::GaugeConfig;
use sluice_core::constants::{SCALE, UNIT, WEEK, YEAR};
use sluice_core::memory::{MemoryTokenLedger, MemoryWeights};
use sluice_core::schedule::HalvingSchedule;
use sluice_core::traits::VotingPower;
use sluice_core::{AccountId, Context, TokenId};

use crate::gauge::{Collaborators, Gauge};

pub const T0: u64 = 10 * WEEK;

pub fn acct(label: &str) -> AccountId {
    AccountId::from_label(label)
}

/// Voting power set directly per account.
pub struct StaticPower {
    /// account → (own, adjusted)
    powers: RwLock<BTreeMap<AccountId, (u128, u128)>>,
    supply: RwLock<u128>,
}

impl StaticPower {
    pub fn new(supply: u128) -> Self {
        Self {
            powers: RwLock::new(BTreeMap::new()),
            supply: RwLock::new(supply),
        }
    }

    pub fn set(&self, account: AccountId, own: u128, adjusted: u128) {
        self.powers.write().insert(account, (own, adjusted));
    }
}

impl VotingPower for StaticPower {
    fn adjusted_balance_of(&self, account: &AccountId, _now: u64) -> u128 {
        self.powers.read().get(account).map_or(0, |p| p.1)
    }

    fn own_balance_of(&self, account: &AccountId, _now: u64) -> u128 {
        self.powers.read().get(account).map_or(0, |p| p.0)
    }

    fn total_supply(&self, _now: u64) -> u128 {
        *self.supply.read()
    }
}

pub struct Harness {
    pub gauge: Gauge,
    pub power: Arc<StaticPower>,
    pub tokens: Arc<MemoryTokenLedger>,
    pub weights: Arc<MemoryWeights>,
    pub schedule: Arc<HalvingSchedule>,
    pub lp: TokenId,
}

impl Harness {
    pub fn ctx(&self, sender: &str, now: u64) -> Context {
        Context::new(acct(sender), now)
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            voting: self.power.clone(),
            schedule: self.schedule.clone(),
            weights: self.weights.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

/// Gauge at full weight minting 4 UNIT/s, voting supply 1000 UNIT, and
/// 1000 UNIT of staking token each for alice, bob and carol.
pub fn harness() -> Harness {
    harness_with(GaugeConfig::default())
}

pub fn harness_with(config: GaugeConfig) -> Harness {
    let gauge_id = acct("gauge");
    let lp = acct("lp");
    let power = Arc::new(StaticPower::new(1_000 * UNIT));
    let tokens = Arc::new(MemoryTokenLedger::new());
    let weights = Arc::new(MemoryWeights::new());
    weights.set_weight(gauge_id, 0, SCALE);
    let schedule = Arc::new(HalvingSchedule::new(4 * UNIT, 0, YEAR, 2 * SCALE).unwrap());
    for holder in ["alice", "bob", "carol"] {
        tokens.mint(&lp, &acct(holder), 1_000 * UNIT);
    }
    let collab = Collaborators {
        voting: power.clone(),
        schedule: schedule.clone(),
        weights: weights.clone(),
        tokens: tokens.clone(),
    };
    let gauge = Gauge::new(gauge_id, acct("admin"), lp, config, collab, T0).unwrap();
    Harness {
        gauge,
        power,
        tokens,
        weights,
        schedule,
        lp,
    }
}
