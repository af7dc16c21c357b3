//! Shared fixtures for the scenario and property tests.

use std::sync::Arc;

use sluice_boost::{BoostLedger, SharedBoostLedger};
use sluice_core::config::GaugeConfig;
use sluice_core::constants::{SCALE, UNIT, WEEK, YEAR};
use sluice_core::memory::{MemoryEscrow, MemoryTokenLedger, MemoryWeights};
use sluice_core::schedule::HalvingSchedule;
use sluice_core::{AccountId, Context, TokenId};
use sluice_gauge::{Collaborators, Gauge};

/// Week-aligned start of every scenario.
pub const START: u64 = 100 * WEEK;

/// Primary mint rate during the first epoch.
pub const RATE: u128 = 4 * UNIT;

/// Staking tokens minted to each funded account.
pub const FUNDING: u128 = 1_000_000 * UNIT;

pub fn acct(label: &str) -> AccountId {
    AccountId::from_label(label)
}

pub fn ctx(sender: &str, now: u64) -> Context {
    Context::new(acct(sender), now)
}

/// A gauge at full weight reading voting power from a real boost ledger.
pub struct World {
    pub escrow: Arc<MemoryEscrow>,
    pub boosts: SharedBoostLedger,
    pub tokens: Arc<MemoryTokenLedger>,
    pub weights: Arc<MemoryWeights>,
    pub gauge: Gauge,
    pub lp: TokenId,
    pub epoch_length: u64,
}

impl World {
    /// Primary rate stays at [`RATE`] for the first ten years.
    pub fn new() -> Self {
        Self::with(GaugeConfig::default(), 10 * YEAR)
    }

    /// `epoch_length` controls when the primary rate first halves
    /// (epochs count from zero, so the first boundary is at `epoch_length`).
    pub fn with(config: GaugeConfig, epoch_length: u64) -> Self {
        let escrow = Arc::new(MemoryEscrow::new());
        let boosts = SharedBoostLedger::new(BoostLedger::new(escrow.clone()));
        let tokens = Arc::new(MemoryTokenLedger::new());
        let weights = Arc::new(MemoryWeights::new());
        let lp = acct("lp");
        let id = acct("gauge");
        weights.set_weight(id, 0, SCALE);
        let schedule = HalvingSchedule::new(RATE, 0, epoch_length, 2 * SCALE)
            .expect("valid schedule");
        let collab = Collaborators {
            voting: Arc::new(boosts.clone()),
            schedule: Arc::new(schedule),
            weights: weights.clone(),
            tokens: tokens.clone(),
        };
        let gauge = Gauge::new(id, acct("admin"), lp, config, collab, START).expect("valid gauge");
        Self {
            escrow,
            boosts,
            tokens,
            weights,
            gauge,
            lp,
            epoch_length,
        }
    }

    /// Fresh handles to the same collaborators, for restoring the gauge.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            voting: Arc::new(self.boosts.clone()),
            schedule: Arc::new(
                HalvingSchedule::new(RATE, 0, self.epoch_length, 2 * SCALE).expect("valid schedule"),
            ),
            weights: self.weights.clone(),
            tokens: self.tokens.clone(),
        }
    }

    /// Lock `amount` for `label` until `weeks` weeks after [`START`].
    pub fn lock(&self, label: &str, amount: u128, weeks: u64) {
        self.escrow.lock(acct(label), amount, START + weeks * WEEK);
    }

    /// Mint [`FUNDING`] staking tokens to each label.
    pub fn fund(&self, labels: &[&str]) {
        for label in labels {
            self.tokens.mint(&self.lp, &acct(label), FUNDING);
        }
    }

    /// Sum of working balances over `labels`.
    pub fn working_of(&self, labels: &[&str]) -> u128 {
        labels
            .iter()
            .map(|l| self.gauge.working_balance_of(&acct(l)))
            .sum()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
