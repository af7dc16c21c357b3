//! [`VotingPower`] views over the boost ledger.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use sluice_core::AccountId;
use sluice_core::traits::VotingPower;

use crate::ledger::BoostLedger;

impl VotingPower for BoostLedger {
    fn adjusted_balance_of(&self, account: &AccountId, now: u64) -> u128 {
        self.adjusted_balance(account, now)
    }

    fn own_balance_of(&self, account: &AccountId, now: u64) -> u128 {
        self.own_balance(account, now)
    }

    fn total_supply(&self, now: u64) -> u128 {
        BoostLedger::total_supply(self, now)
    }
}

/// A boost ledger shared between its own callers and any number of gauges.
///
/// Gauges hold it as `Arc<dyn VotingPower>` and only ever read; delegation
/// goes through [`write`](Self::write).
#[derive(Debug, Clone)]
pub struct SharedBoostLedger(Arc<RwLock<BoostLedger>>);

impl SharedBoostLedger {
    pub fn new(ledger: BoostLedger) -> Self {
        Self(Arc::new(RwLock::new(ledger)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BoostLedger> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, BoostLedger> {
        self.0.write()
    }
}

impl VotingPower for SharedBoostLedger {
    fn adjusted_balance_of(&self, account: &AccountId, now: u64) -> u128 {
        self.0.read().adjusted_balance(account, now)
    }

    fn own_balance_of(&self, account: &AccountId, now: u64) -> u128 {
        self.0.read().own_balance(account, now)
    }

    fn total_supply(&self, now: u64) -> u128 {
        self.0.read().total_supply(now)
    }
}
