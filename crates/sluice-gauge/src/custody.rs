//! Custody of staked tokens.
//!
//! A gauge either holds staked tokens itself ([`Custody::Direct`]) or hands
//! them to a pluggable [`LiquidityManager`] ([`Custody::Managed`]).
//! [`HoldingManager`] is a reference manager that simply keeps the tokens
//! in its own account.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use sluice_core::error::TokenError;
use sluice_core::traits::{LiquidityManager, TokenLedger};
use sluice_core::{AccountId, TokenId};

#[derive(Clone, Default)]
pub enum Custody {
    #[default]
    Direct,
    Managed(Arc<dyn LiquidityManager>),
}

impl Custody {
    pub fn manager(&self) -> Option<&Arc<dyn LiquidityManager>> {
        match self {
            Custody::Direct => None,
            Custody::Managed(manager) => Some(manager),
        }
    }

    /// The manager, if one is installed and currently active.
    pub fn active_manager(&self) -> Option<&Arc<dyn LiquidityManager>> {
        self.manager().filter(|m| m.is_active())
    }

    pub fn manager_address(&self) -> Option<AccountId> {
        self.manager().map(|m| m.address())
    }
}

impl std::fmt::Debug for Custody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Custody::Direct => write!(f, "Direct"),
            Custody::Managed(m) => write!(f, "Managed({:?})", m.address()),
        }
    }
}

/// Liquidity manager that parks staked tokens in its own account.
#[derive(Debug)]
pub struct HoldingManager {
    address: AccountId,
    staking_token: TokenId,
    active: AtomicBool,
    /// account → amount forwarded on its behalf
    deposits: RwLock<BTreeMap<AccountId, u128>>,
}

impl HoldingManager {
    pub fn new(address: AccountId, staking_token: TokenId) -> Self {
        Self {
            address,
            staking_token,
            active: AtomicBool::new(true),
            deposits: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn deposited_for(&self, account: &AccountId) -> u128 {
        self.deposits.read().get(account).copied().unwrap_or(0)
    }
}

impl LiquidityManager for HoldingManager {
    fn address(&self) -> AccountId {
        self.address
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn on_deposit(
        &self,
        _tokens: &dyn TokenLedger,
        account: &AccountId,
        amount: u128,
        use_manager: bool,
    ) -> Result<(), TokenError> {
        if !use_manager {
            return Ok(());
        }
        let mut deposits = self.deposits.write();
        let entry = deposits.entry(*account).or_insert(0);
        *entry = entry.saturating_add(amount);
        debug!(manager = %self.address.short(), account = %account.short(), amount, "custody: deposit recorded");
        Ok(())
    }

    fn on_withdraw(
        &self,
        tokens: &dyn TokenLedger,
        receiver: &AccountId,
        amount: u128,
    ) -> Result<(), TokenError> {
        if !self.is_active() {
            return Err(TokenError::Rejected("liquidity manager inactive".into()));
        }
        tokens.transfer(&self.staking_token, &self.address, receiver, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::memory::MemoryTokenLedger;

    fn acct(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    #[test]
    fn direct_has_no_manager() {
        let c = Custody::default();
        assert!(c.manager().is_none());
        assert!(c.active_manager().is_none());
        assert_eq!(c.manager_address(), None);
    }

    #[test]
    fn inactive_manager_is_not_active_custody() {
        let m = Arc::new(HoldingManager::new(acct("mgr"), acct("lp")));
        let c = Custody::Managed(m.clone());
        assert!(c.active_manager().is_some());
        m.set_active(false);
        assert!(c.active_manager().is_none());
        assert_eq!(c.manager_address(), Some(acct("mgr")));
    }

    #[test]
    fn holding_manager_pays_out_from_its_account() {
        let ledger = MemoryTokenLedger::new();
        let m = HoldingManager::new(acct("mgr"), acct("lp"));
        ledger.mint(&acct("lp"), &acct("mgr"), 100);
        m.on_deposit(&ledger, &acct("alice"), 100, true).unwrap();
        assert_eq!(m.deposited_for(&acct("alice")), 100);
        m.on_withdraw(&ledger, &acct("alice"), 60).unwrap();
        assert_eq!(ledger.balance_of(&acct("lp"), &acct("alice")), 60);
        assert_eq!(ledger.balance_of(&acct("lp"), &acct("mgr")), 40);
    }

    #[test]
    fn inactive_manager_refuses_withdrawals() {
        let ledger = MemoryTokenLedger::new();
        let m = HoldingManager::new(acct("mgr"), acct("lp"));
        ledger.mint(&acct("lp"), &acct("mgr"), 100);
        m.set_active(false);
        assert!(matches!(
            m.on_withdraw(&ledger, &acct("alice"), 1),
            Err(TokenError::Rejected(_))
        ));
    }
}
