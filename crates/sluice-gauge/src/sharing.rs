//! Vote-sharing registry.
//!
//! An owner may permit stakers to pool their stake under the owner's voting
//! power. A permitted staker opts in with [`VoteSharing::accept`]; from then
//! on the owner's group is `{owner} ∪ accepted(owner)` and the group's
//! working balance is computed once from the combined stake and the owner's
//! voting power, then split back pro rata.
//!
//! Sharing never cascades: an account is either an owner with accepted
//! stakers, a staker with one accepted owner, or neither.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use sluice_core::AccountId;
use sluice_core::error::GaugeError;
use sluice_core::math::add;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSharing {
    /// owner → stakers it permits
    permitted: BTreeMap<AccountId, BTreeSet<AccountId>>,
    /// owner → stakers that accepted
    accepted: BTreeMap<AccountId, BTreeSet<AccountId>>,
    /// staker → accepted owner
    owner_of: BTreeMap<AccountId, AccountId>,
    /// owner → Σ balance of accepted stakers
    shared_balance: BTreeMap<AccountId, u128>,
}

/// Result of [`VoteSharing::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Already accepted this owner.
    Unchanged,
    /// Joined the owner, leaving `previous` if there was one.
    Joined { previous: Option<AccountId> },
}

impl VoteSharing {
    pub fn is_permitted(&self, owner: &AccountId, staker: &AccountId) -> bool {
        self.permitted
            .get(owner)
            .is_some_and(|stakers| stakers.contains(staker))
    }

    pub fn owner_of(&self, staker: &AccountId) -> Option<AccountId> {
        self.owner_of.get(staker).copied()
    }

    pub fn accepted_stakers(&self, owner: &AccountId) -> Vec<AccountId> {
        self.accepted
            .get(owner)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_accepted_stakers(&self, owner: &AccountId) -> bool {
        self.accepted.get(owner).is_some_and(|s| !s.is_empty())
    }

    pub fn shared_balance(&self, owner: &AccountId) -> u128 {
        self.shared_balance.get(owner).copied().unwrap_or(0)
    }

    /// Owner of `account`'s group and every member, owner included.
    pub fn group(&self, account: &AccountId) -> (AccountId, BTreeSet<AccountId>) {
        let owner = self.owner_of(account).unwrap_or(*account);
        let mut members = self.accepted.get(&owner).cloned().unwrap_or_default();
        members.insert(owner);
        (owner, members)
    }

    /// Grant or revoke `staker`'s permission. Returns whether sharing is now enabled.
    ///
    /// Revoking a permission the staker had accepted removes its
    /// `staker_balance` from the owner's shared balance.
    pub fn toggle(
        &mut self,
        owner: AccountId,
        staker: AccountId,
        staker_balance: u128,
    ) -> Result<bool, GaugeError> {
        if owner == staker {
            return Err(GaugeError::SelfSharingIsNotAllowed);
        }
        if self.is_permitted(&owner, &staker) {
            if self.owner_of(&staker) == Some(owner) {
                self.detach(staker, owner, staker_balance);
            }
            if let Some(stakers) = self.permitted.get_mut(&owner) {
                stakers.remove(&staker);
                if stakers.is_empty() {
                    self.permitted.remove(&owner);
                }
            }
            return Ok(false);
        }
        if self.owner_of(&owner).is_some() || self.owner_of(&staker).is_some() {
            return Err(GaugeError::CascadedSharingIsNotAllowed);
        }
        self.permitted.entry(owner).or_default().insert(staker);
        Ok(true)
    }

    /// `staker` joins `owner`'s group, moving its contribution from any previous owner.
    pub fn accept(
        &mut self,
        staker: AccountId,
        owner: AccountId,
        staker_balance: u128,
    ) -> Result<Acceptance, GaugeError> {
        if !self.is_permitted(&owner, &staker) {
            return Err(GaugeError::SharingNotPermitted);
        }
        let previous = self.owner_of(&staker);
        if previous == Some(owner) {
            return Ok(Acceptance::Unchanged);
        }
        if self.has_accepted_stakers(&staker) || self.owner_of(&owner).is_some() {
            return Err(GaugeError::CascadedSharingIsNotAllowed);
        }
        let shared = add(self.shared_balance(&owner), staker_balance)?;
        if let Some(previous) = previous {
            self.detach(staker, previous, staker_balance);
        }
        self.accepted.entry(owner).or_default().insert(staker);
        self.owner_of.insert(staker, owner);
        self.shared_balance.insert(owner, shared);
        Ok(Acceptance::Joined { previous })
    }

    /// `staker` leaves its owner's group. Returns the owner it left.
    pub fn reject(
        &mut self,
        staker: AccountId,
        staker_balance: u128,
    ) -> Result<AccountId, GaugeError> {
        let owner = self.owner_of(&staker).ok_or(GaugeError::NotSharingVote)?;
        self.detach(staker, owner, staker_balance);
        Ok(owner)
    }

    /// Record a stake increase of an account that may be sharing.
    pub fn credit(&mut self, staker: &AccountId, amount: u128) -> Result<(), GaugeError> {
        if let Some(owner) = self.owner_of(staker) {
            let shared = add(self.shared_balance(&owner), amount)?;
            self.shared_balance.insert(owner, shared);
        }
        Ok(())
    }

    /// Record a stake decrease of an account that may be sharing.
    pub fn debit(&mut self, staker: &AccountId, amount: u128) {
        if let Some(owner) = self.owner_of(staker) {
            let shared = self.shared_balance(&owner).saturating_sub(amount);
            self.set_shared(owner, shared);
        }
    }

    fn detach(&mut self, staker: AccountId, owner: AccountId, staker_balance: u128) {
        if let Some(stakers) = self.accepted.get_mut(&owner) {
            stakers.remove(&staker);
            if stakers.is_empty() {
                self.accepted.remove(&owner);
            }
        }
        self.owner_of.remove(&staker);
        let shared = self.shared_balance(&owner).saturating_sub(staker_balance);
        self.set_shared(owner, shared);
    }

    fn set_shared(&mut self, owner: AccountId, value: u128) {
        if value == 0 {
            self.shared_balance.remove(&owner);
        } else {
            self.shared_balance.insert(owner, value);
        }
    }
}
