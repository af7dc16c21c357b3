//! # sluice-boost
//! Delegation of voting-escrow power between accounts.
//!
//! A boost lends `amount` of the delegator's power to a receiver and decays
//! linearly to zero at a week-aligned end time no later than the delegator's
//! lock expiry. The receiver may cancel part or all of what remains.
//!
//! - [`decay`]: `LinearDecay` points and slope-change schedules
//! - [`ledger`]: the `BoostLedger` and its serializable state
//! - [`permit`]: Ed25519-signed allowance approvals
//! - [`events`]: observable ledger events
//! - [`power`]: `VotingPower` implementations consumed by gauges

pub mod decay;
pub mod events;
pub mod ledger;
pub mod permit;
pub mod power;

pub use decay::LinearDecay;
pub use events::BoostEvent;
pub use ledger::{Boost, BoostLedger, BoostLedgerState};
pub use permit::Permit;
pub use power::SharedBoostLedger;
