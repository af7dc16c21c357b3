//! # sluice-gauge
//! Liquidity gauge for the Sluice reward engine.
//!
//! Stakers deposit a staking token and earn a primary reward in proportion
//! to their boost-weighted working balance, plus any number of secondary
//! reward tokens in proportion to their raw balance.
//!
//! - [`gauge`]: `Gauge` staking, checkpoints, kicks, administration
//! - [`rewards`]: secondary reward tokens and claims
//! - [`working`]: working-balance formula and pro-rata group splits
//! - [`integral`]: primary and secondary integral advancement
//! - [`sharing`]: the vote-sharing registry
//! - [`custody`]: direct custody and liquidity-manager delegation
//! - [`state`]: serializable gauge state
//! - [`events`]: observable gauge events

pub mod custody;
pub mod events;
pub mod gauge;
pub mod integral;
pub mod rewards;
pub mod sharing;
pub mod state;
pub mod working;

#[cfg(test)]
mod testkit;

pub use custody::{Custody, HoldingManager};
pub use events::GaugeEvent;
pub use gauge::{Collaborators, Gauge};
pub use sharing::VoteSharing;
pub use state::GaugeState;
