//! # sluice-core
//! Foundation types, traits and reference collaborators for the Sluice
//! reward engine.
//!
//! - [`types`]: `AccountId`, `TokenId`, call `Context`
//! - [`constants`]: time units, fixed-point scale, protocol limits
//! - [`error`]: error enums shared by every crate
//! - [`math`]: 256-bit intermediate fixed-point helpers
//! - [`traits`]: seams to the voting escrow, inflation schedule, gauge
//!   weights, token ledger and liquidity manager
//! - [`schedule`]: halving inflation schedule
//! - [`memory`]: in-memory collaborators for tests and simulation
//! - [`config`]: layered configuration loading

pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod memory;
pub mod schedule;
pub mod traits;
pub mod types;

pub use types::{AccountId, Context, TokenId};
