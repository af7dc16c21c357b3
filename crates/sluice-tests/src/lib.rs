//! Cross-crate test suite for Sluice.
//!
//! Scenarios wire a real boost ledger into a gauge through the in-memory
//! collaborators and check the protocol's accounting end to end.

pub mod helpers;
