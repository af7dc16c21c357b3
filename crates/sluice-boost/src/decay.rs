//! Linearly decaying quantities.
//!
//! A [`LinearDecay`] is a point `(timestamp, bias, slope)` on a line that
//! falls by `slope` per second and is floored at zero. Aggregates of many
//! such lines are kept exact by pairing them with a slope-change schedule:
//! each contributor's slope is registered at its expiry and removed from the
//! aggregate when [`LinearDecay::advance`] walks past that instant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sluice_core::error::MathError;
use sluice_core::math;

/// Slope reductions keyed by the timestamp at which they apply.
pub type SlopeChanges = BTreeMap<u64, u128>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearDecay {
    pub timestamp: u64,
    pub bias: u128,
    pub slope: u128,
}

impl LinearDecay {
    pub fn new(timestamp: u64, bias: u128, slope: u128) -> Self {
        Self {
            timestamp,
            bias,
            slope,
        }
    }

    /// `max(0, bias − slope·(t − timestamp))`. Times before `timestamp` read as `bias`.
    pub fn value_at(&self, t: u64) -> u128 {
        if t <= self.timestamp {
            return self.bias;
        }
        let decayed = self.slope.saturating_mul((t - self.timestamp) as u128);
        self.bias.saturating_sub(decayed)
    }

    /// Move the point forward to `now`, applying every slope change in
    /// `(timestamp, now]` at its own instant.
    ///
    /// Returns `self` unchanged if `now` is not after `timestamp`.
    pub fn advance(&self, now: u64, changes: &SlopeChanges) -> Self {
        if now <= self.timestamp {
            return *self;
        }
        let mut point = *self;
        for (&at, &drop) in changes.range(point.timestamp + 1..=now) {
            point.bias = point.value_at(at);
            point.slope = point.slope.saturating_sub(drop);
            point.timestamp = at;
        }
        point.bias = point.value_at(now);
        point.timestamp = now;
        point
    }

    /// Sum of two points taken at the same instant.
    pub fn combine(&self, bias: u128, slope: u128) -> Result<Self, MathError> {
        Ok(Self {
            timestamp: self.timestamp,
            bias: math::add(self.bias, bias)?,
            slope: math::add(self.slope, slope)?,
        })
    }

    /// Remove a contribution taken at the same instant. Floors at zero.
    pub fn sub(&self, bias: u128, slope: u128) -> Self {
        Self {
            timestamp: self.timestamp,
            bias: self.bias.saturating_sub(bias),
            slope: self.slope.saturating_sub(slope),
        }
    }
}

/// Register `slope` to drop out of an aggregate at `at`.
pub fn schedule_drop(changes: &mut SlopeChanges, at: u64, slope: u128) -> Result<(), MathError> {
    let entry = changes.entry(at).or_insert(0);
    *entry = math::add(*entry, slope)?;
    Ok(())
}

/// Take back part of a previously scheduled drop. Empty entries are removed.
pub fn cancel_drop(changes: &mut SlopeChanges, at: u64, slope: u128) {
    if let Some(entry) = changes.get_mut(&at) {
        *entry = entry.saturating_sub(slope);
        if *entry == 0 {
            changes.remove(&at);
        }
    }
}

/// Drop entries at or before `now`; they have already been applied.
pub fn prune(changes: &mut SlopeChanges, now: u64) {
    *changes = changes.split_off(&now.saturating_add(1));
}
