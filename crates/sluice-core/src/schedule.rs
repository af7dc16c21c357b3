//! Primary reward inflation schedule.
//!
//! The mint rate starts at `initial_rate` and is divided by a fixed reduction
//! coefficient at every epoch boundary:
//!
//! - before `start_time`: rate 0, next boundary is `start_time`
//! - epoch `n` spans `[start + n·len, start + (n+1)·len)` at
//!   `initial_rate · (SCALE / coefficient)^n`
//!
//! With the default coefficient of `2·SCALE` the rate halves each epoch.

use serde::{Deserialize, Serialize};

use crate::config::InflationConfig;
use crate::constants::{MAX_REDUCTION_EPOCHS, SCALE};
use crate::error::ConfigError;
use crate::math::mul_div;
use crate::traits::InflationSchedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalvingSchedule {
    initial_rate: u128,
    start_time: u64,
    epoch_length: u64,
    reduction_coefficient: u128,
}

impl HalvingSchedule {
    /// Build a schedule. The coefficient must be at least `SCALE` (rates never grow)
    /// and epochs must have a positive length.
    pub fn new(
        initial_rate: u128,
        start_time: u64,
        epoch_length: u64,
        reduction_coefficient: u128,
    ) -> Result<Self, ConfigError> {
        if reduction_coefficient < SCALE {
            return Err(ConfigError::Invalid(format!(
                "reduction coefficient {reduction_coefficient} below SCALE"
            )));
        }
        if epoch_length == 0 {
            return Err(ConfigError::Invalid("epoch length must be positive".into()));
        }
        Ok(Self {
            initial_rate,
            start_time,
            epoch_length,
            reduction_coefficient,
        })
    }

    pub fn from_config(cfg: &InflationConfig) -> Result<Self, ConfigError> {
        Self::new(
            cfg.initial_rate as u128,
            cfg.start_time,
            cfg.epoch_length,
            cfg.reduction_coefficient as u128,
        )
    }

    /// Epoch containing `at`, or `None` before minting starts.
    pub fn epoch_at(&self, at: u64) -> Option<u64> {
        at.checked_sub(self.start_time)
            .map(|elapsed| elapsed / self.epoch_length)
    }

    /// Mint rate during `epoch`.
    pub fn epoch_rate(&self, epoch: u64) -> u128 {
        if epoch > MAX_REDUCTION_EPOCHS {
            return 0;
        }
        let mut rate = self.initial_rate;
        for _ in 0..epoch {
            // coefficient >= SCALE, so the quotient never exceeds `rate`
            rate = mul_div(rate, SCALE, self.reduction_coefficient).unwrap_or(0);
            if rate == 0 {
                break;
            }
        }
        rate
    }
}

impl InflationSchedule for HalvingSchedule {
    fn rate(&self, at: u64) -> u128 {
        match self.epoch_at(at) {
            Some(epoch) => self.epoch_rate(epoch),
            None => 0,
        }
    }

    fn next_epoch_boundary(&self, at: u64) -> u64 {
        match self.epoch_at(at) {
            Some(epoch) => self.start_time.saturating_add(
                epoch
                    .saturating_add(1)
                    .saturating_mul(self.epoch_length),
            ),
            None => self.start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::YEAR;
    use proptest::prelude::*;

    fn halving(start: u64) -> HalvingSchedule {
        HalvingSchedule::new(1_000 * SCALE, start, YEAR, 2 * SCALE).unwrap()
    }

    #[test]
    fn zero_before_start() {
        let s = halving(100);
        assert_eq!(s.rate(0), 0);
        assert_eq!(s.rate(99), 0);
        assert_eq!(s.next_epoch_boundary(50), 100);
    }

    #[test]
    fn first_epoch_is_initial_rate() {
        let s = halving(100);
        assert_eq!(s.rate(100), 1_000 * SCALE);
        assert_eq!(s.rate(100 + YEAR - 1), 1_000 * SCALE);
        assert_eq!(s.next_epoch_boundary(100), 100 + YEAR);
    }

    #[test]
    fn halves_at_each_boundary() {
        let s = halving(0);
        assert_eq!(s.rate(YEAR), 500 * SCALE);
        assert_eq!(s.rate(2 * YEAR), 250 * SCALE);
        assert_eq!(s.next_epoch_boundary(YEAR), 2 * YEAR);
        assert_eq!(s.next_epoch_boundary(2 * YEAR - 1), 2 * YEAR);
    }

    #[test]
    fn curve_style_coefficient() {
        // 2^(1/4) scaled; four reductions roughly halve the rate.
        let s = HalvingSchedule::new(SCALE, 0, YEAR, 1_189_207_115_002_721_024).unwrap();
        let after_four = s.epoch_rate(4);
        assert!(after_four > SCALE / 2 - SCALE / 1_000_000);
        assert!(after_four <= SCALE / 2);
    }

    #[test]
    fn exhausts_to_zero() {
        let s = halving(0);
        assert_eq!(s.epoch_rate(200), 0);
        assert_eq!(s.epoch_rate(MAX_REDUCTION_EPOCHS + 1), 0);
    }

    #[test]
    fn rejects_growing_coefficient() {
        assert!(HalvingSchedule::new(SCALE, 0, YEAR, SCALE - 1).is_err());
        assert!(HalvingSchedule::new(SCALE, 0, 0, 2 * SCALE).is_err());
    }

    #[test]
    fn from_default_config() {
        let s = HalvingSchedule::from_config(&InflationConfig::default()).unwrap();
        assert_eq!(s.rate(0), 8 * SCALE);
        assert_eq!(s.rate(YEAR), 4 * SCALE);
    }

    #[test]
    fn is_object_safe() {
        let s: &dyn InflationSchedule = &halving(0);
        assert_eq!(s.rate(0), 1_000 * SCALE);
    }

    proptest! {
        #[test]
        fn rate_never_increases(a in 0u64..(40 * YEAR), b in 0u64..(40 * YEAR)) {
            let s = halving(0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.rate(lo) >= s.rate(hi));
        }

        #[test]
        fn boundary_is_strictly_after(at in 0u64..(40 * YEAR)) {
            let s = halving(YEAR);
            prop_assert!(s.next_epoch_boundary(at) > at);
        }

        #[test]
        fn rate_constant_until_boundary(at in 0u64..(40 * YEAR)) {
            let s = halving(0);
            let boundary = s.next_epoch_boundary(at);
            prop_assert_eq!(s.rate(at), s.rate(boundary - 1));
        }
    }
}
