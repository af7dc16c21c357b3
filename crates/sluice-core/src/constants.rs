//! Protocol constants. All token amounts are in base units (1 token = 10^18 units).

/// One whole token in base units.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scale for weights, reduction coefficients and reward integrals.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

pub const DAY: u64 = 86_400;

/// Boost expiries and gauge weights are aligned to this period.
pub const WEEK: u64 = 7 * DAY;

pub const YEAR: u64 = 365 * DAY;

/// Longest lock accepted by the in-memory voting escrow.
///
/// A lock of `amount` for the full duration starts with voting power
/// `amount` (modulo slope truncation) and decays to zero at unlock.
pub const MAX_LOCK_TIME: u64 = 4 * YEAR;

/// Percentage of the raw balance that counts toward the working balance
/// with no voting power at all.
pub const TOKENLESS_PRODUCTION: u128 = 40;

/// Maximum number of secondary reward tokens registered at once.
pub const MAX_REWARD_TOKENS: usize = 8;

/// Allowance value treated as unlimited; never decremented.
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;

/// Rate reductions beyond this many epochs are treated as a zero rate.
pub const MAX_REDUCTION_EPOCHS: u64 = 255;

/// Start of the week containing `timestamp`.
///
/// # Examples
///
/// ```
/// use sluice_core::constants::{week_start, WEEK};
/// assert_eq!(week_start(WEEK + 5), WEEK);
/// assert_eq!(week_start(WEEK), WEEK);
/// ```
pub fn week_start(timestamp: u64) -> u64 {
    timestamp / WEEK * WEEK
}

/// Whether `timestamp` falls exactly on a week boundary.
pub fn is_week_aligned(timestamp: u64) -> bool {
    timestamp % WEEK == 0
}

/// First week boundary strictly after `timestamp`.
pub fn next_week(timestamp: u64) -> u64 {
    week_start(timestamp).saturating_add(WEEK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_is_seven_days() {
        assert_eq!(WEEK, 604_800);
    }

    #[test]
    fn week_start_floors() {
        assert_eq!(week_start(0), 0);
        assert_eq!(week_start(WEEK - 1), 0);
        assert_eq!(week_start(3 * WEEK + 17), 3 * WEEK);
    }

    #[test]
    fn alignment() {
        assert!(is_week_aligned(0));
        assert!(is_week_aligned(52 * WEEK));
        assert!(!is_week_aligned(52 * WEEK + 1));
    }

    #[test]
    fn next_week_is_strictly_after() {
        assert_eq!(next_week(0), WEEK);
        assert_eq!(next_week(WEEK), 2 * WEEK);
        assert_eq!(next_week(WEEK + 1), 2 * WEEK);
    }

    #[test]
    fn next_week_saturates() {
        assert_eq!(next_week(u64::MAX), u64::MAX);
    }

    #[test]
    fn scale_matches_unit() {
        assert_eq!(SCALE, UNIT);
        assert!(TOKENLESS_PRODUCTION < 100);
    }
}
