//! Fixed-point helpers with 256-bit intermediates.
//!
//! Ledger values are `u128`; products such as `rate * weight * dt` can exceed
//! that range before the final division, so they are formed in [`U256`] and
//! narrowed back with an explicit overflow error.

use primitive_types::U256;

use crate::error::MathError;

/// Narrow a 256-bit value to `u128`.
pub fn narrow(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.as_u128())
}

/// `a * b / denom`, rounded down.
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(denom))
}

/// `a * b * c / denom`, rounded down. The triple product always fits 256 bits.
pub fn mul_mul_div(a: u128, b: u128, c: u128, denom: u128) -> Result<u128, MathError> {
    if denom == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .and_then(|ab| ab.checked_mul(U256::from(c)))
        .ok_or(MathError::Overflow)?;
    narrow(product / U256::from(denom))
}

pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn mul(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}
