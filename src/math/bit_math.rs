use crate::error::MathError;
use alloy_primitives::U256;

/// Index (0-255) of the highest set bit of `x`.
///
/// Used to walk a tick bitmap word downwards.
#[inline(always)]
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok((255 - x.leading_zeros()) as u8)
}

/// Index (0-255) of the lowest set bit of `x`.
///
/// Used to walk a tick bitmap word upwards.
#[inline(always)]
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}
