use crate::error::MathError;

/// Applies a signed liquidity delta to an unsigned liquidity value,
/// failing instead of wrapping at either end of the `u128` range.
pub fn add_delta(x: u128, y: i128) -> Result<u128, MathError> {
    if y < 0 {
        x.checked_sub(y.unsigned_abs()).ok_or(MathError::Underflow)
    } else {
        x.checked_add(y as u128).ok_or(MathError::Overflow)
    }
}

/// Converts an unsigned liquidity amount into the signed delta used by
/// tick bookkeeping.
pub fn to_delta(liquidity: u128, negative: bool) -> Result<i128, MathError> {
    let delta = i128::try_from(liquidity).map_err(|_| MathError::Overflow)?;
    Ok(if negative { -delta } else { delta })
}
