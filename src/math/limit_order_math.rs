//! Conversions between the two tokens at a limit order's fixed price.
//!
//! `price_x96` is the Q96 price of token0 denominated in token1, as
//! returned by [`get_price_at_tick`](crate::math::tick_math::get_price_at_tick).

use crate::Q96;
use crate::error::{MathError, StateError};
use crate::math::math_helpers::mul_div_round;
use alloy_primitives::U256;

/// Value of `amount0` in token1: `amount0 * price / 2^96`.
#[inline(always)]
pub fn get_amount_1_for_amount_0(
    amount0: U256,
    price_x96: U256,
    round_up: bool,
) -> Result<U256, MathError> {
    mul_div_round(amount0, price_x96, Q96, round_up)
}

/// Value of `amount1` in token0: `amount1 * 2^96 / price`.
#[inline(always)]
pub fn get_amount_0_for_amount_1(
    amount1: U256,
    price_x96: U256,
    round_up: bool,
) -> Result<U256, MathError> {
    mul_div_round(amount1, Q96, price_x96, round_up)
}

/// Input a trader must pay to take `amount_out` from a limit tick, rounded
/// up. `zero_for_one` traders pay token0 for token1 orders.
pub fn get_amount_in_for_amount_out(
    amount_out: U256,
    price_x96: U256,
    zero_for_one: bool,
) -> Result<U256, crate::error::Error> {
    if price_x96.is_zero() {
        return Err(StateError::PriceIsZero.into());
    }
    let amount_in = if zero_for_one {
        get_amount_0_for_amount_1(amount_out, price_x96, true)?
    } else {
        get_amount_1_for_amount_0(amount_out, price_x96, true)?
    };
    Ok(amount_in)
}

/// Output a trader receives for `amount_in` at a limit tick, rounded down.
pub fn get_amount_out_for_amount_in(
    amount_in: U256,
    price_x96: U256,
    zero_for_one: bool,
) -> Result<U256, crate::error::Error> {
    if price_x96.is_zero() {
        return Err(StateError::PriceIsZero.into());
    }
    let amount_out = if zero_for_one {
        get_amount_1_for_amount_0(amount_in, price_x96, false)?
    } else {
        get_amount_0_for_amount_1(amount_in, price_x96, false)?
    };
    Ok(amount_out)
}
