use crate::error::{Error, StateError};
use crate::math::fraction::UnswappedFraction;
use crate::math::limit_order_math::{get_amount_in_for_amount_out, get_amount_out_for_amount_in};
use crate::math::math_helpers::{mul_div, mul_div_rounding_up, to_u128};
use crate::math::sqrt_price_math::{
    get_amount_0_delta_base, get_amount_1_delta_base, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output,
};
use crate::{FEE_DENOMINATOR, U256_E6};
use alloy_primitives::{I256, U256};

/// Computes one swap step against range liquidity between the current
/// price and `sqrt_ratio_target_x96`, returning
/// `(sqrt_ratio_next_x96, amount_in, amount_out, fee_amount)`.
///
/// The price never moves past the target. A positive `amount_remaining`
/// is an exact input (fee included), a negative one an exact output. When
/// an exact input does not reach the target, whatever is left after
/// `amount_in` is taken as fee.
pub fn compute_swap_step(
    sqrt_ratio_current_x96: U256,
    sqrt_ratio_target_x96: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<(U256, U256, U256, U256), Error> {
    let zero_for_one = sqrt_ratio_current_x96 >= sqrt_ratio_target_x96;
    let exact_in = !amount_remaining.is_negative();
    let remaining_abs = amount_remaining.unsigned_abs();
    let fee = U256::from(fee_pips);

    let sqrt_ratio_next_x96: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(remaining_abs, U256_E6 - fee, U256_E6)?;
        amount_in = if zero_for_one {
            get_amount_0_delta_base(
                sqrt_ratio_target_x96,
                sqrt_ratio_current_x96,
                liquidity,
                true,
            )?
        } else {
            get_amount_1_delta_base(
                sqrt_ratio_current_x96,
                sqrt_ratio_target_x96,
                liquidity,
                true,
            )?
        };
        sqrt_ratio_next_x96 = if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_input(
                sqrt_ratio_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
    } else {
        amount_out = if zero_for_one {
            get_amount_1_delta_base(
                sqrt_ratio_target_x96,
                sqrt_ratio_current_x96,
                liquidity,
                false,
            )?
        } else {
            get_amount_0_delta_base(
                sqrt_ratio_current_x96,
                sqrt_ratio_target_x96,
                liquidity,
                false,
            )?
        };
        sqrt_ratio_next_x96 = if remaining_abs >= amount_out {
            sqrt_ratio_target_x96
        } else {
            get_next_sqrt_price_from_output(
                sqrt_ratio_current_x96,
                liquidity,
                remaining_abs,
                zero_for_one,
            )?
        };
    }

    let max = sqrt_ratio_target_x96 == sqrt_ratio_next_x96;

    if zero_for_one {
        if !(max && exact_in) {
            amount_in = get_amount_0_delta_base(
                sqrt_ratio_next_x96,
                sqrt_ratio_current_x96,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = get_amount_1_delta_base(
                sqrt_ratio_next_x96,
                sqrt_ratio_current_x96,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(max && exact_in) {
            amount_in = get_amount_1_delta_base(
                sqrt_ratio_current_x96,
                sqrt_ratio_next_x96,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = get_amount_0_delta_base(
                sqrt_ratio_current_x96,
                sqrt_ratio_next_x96,
                liquidity,
                false,
            )?;
        }
    }

    // cap the output amount to not exceed the remaining output amount
    if !exact_in && amount_out > remaining_abs {
        amount_out = remaining_abs;
    }

    let fee_amount = if exact_in && sqrt_ratio_next_x96 != sqrt_ratio_target_x96 {
        remaining_abs - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee, U256_E6 - fee)?
    };

    Ok((sqrt_ratio_next_x96, amount_in, amount_out, fee_amount))
}

/// Result of filling (part of) one limit tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LimitSwapStep {
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
    /// Every unit of liquidity left at the tick was consumed.
    pub crossed: bool,
    /// Unswapped fraction of the tick after this step; zero when crossed.
    pub unswapped_fraction: UnswappedFraction,
}

/// Computes one fill against a limit tick resting at the fixed price
/// `price_x96` holding `liquidity_left` of the output token.
///
/// `zero_for_one` traders pay token0 and take token1 orders; the reverse
/// direction pays token1 and takes token0 orders. Inputs are rounded up
/// and outputs down. On a partial fill the unswapped fraction shrinks by
/// exactly the filled share of `liquidity_left`, rounded down.
pub fn compute_limit_swap_step(
    price_x96: U256,
    liquidity_left: u128,
    unswapped_fraction: &UnswappedFraction,
    amount_remaining: I256,
    fee_pips: u32,
    zero_for_one: bool,
) -> Result<LimitSwapStep, Error> {
    if liquidity_left == 0 {
        return Err(StateError::LiquidityIsZero.into());
    }
    if fee_pips >= FEE_DENOMINATOR {
        return Err(crate::error::MathError::OutOfBounds.into());
    }

    let exact_in = !amount_remaining.is_negative();
    let remaining_abs = amount_remaining.unsigned_abs();
    let fee = U256::from(fee_pips);
    let max_out = U256::from(liquidity_left);

    let (amount_in, amount_out, crossed) = if exact_in {
        let amount_remaining_less_fee = mul_div(remaining_abs, U256_E6 - fee, U256_E6)?;
        let amount_in_max = get_amount_in_for_amount_out(max_out, price_x96, zero_for_one)?;
        if amount_remaining_less_fee >= amount_in_max {
            (amount_in_max, max_out, true)
        } else {
            let amount_out =
                get_amount_out_for_amount_in(amount_remaining_less_fee, price_x96, zero_for_one)?;
            (amount_remaining_less_fee, amount_out.min(max_out), false)
        }
    } else if remaining_abs >= max_out {
        let amount_in = get_amount_in_for_amount_out(max_out, price_x96, zero_for_one)?;
        (amount_in, max_out, true)
    } else {
        let amount_in = get_amount_in_for_amount_out(remaining_abs, price_x96, zero_for_one)?;
        (amount_in, remaining_abs, false)
    };

    let fee_amount = if exact_in && !crossed {
        remaining_abs - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee, U256_E6 - fee)?
    };

    let unswapped_fraction = if crossed {
        UnswappedFraction::ZERO
    } else {
        unswapped_fraction.after_fill(to_u128(amount_out)?, liquidity_left)?
    };

    Ok(LimitSwapStep {
        amount_in,
        amount_out,
        fee_amount,
        crossed,
        unswapped_fraction,
    })
}
