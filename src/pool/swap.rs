use crate::error::{Error, MathError, PoolError};
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::{mul_div, to_u128, unlikely};
use crate::math::swap_math::{compute_limit_swap_step, compute_swap_step};
use crate::math::tick_bitmap::next_initialized_tick_within_one_word;
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, get_price_at_tick, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio,
};
use crate::pool::Asset;
use crate::pool::hybrid_pool::HybridPool;
use crate::pool::ledger::Ledger;
use crate::pool::position::LimitPositionKey;
use crate::pool::tick;
use crate::{Q128, U256_E4};
use alloy_primitives::{Address, I256, U256};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Derives a swap price limit from a slippage tolerance in basis points.
///
/// The result always lies strictly inside the global sqrt price bounds, so
/// it can be passed to [`HybridPool::swap`] as is.
pub fn sqrt_price_limit_for_slippage(
    sqrt_price_x96: U256,
    zero_for_one: bool,
    tolerance_bps: u32,
) -> Result<U256, Error> {
    let tolerance = U256::from(tolerance_bps.min(10_000));
    let limit = if zero_for_one {
        mul_div(sqrt_price_x96, U256_E4 - tolerance, U256_E4)?
    } else {
        mul_div(sqrt_price_x96, U256_E4 + tolerance, U256_E4)?
    };
    Ok(limit
        .max(MIN_SQRT_RATIO + U256::ONE)
        .min(MAX_SQRT_RATIO - U256::ONE))
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    /// Protocol fee denominators, token0 in the low nibble and token1 in
    /// the high nibble. Zero disables the cut.
    pub fee_protocol: u8,
}

/// A limit position force-burned because a swap consumed its whole tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LimitSettlement {
    pub owner: Address,
    pub asset: Asset,
    pub tick: i32,
    /// Amounts paid to the owner, fees included.
    pub amount0: u128,
    pub amount1: u128,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapResult {
    pub recipient: Address,
    /// Pool-side deltas: positive is paid into the pool, negative out of it.
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub settlements: Vec<LimitSettlement>,
}

// the top level state of the swap, the results of which are recorded in storage at the end
struct SwapState {
    // the amount remaining to be swapped in/out of the input/output asset
    amount_specified_remaining: I256,
    // the amount already swapped out/in of the output/input asset
    amount_calculated: I256,
    // current sqrt(price)
    sqrt_price_x96: U256,
    // the tick associated with the current price
    tick: i32,
    // the current range liquidity
    liquidity: u128,
    // the global fee growth of the input token
    fee_growth_global_x128: U256,
    // amount of input token paid as protocol fee
    protocol_fee: u128,
    // limit ticks on the consumed side that still hold liquidity
    limit_ticks: BTreeSet<i32>,
    // limit ticks fully consumed, settled once the transfers are done
    crossed_limit_ticks: Vec<i32>,
}

impl SwapState {
    /// Best resting limit tick for the trader: the highest token1 order when
    /// selling token0, the lowest token0 order when selling token1.
    #[inline]
    fn best_limit_tick(&self, zero_for_one: bool) -> Option<i32> {
        if zero_for_one {
            self.limit_ticks.last().copied()
        } else {
            self.limit_ticks.first().copied()
        }
    }

    fn record_amounts(&mut self, exact_input: bool, amount_in: U256, amount_out: U256, fee_amount: U256) {
        if exact_input {
            self.amount_specified_remaining -= I256::from_raw(amount_in + fee_amount);
            self.amount_calculated -= I256::from_raw(amount_out);
        } else {
            self.amount_specified_remaining += I256::from_raw(amount_out);
            self.amount_calculated += I256::from_raw(amount_in + fee_amount);
        }
    }

    /// Splits off the protocol's share of `fee_amount` and returns the rest.
    fn take_protocol_fee(&mut self, fee_amount: U256, fee_protocol: u8) -> Result<U256, MathError> {
        if fee_protocol == 0 {
            return Ok(fee_amount);
        }
        let delta = fee_amount / U256::from(fee_protocol);
        self.protocol_fee = self.protocol_fee.wrapping_add(to_u128(delta)?);
        Ok(fee_amount - delta)
    }
}

#[derive(Default)]
struct StepComputations {
    // the price at the beginning of the step
    sqrt_price_start_x96: U256,
    // the next tick to swap to from the current tick in the swap direction
    tick_next: i32,
    // whether tick_next is initialized or not
    initialized: bool,
    // sqrt(price) for the next tick (1/0)
    sqrt_price_next_x96: U256,
    // how much is being swapped in this step
    amount_in: U256,
    // how much is being swapped out
    amount_out: U256,
    // how much fee is being paid in
    fee_amount: U256,
}

impl HybridPool {
    /// Swaps against limit orders and range liquidity, best price first.
    ///
    /// A positive `amount_specified` is an exact input, a negative one an
    /// exact output. The price never moves past `sqrt_price_limit_x96`.
    /// The recipient pays the input and receives the output. Limit ticks
    /// the swap consumes entirely are settled after the transfers, paying
    /// every owner there and removing their positions.
    pub fn swap<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Result<SwapResult, Error> {
        self.transact(ledger, "swap", |pool, ledger| {
            pool.swap_inner(
                ledger,
                recipient,
                zero_for_one,
                amount_specified,
                sqrt_price_limit_x96,
            )
        })
    }

    fn swap_inner<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Result<SwapResult, Error> {
        self.require_initialized()?;
        if unlikely(amount_specified.is_zero()) {
            return Err(PoolError::ZeroAmount.into());
        }

        let slot0_start = self.slot0;
        let limit_in_bounds = if zero_for_one {
            sqrt_price_limit_x96 < slot0_start.sqrt_price_x96 && sqrt_price_limit_x96 > MIN_SQRT_RATIO
        } else {
            sqrt_price_limit_x96 > slot0_start.sqrt_price_x96 && sqrt_price_limit_x96 < MAX_SQRT_RATIO
        };
        if unlikely(!limit_in_bounds) {
            return Err(PoolError::InvalidPriceLimit.into());
        }

        let exact_input = amount_specified.is_positive();
        let fee_pips = self.config.fee_pips;
        let tick_spacing = self.config.tick_spacing;
        let fee_protocol = if zero_for_one {
            slot0_start.fee_protocol % 16
        } else {
            slot0_start.fee_protocol >> 4
        };
        let limit_asset = Asset::consumed_by(zero_for_one);

        let mut state = SwapState {
            amount_specified_remaining: amount_specified,
            amount_calculated: I256::ZERO,
            sqrt_price_x96: slot0_start.sqrt_price_x96,
            tick: slot0_start.tick,
            liquidity: self.liquidity,
            fee_growth_global_x128: if zero_for_one {
                self.fee_growth_global0_x128
            } else {
                self.fee_growth_global1_x128
            },
            protocol_fee: 0,
            limit_ticks: self.limit_ticks.ticks_with_liquidity(limit_asset),
            crossed_limit_ticks: Vec::new(),
        };

        while !state.amount_specified_remaining.is_zero()
            && state.sqrt_price_x96 != sqrt_price_limit_x96
        {
            // limit orders at or better than the current price go first
            let best_limit_tick = state.best_limit_tick(zero_for_one);
            let mut best_limit_sqrt_price = None;
            if let Some(limit_tick) = best_limit_tick {
                let sqrt_price_tick = get_sqrt_ratio_at_tick(limit_tick)?;
                let eligible = if zero_for_one {
                    sqrt_price_tick >= state.sqrt_price_x96
                } else {
                    sqrt_price_tick <= state.sqrt_price_x96
                };

                if eligible {
                    let crossed = self.limit_step(
                        &mut state,
                        limit_asset,
                        limit_tick,
                        exact_input,
                        zero_for_one,
                        fee_protocol,
                    )?;
                    if crossed {
                        continue;
                    }
                    if !state.amount_specified_remaining.is_zero() {
                        return Err(PoolError::InvariantViolation(
                            "partial limit fill left an amount to swap",
                        )
                        .into());
                    }
                    break;
                }
                best_limit_sqrt_price = Some(sqrt_price_tick);
            }

            let mut step = StepComputations {
                sqrt_price_start_x96: state.sqrt_price_x96,
                ..StepComputations::default()
            };

            (step.tick_next, step.initialized) = next_initialized_tick_within_one_word(
                &self.bitmap,
                state.tick,
                tick_spacing,
                zero_for_one,
            )?;

            // the bitmap is not aware of the tick bounds
            step.tick_next = step.tick_next.max(MIN_TICK).min(MAX_TICK);

            step.sqrt_price_next_x96 = get_sqrt_ratio_at_tick(step.tick_next)?;

            // never run past the hard limit nor past the next resting limit order
            let mut sqrt_price_target_x96 = if zero_for_one {
                step.sqrt_price_next_x96.max(sqrt_price_limit_x96)
            } else {
                step.sqrt_price_next_x96.min(sqrt_price_limit_x96)
            };
            if let Some(sqrt_price_tick) = best_limit_sqrt_price {
                sqrt_price_target_x96 = if zero_for_one {
                    sqrt_price_target_x96.max(sqrt_price_tick)
                } else {
                    sqrt_price_target_x96.min(sqrt_price_tick)
                };
            }

            (
                state.sqrt_price_x96,
                step.amount_in,
                step.amount_out,
                step.fee_amount,
            ) = compute_swap_step(
                state.sqrt_price_x96,
                sqrt_price_target_x96,
                state.liquidity,
                state.amount_specified_remaining,
                fee_pips,
            )?;

            state.record_amounts(exact_input, step.amount_in, step.amount_out, step.fee_amount);
            let fee_amount = state.take_protocol_fee(step.fee_amount, fee_protocol)?;
            if state.liquidity > 0 {
                state.fee_growth_global_x128 = state
                    .fee_growth_global_x128
                    .wrapping_add(mul_div(fee_amount, Q128, U256::from(state.liquidity))?);
            }

            trace!(
                tick_next = step.tick_next,
                initialized = step.initialized,
                sqrt_price_x96 = %state.sqrt_price_x96,
                amount_in = %step.amount_in,
                amount_out = %step.amount_out,
                fee_amount = %step.fee_amount,
                "range step"
            );

            if state.sqrt_price_x96 == step.sqrt_price_next_x96 {
                if step.initialized {
                    let (fee_growth_global0_x128, fee_growth_global1_x128) = if zero_for_one {
                        (state.fee_growth_global_x128, self.fee_growth_global1_x128)
                    } else {
                        (self.fee_growth_global0_x128, state.fee_growth_global_x128)
                    };
                    let mut liquidity_net = tick::cross(
                        &mut self.ticks,
                        step.tick_next,
                        fee_growth_global0_x128,
                        fee_growth_global1_x128,
                    )?;
                    // moving leftward, liquidity_net is applied with the opposite sign
                    if zero_for_one {
                        liquidity_net = -liquidity_net;
                    }
                    state.liquidity = add_delta(state.liquidity, liquidity_net)?;
                    trace!(tick = step.tick_next, liquidity = state.liquidity, "crossed range tick");
                }
                state.tick = if zero_for_one {
                    step.tick_next - 1
                } else {
                    step.tick_next
                };
            } else if state.sqrt_price_x96 != step.sqrt_price_start_x96 {
                state.tick = get_tick_at_sqrt_ratio(state.sqrt_price_x96)?;
            }
        }

        self.slot0.sqrt_price_x96 = state.sqrt_price_x96;
        self.slot0.tick = state.tick;
        self.liquidity = state.liquidity;
        if zero_for_one {
            self.fee_growth_global0_x128 = state.fee_growth_global_x128;
            self.protocol_fees.token0 = self.protocol_fees.token0.wrapping_add(state.protocol_fee);
        } else {
            self.fee_growth_global1_x128 = state.fee_growth_global_x128;
            self.protocol_fees.token1 = self.protocol_fees.token1.wrapping_add(state.protocol_fee);
        }

        let (amount0, amount1) = if zero_for_one == exact_input {
            (
                amount_specified - state.amount_specified_remaining,
                state.amount_calculated,
            )
        } else {
            (
                state.amount_calculated,
                amount_specified - state.amount_specified_remaining,
            )
        };

        // pay out first, then pull the input
        let (asset_in, amount_in, amount_out) = if zero_for_one {
            (Asset::Token0, amount0, amount1)
        } else {
            (Asset::Token1, amount1, amount0)
        };
        if amount_out.is_negative() {
            self.push(ledger, recipient, asset_in.other(), amount_out.unsigned_abs())?;
        }
        if amount_in.is_positive() {
            self.pull(ledger, recipient, asset_in, amount_in.into_raw())?;
        }

        let settlements = self.settle_crossed_limit_ticks(ledger, limit_asset, &state.crossed_limit_ticks)?;

        debug!(
            %recipient,
            zero_for_one,
            %amount_specified,
            %amount0,
            %amount1,
            sqrt_price_x96 = %state.sqrt_price_x96,
            tick = state.tick,
            liquidity = state.liquidity,
            crossed_limit_ticks = state.crossed_limit_ticks.len(),
            "swapped"
        );

        Ok(SwapResult {
            recipient,
            amount0,
            amount1,
            sqrt_price_x96: state.sqrt_price_x96,
            liquidity: state.liquidity,
            tick: state.tick,
            settlements,
        })
    }

    /// Fills the limit tick `limit_tick` as far as the remaining amount
    /// allows, at the tick's own price. Returns whether the tick was
    /// consumed entirely. The pool price does not move.
    fn limit_step(
        &mut self,
        state: &mut SwapState,
        asset: Asset,
        limit_tick: i32,
        exact_input: bool,
        zero_for_one: bool,
        fee_protocol: u8,
    ) -> Result<bool, Error> {
        let fee_pips = self.config.fee_pips;
        let price_x96 = get_price_at_tick(limit_tick)?;
        let info = self
            .limit_ticks
            .get_mut(asset, limit_tick)
            .ok_or(PoolError::InvariantViolation("limit tick missing from the store"))?;

        let step = compute_limit_swap_step(
            price_x96,
            info.liquidity_left,
            &info.unswapped_fraction,
            state.amount_specified_remaining,
            fee_pips,
            zero_for_one,
        )?;

        state.record_amounts(exact_input, step.amount_in, step.amount_out, step.fee_amount);
        let fee_amount = state.take_protocol_fee(step.fee_amount, fee_protocol)?;
        info.accrue_fee(fee_amount)?;

        info.liquidity_left = info
            .liquidity_left
            .checked_sub(to_u128(step.amount_out)?)
            .ok_or(PoolError::InvariantViolation("limit fill exceeds liquidity left"))?;
        info.unswapped_fraction = step.unswapped_fraction;

        trace!(
            tick = limit_tick,
            ?asset,
            amount_in = %step.amount_in,
            amount_out = %step.amount_out,
            fee_amount = %step.fee_amount,
            liquidity_left = info.liquidity_left,
            crossed = step.crossed,
            "limit step"
        );

        if step.crossed {
            if info.liquidity_left != 0 {
                return Err(PoolError::InvariantViolation("crossed limit tick kept liquidity").into());
            }
            state.limit_ticks.remove(&limit_tick);
            state.crossed_limit_ticks.push(limit_tick);
        }
        Ok(step.crossed)
    }

    /// Burns every position at each consumed limit tick, paying their owners.
    fn settle_crossed_limit_ticks<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        asset: Asset,
        crossed_limit_ticks: &[i32],
    ) -> Result<Vec<LimitSettlement>, Error> {
        let mut settlements = Vec::new();
        for &limit_tick in crossed_limit_ticks {
            let owners = self
                .limit_ticks
                .get(asset, limit_tick)
                .ok_or(PoolError::InvariantViolation("crossed limit tick missing from the store"))?
                .owners
                .clone();

            for owner in owners {
                let liquidity = self
                    .limit_positions
                    .get(&LimitPositionKey {
                        owner,
                        asset,
                        tick: limit_tick,
                    })
                    .ok_or(PoolError::InvariantViolation("limit tick owner without a position"))?
                    .liquidity;
                let burn = self.burn_limit_order_inner(ledger, owner, asset, limit_tick, liquidity)?;
                debug!(
                    %owner,
                    ?asset,
                    tick = limit_tick,
                    amount0 = burn.collected0,
                    amount1 = burn.collected1,
                    "settled crossed limit order"
                );
                settlements.push(LimitSettlement {
                    owner,
                    asset,
                    tick: limit_tick,
                    amount0: burn.collected0,
                    amount1: burn.collected1,
                });
            }

            if self.limit_ticks.get(asset, limit_tick).is_some() {
                return Err(PoolError::InvariantViolation("crossed limit tick survived settlement").into());
            }
        }
        Ok(settlements)
    }
}
