//! Range and limit positions and their update rules.

use crate::Q128;
use crate::error::{Error, MathError, PoolError};
use crate::math::fraction::UnswappedFraction;
use crate::math::limit_order_math::{get_amount_0_for_amount_1, get_amount_1_for_amount_0};
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::{mul_div, to_u128};
use crate::pool::Asset;
use crate::pool::tick::LimitTickInfo;
use alloy_primitives::{Address, U256};

/// Keeps the low 128 bits, the way owed balances are narrowed on-chain.
#[inline(always)]
fn truncate_u128(x: U256) -> u128 {
    let l = x.as_limbs();
    l[0] as u128 | (l[1] as u128) << 64
}

/// Fees earned by `liquidity` between two fee growth readings, narrowed
/// to 128 bits with wraparound.
#[inline]
fn fees_owed(growth_now: U256, growth_last: U256, liquidity: u128) -> Result<u128, MathError> {
    let owed = mul_div(growth_now.wrapping_sub(growth_last), U256::from(liquidity), Q128)?;
    Ok(truncate_u128(owed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub owner: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub liquidity: u128,
    pub fee_growth_inside0_last_x128: U256,
    pub fee_growth_inside1_last_x128: U256,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

impl PositionInfo {
    /// Credits fees earned since the last touch and applies
    /// `liquidity_delta`. Owed balances wrap at 128 bits.
    pub fn update(
        &mut self,
        liquidity_delta: i128,
        fee_growth_inside0_x128: U256,
        fee_growth_inside1_x128: U256,
    ) -> Result<(), Error> {
        let liquidity_next = if liquidity_delta == 0 {
            if self.liquidity == 0 {
                // pokes on an empty position are not allowed
                return Err(PoolError::PositionNotFound.into());
            }
            self.liquidity
        } else {
            add_delta(self.liquidity, liquidity_delta).map_err(|err| match err {
                MathError::Underflow => Error::from(PoolError::InsufficientLiquidity),
                other => other.into(),
            })?
        };

        let owed0 = fees_owed(
            fee_growth_inside0_x128,
            self.fee_growth_inside0_last_x128,
            self.liquidity,
        )?;
        let owed1 = fees_owed(
            fee_growth_inside1_x128,
            self.fee_growth_inside1_last_x128,
            self.liquidity,
        )?;

        self.liquidity = liquidity_next;
        self.fee_growth_inside0_last_x128 = fee_growth_inside0_x128;
        self.fee_growth_inside1_last_x128 = fee_growth_inside1_x128;
        self.tokens_owed0 = self.tokens_owed0.wrapping_add(owed0);
        self.tokens_owed1 = self.tokens_owed1.wrapping_add(owed1);
        Ok(())
    }

    /// Nothing left to burn or collect.
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed0 == 0 && self.tokens_owed1 == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LimitPositionKey {
    pub owner: Address,
    pub asset: Asset,
    pub tick: i32,
}

/// A limit order. `liquidity` is denominated in the deposit token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LimitPositionInfo {
    pub liquidity: u128,
    /// The tick's unswapped fraction this position is measured against.
    /// Never below the tick's current fraction.
    pub unswapped_fraction: UnswappedFraction,
    pub fee_growth_inside_last_x128: U256,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

/// Split of a limit burn, both sides in their own token units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LimitBurnSplit {
    /// Deposit token returned unswapped.
    pub unswapped: u128,
    /// Deposit-token units that had been swapped away.
    pub swapped: u128,
    /// `swapped` valued in the other token at the tick price.
    pub swapped_converted: u128,
}

impl LimitPositionInfo {
    /// A new, empty position measured from the tick's current state.
    pub fn new(tick: &LimitTickInfo) -> Self {
        Self {
            liquidity: 0,
            unswapped_fraction: tick.unswapped_fraction,
            fee_growth_inside_last_x128: tick.fee_growth_inside_x128,
            tokens_owed0: 0,
            tokens_owed1: 0,
        }
    }

    fn credit(&mut self, asset: Asset, amount: u128) {
        match asset {
            Asset::Token0 => self.tokens_owed0 = self.tokens_owed0.wrapping_add(amount),
            Asset::Token1 => self.tokens_owed1 = self.tokens_owed1.wrapping_add(amount),
        }
    }

    /// Credits limit order fees since the last touch. Fees are paid by
    /// swappers in the token opposite to `asset`.
    pub fn accrue_fees(&mut self, asset: Asset, tick: &LimitTickInfo) -> Result<(), Error> {
        let fees = fees_owed(
            tick.fee_growth_inside_x128,
            self.fee_growth_inside_last_x128,
            self.liquidity,
        )?;
        self.fee_growth_inside_last_x128 = tick.fee_growth_inside_x128;
        self.credit(asset.other(), fees);
        Ok(())
    }

    /// Adds `amount` to a position that may already be partially filled.
    ///
    /// The snapshot fraction is moved so that the new total, measured
    /// against it, holds exactly the old unswapped share plus `amount`
    /// (rounded up). Burning everything afterwards therefore credits the
    /// old liquidity's swapped amount again, never more.
    pub fn mint(&mut self, amount: u128, tick: &LimitTickInfo) -> Result<(), Error> {
        let liquidity_next = self
            .liquidity
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;

        let current = tick.unswapped_fraction;
        if self.liquidity > 0 && self.unswapped_fraction != current {
            let unswapped_before =
                current.apply_to(self.liquidity, &self.unswapped_fraction, true)?;
            let unswapped_next = unswapped_before
                .checked_add(amount)
                .ok_or(MathError::Overflow)?;
            let snapshot = current.mul_ratio(
                U256::from(liquidity_next),
                U256::from(unswapped_next),
                true,
            )?;
            self.unswapped_fraction = snapshot.max(current).min(self.unswapped_fraction);
        } else {
            self.unswapped_fraction = current;
        }
        self.liquidity = liquidity_next;
        Ok(())
    }

    /// Removes `amount` from the position and credits its unswapped share
    /// in `asset` and its swapped share, converted at `price_x96`, in the
    /// other token. Each share is rounded down, so `unswapped + swapped`
    /// may fall one unit short of `amount`.
    pub fn burn(
        &mut self,
        asset: Asset,
        amount: u128,
        price_x96: U256,
        tick: &LimitTickInfo,
    ) -> Result<LimitBurnSplit, Error> {
        if amount > self.liquidity {
            return Err(PoolError::InsufficientLiquidity.into());
        }
        let current = tick.unswapped_fraction;
        let unswapped = current.apply_to(amount, &self.unswapped_fraction, false)?;
        // both shares round down, the unit in between stays in the pool
        let swapped = amount - current.apply_to(amount, &self.unswapped_fraction, true)?;

        let converted = match asset {
            Asset::Token0 => get_amount_1_for_amount_0(U256::from(swapped), price_x96, false)?,
            Asset::Token1 => get_amount_0_for_amount_1(U256::from(swapped), price_x96, false)?,
        };
        let swapped_converted = to_u128(converted)?;

        self.liquidity -= amount;
        self.credit(asset, unswapped);
        self.credit(asset.other(), swapped_converted);

        Ok(LimitBurnSplit {
            unswapped,
            swapped,
            swapped_converted,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed0 == 0 && self.tokens_owed1 == 0
    }
}
