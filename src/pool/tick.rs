//! Per-tick state for both liquidity kinds.

use crate::FastMap;
use crate::Q128;
use crate::error::{Error, MathError, PoolError};
use crate::math::fraction::UnswappedFraction;
use crate::math::liquidity_math::add_delta;
use crate::math::math_helpers::mul_div;
use crate::pool::Asset;
use alloy_primitives::{Address, U256};
use std::collections::BTreeSet;

/// Range tick. Present in the store iff `liquidity_gross > 0`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickInfo {
    /// Total liquidity of positions referencing this tick.
    pub liquidity_gross: u128,
    /// Liquidity added when the tick is crossed left to right.
    pub liquidity_net: i128,
    /// Fee growth on the other side of this tick, relative to the current
    /// tick. Only differences between readings are meaningful.
    pub fee_growth_outside0_x128: U256,
    pub fee_growth_outside1_x128: U256,
}

/// Applies a liquidity change to a range tick and returns whether the tick
/// flipped between initialized and uninitialized.
///
/// Adding liquidity creates the tick on demand. Removing liquidity from a
/// tick that is not stored is an invariant violation.
#[allow(clippy::too_many_arguments)]
pub fn update(
    ticks: &mut FastMap<i32, TickInfo>,
    tick: i32,
    tick_current: i32,
    liquidity_delta: i128,
    fee_growth_global0_x128: U256,
    fee_growth_global1_x128: U256,
    upper: bool,
    max_liquidity: u128,
) -> Result<bool, Error> {
    let info = if liquidity_delta > 0 {
        ticks.entry(tick).or_default()
    } else {
        ticks
            .get_mut(&tick)
            .ok_or(PoolError::InvariantViolation("range tick missing from the store"))?
    };

    let liquidity_gross_before = info.liquidity_gross;
    let liquidity_gross_after = add_delta(liquidity_gross_before, liquidity_delta)?;
    if liquidity_gross_after > max_liquidity {
        return Err(PoolError::LiquidityOverflow.into());
    }

    let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

    if liquidity_gross_before == 0 && tick <= tick_current {
        // by convention, all growth before a tick was initialized happened below it
        info.fee_growth_outside0_x128 = fee_growth_global0_x128;
        info.fee_growth_outside1_x128 = fee_growth_global1_x128;
    }

    info.liquidity_gross = liquidity_gross_after;
    info.liquidity_net = if upper {
        info.liquidity_net.checked_sub(liquidity_delta)
    } else {
        info.liquidity_net.checked_add(liquidity_delta)
    }
    .ok_or(MathError::Overflow)?;

    Ok(flipped)
}

pub fn clear(ticks: &mut FastMap<i32, TickInfo>, tick: i32) {
    ticks.remove(&tick);
}

/// Flips the fee growth outside of `tick` as the price crosses it and
/// returns its `liquidity_net`.
pub fn cross(
    ticks: &mut FastMap<i32, TickInfo>,
    tick: i32,
    fee_growth_global0_x128: U256,
    fee_growth_global1_x128: U256,
) -> Result<i128, Error> {
    let info = ticks
        .get_mut(&tick)
        .ok_or(PoolError::InvariantViolation("initialized range tick missing from the store"))?;
    info.fee_growth_outside0_x128 = fee_growth_global0_x128.wrapping_sub(info.fee_growth_outside0_x128);
    info.fee_growth_outside1_x128 = fee_growth_global1_x128.wrapping_sub(info.fee_growth_outside1_x128);
    Ok(info.liquidity_net)
}

/// Fee growth per unit of liquidity between `tick_lower` and `tick_upper`.
///
/// All arithmetic wraps; callers only ever use differences of two readings.
pub fn get_fee_growth_inside(
    ticks: &FastMap<i32, TickInfo>,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global0_x128: U256,
    fee_growth_global1_x128: U256,
) -> (U256, U256) {
    let lower = ticks.get(&tick_lower).cloned().unwrap_or_default();
    let upper = ticks.get(&tick_upper).cloned().unwrap_or_default();

    let (below0, below1) = if tick_current >= tick_lower {
        (lower.fee_growth_outside0_x128, lower.fee_growth_outside1_x128)
    } else {
        (
            fee_growth_global0_x128.wrapping_sub(lower.fee_growth_outside0_x128),
            fee_growth_global1_x128.wrapping_sub(lower.fee_growth_outside1_x128),
        )
    };

    let (above0, above1) = if tick_current < tick_upper {
        (upper.fee_growth_outside0_x128, upper.fee_growth_outside1_x128)
    } else {
        (
            fee_growth_global0_x128.wrapping_sub(upper.fee_growth_outside0_x128),
            fee_growth_global1_x128.wrapping_sub(upper.fee_growth_outside1_x128),
        )
    };

    (
        fee_growth_global0_x128.wrapping_sub(below0).wrapping_sub(above0),
        fee_growth_global1_x128.wrapping_sub(below1).wrapping_sub(above1),
    )
}

/// Limit tick for one deposit side. Present in its store iff
/// `liquidity_gross > 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitTickInfo {
    /// Liquidity minted and not yet burned, swapped or not.
    pub liquidity_gross: u128,
    /// Deposit token still available to swappers.
    pub liquidity_left: u128,
    /// Share of the deposits, relative to each position's own snapshot,
    /// that is still unswapped.
    pub unswapped_fraction: UnswappedFraction,
    /// Swap fees per unit of gross liquidity, in the other token.
    pub fee_growth_inside_x128: U256,
    /// Owners with an open position at this tick.
    pub owners: BTreeSet<Address>,
}

impl Default for LimitTickInfo {
    fn default() -> Self {
        Self {
            liquidity_gross: 0,
            liquidity_left: 0,
            unswapped_fraction: UnswappedFraction::ONE,
            fee_growth_inside_x128: U256::ZERO,
            owners: BTreeSet::new(),
        }
    }
}

impl LimitTickInfo {
    /// Adds freshly deposited liquidity for `owner`.
    pub fn add_liquidity(
        &mut self,
        owner: Address,
        amount: u128,
        max_liquidity: u128,
    ) -> Result<(), Error> {
        let liquidity_gross = self
            .liquidity_gross
            .checked_add(amount)
            .filter(|gross| *gross <= max_liquidity)
            .ok_or(PoolError::LiquidityOverflow)?;
        self.liquidity_gross = liquidity_gross;
        self.liquidity_left = self
            .liquidity_left
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        self.owners.insert(owner);
        Ok(())
    }

    /// Removes `amount` of gross liquidity of which `unswapped` was still
    /// available to swappers. `closed` drops `owner` from the owner set.
    pub fn remove_liquidity(
        &mut self,
        owner: Address,
        amount: u128,
        unswapped: u128,
        closed: bool,
    ) -> Result<(), Error> {
        self.liquidity_gross = self
            .liquidity_gross
            .checked_sub(amount)
            .ok_or(PoolError::InvariantViolation("limit tick gross liquidity underflow"))?;
        // rounding may leave the owners' unswapped amounts one unit apart from the tick total
        self.liquidity_left = self
            .liquidity_left
            .saturating_sub(unswapped)
            .min(self.liquidity_gross);
        if closed {
            self.owners.remove(&owner);
        }
        Ok(())
    }

    /// Credits a swap fee to the liquidity resting at this tick.
    pub fn accrue_fee(&mut self, fee_amount: U256) -> Result<(), Error> {
        if self.liquidity_gross == 0 {
            return Err(PoolError::InvariantViolation("fee accrued on an empty limit tick").into());
        }
        let growth = mul_div(fee_amount, Q128, U256::from(self.liquidity_gross))?;
        self.fee_growth_inside_x128 = self.fee_growth_inside_x128.wrapping_add(growth);
        Ok(())
    }
}

/// Limit ticks of both deposit sides.
#[derive(Clone, Debug, Default)]
pub struct LimitTicks {
    token0: FastMap<i32, LimitTickInfo>,
    token1: FastMap<i32, LimitTickInfo>,
}

impl LimitTicks {
    #[inline]
    pub fn side(&self, asset: Asset) -> &FastMap<i32, LimitTickInfo> {
        match asset {
            Asset::Token0 => &self.token0,
            Asset::Token1 => &self.token1,
        }
    }

    #[inline]
    fn side_mut(&mut self, asset: Asset) -> &mut FastMap<i32, LimitTickInfo> {
        match asset {
            Asset::Token0 => &mut self.token0,
            Asset::Token1 => &mut self.token1,
        }
    }

    pub fn get(&self, asset: Asset, tick: i32) -> Option<&LimitTickInfo> {
        self.side(asset).get(&tick)
    }

    pub fn get_mut(&mut self, asset: Asset, tick: i32) -> Option<&mut LimitTickInfo> {
        self.side_mut(asset).get_mut(&tick)
    }

    /// Returns the tick, creating an empty one with a full unswapped
    /// fraction if it does not exist yet.
    pub fn get_or_create(&mut self, asset: Asset, tick: i32) -> &mut LimitTickInfo {
        self.side_mut(asset).entry(tick).or_default()
    }

    pub fn remove(&mut self, asset: Asset, tick: i32) -> Option<LimitTickInfo> {
        self.side_mut(asset).remove(&tick)
    }

    /// Ticks on `asset`'s side that still have liquidity to swap against,
    /// in ascending order.
    pub fn ticks_with_liquidity(&self, asset: Asset) -> BTreeSet<i32> {
        self.side(asset)
            .iter()
            .filter(|(_, info)| info.liquidity_left > 0)
            .map(|(tick, _)| *tick)
            .collect()
    }
}
