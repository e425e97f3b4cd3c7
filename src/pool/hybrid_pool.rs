use crate::FastMap;
use crate::error::{Error, MathError, PoolError};
use crate::math::liquidity_math::{add_delta, to_delta};
use crate::math::math_helpers::to_u128;
use crate::math::sqrt_price_math::{get_amount_0_delta, get_amount_1_delta};
use crate::math::tick_bitmap::flip_tick;
use crate::math::tick_math::{
    MAX_TICK, MAX_TICK_LO, MIN_TICK, MIN_TICK_LO, get_price_at_tick, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio, tick_spacing_to_max_liquidity_per_tick,
};
use crate::pool::Asset;
use crate::pool::config::PoolConfig;
use crate::pool::ledger::{Journal, Ledger};
use crate::pool::position::{LimitPositionInfo, LimitPositionKey, PositionInfo, PositionKey};
use crate::pool::swap::Slot0;
use crate::pool::tick::{self, LimitTickInfo, LimitTicks, TickInfo};
use alloy_primitives::{Address, I256, U256};
use tracing::{debug, warn};

/// Protocol fees accrued and not yet collected, per token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolFees {
    pub token0: u128,
    pub token1: u128,
}

/// Outcome of [`HybridPool::burn_limit_order`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LimitOrderBurn {
    /// Amounts credited by the burn itself, without fees.
    pub amount0: u128,
    pub amount1: u128,
    /// Amounts paid out when the burn closed the position.
    pub collected0: u128,
    pub collected1: u128,
}

/// A pool holding range liquidity and limit orders on one tick axis.
///
/// Every mutating call is all-or-nothing: it runs against a copy of the
/// pool and a journal of the ledger, and either commits both or leaves
/// pool and balances untouched.
#[derive(Clone, Debug)]
pub struct HybridPool {
    pub(crate) config: PoolConfig,
    pub(crate) max_liquidity_per_tick: u128,
    pub(crate) slot0: Slot0,
    pub(crate) liquidity: u128,
    pub(crate) fee_growth_global0_x128: U256,
    pub(crate) fee_growth_global1_x128: U256,
    pub(crate) protocol_fees: ProtocolFees,
    pub(crate) bitmap: FastMap<i16, U256>,
    pub(crate) ticks: FastMap<i32, TickInfo>,
    pub(crate) positions: FastMap<PositionKey, PositionInfo>,
    pub(crate) limit_ticks: LimitTicks,
    pub(crate) limit_positions: FastMap<LimitPositionKey, LimitPositionInfo>,
}

impl HybridPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            max_liquidity_per_tick: tick_spacing_to_max_liquidity_per_tick(config.tick_spacing),
            config,
            slot0: Slot0::default(),
            liquidity: 0,
            fee_growth_global0_x128: U256::ZERO,
            fee_growth_global1_x128: U256::ZERO,
            protocol_fees: ProtocolFees::default(),
            bitmap: FastMap::default(),
            ticks: FastMap::default(),
            positions: FastMap::default(),
            limit_ticks: LimitTicks::default(),
            limit_positions: FastMap::default(),
        }
    }

    /// Sets the starting price. Can only be called once.
    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<(), Error> {
        if self.is_initialized() {
            return Err(PoolError::AlreadyInitialized.into());
        }
        let tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        self.slot0 = Slot0 {
            sqrt_price_x96,
            tick,
            fee_protocol: 0,
        };
        debug!(pool = %self.config.pool_address, %sqrt_price_x96, tick, "initialized pool");
        Ok(())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.slot0.sqrt_price_x96.is_zero()
    }

    #[inline]
    pub(crate) fn require_initialized(&self) -> Result<(), Error> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(PoolError::NotInitialized.into())
        }
    }

    #[inline]
    pub(crate) fn token(&self, asset: Asset) -> Address {
        match asset {
            Asset::Token0 => self.config.token0,
            Asset::Token1 => self.config.token1,
        }
    }

    // ---------------------------------------------------------------------
    // atomicity
    // ---------------------------------------------------------------------

    /// Runs `f` on a scratch copy of the pool with a journaled ledger and
    /// commits the copy only if `f` succeeds. On failure every transfer `f`
    /// made is reversed, and a reversal the ledger refuses replaces the
    /// original error.
    pub(crate) fn transact<L, T, F>(
        &mut self,
        ledger: &mut L,
        operation: &'static str,
        f: F,
    ) -> Result<T, Error>
    where
        L: Ledger + ?Sized,
        F: FnOnce(&mut HybridPool, &mut Journal<'_, L>) -> Result<T, Error>,
    {
        let mut scratch = self.clone();
        let mut journal = Journal::new(ledger);
        match f(&mut scratch, &mut journal) {
            Ok(value) => {
                *self = scratch;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    pool = %self.config.pool_address,
                    operation,
                    error = %err,
                    transfers = journal.transfers().len(),
                    "rolling back"
                );
                journal.rollback()?;
                Err(err)
            }
        }
    }

    /// Like [`transact`](Self::transact) for operations that move no tokens.
    fn atomically<T, F>(&mut self, operation: &'static str, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut HybridPool) -> Result<T, Error>,
    {
        let mut scratch = self.clone();
        match f(&mut scratch) {
            Ok(value) => {
                *self = scratch;
                Ok(value)
            }
            Err(err) => {
                warn!(pool = %self.config.pool_address, operation, error = %err, "rolling back");
                Err(err)
            }
        }
    }

    /// Pulls `amount` of `asset` from `payer` into the pool and checks that
    /// the pool's balance grew by exactly that amount.
    pub(crate) fn pull<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        payer: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), Error> {
        if amount.is_zero() {
            return Ok(());
        }
        let pool = self.config.pool_address;
        let token = self.token(asset);
        let balance_before = ledger.balance_of(pool, token);
        ledger.transfer_token(payer, pool, token, amount)?;
        let expected = balance_before
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;
        if ledger.balance_of(pool, token) != expected {
            return Err(PoolError::InvariantViolation("pool balance did not grow by the amount pulled").into());
        }
        Ok(())
    }

    /// Pays `amount` of `asset` out of the pool to `payee` and checks that
    /// the pool's balance shrank by exactly that amount.
    pub(crate) fn push<L: Ledger + ?Sized>(
        &self,
        ledger: &mut L,
        payee: Address,
        asset: Asset,
        amount: U256,
    ) -> Result<(), Error> {
        if amount.is_zero() {
            return Ok(());
        }
        let pool = self.config.pool_address;
        let token = self.token(asset);
        let balance_before = ledger.balance_of(pool, token);
        ledger.transfer_token(pool, payee, token, amount)?;
        if Some(ledger.balance_of(pool, token)) != balance_before.checked_sub(amount) {
            return Err(PoolError::InvariantViolation("pool balance did not shrink by the amount pushed").into());
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // range positions
    // ---------------------------------------------------------------------

    fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> Result<(), Error> {
        if tick_lower >= tick_upper || tick_lower < MIN_TICK || tick_upper > MAX_TICK {
            return Err(PoolError::InvalidTickRange.into());
        }
        let spacing = self.config.tick_spacing;
        if tick_lower % spacing != 0 || tick_upper % spacing != 0 {
            return Err(PoolError::TickNotSpaced.into());
        }
        Ok(())
    }

    /// Adds `amount` of range liquidity between `tick_lower` and
    /// `tick_upper` for `owner` and pulls the tokens it requires. Returns
    /// the amounts of token0 and token1 paid.
    pub fn mint<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.transact(ledger, "mint", |pool, ledger| {
            pool.require_initialized()?;
            if amount == 0 {
                return Err(PoolError::ZeroAmount.into());
            }
            pool.check_ticks(tick_lower, tick_upper)?;

            let (amount0, amount1) =
                pool.modify_position(owner, tick_lower, tick_upper, to_delta(amount, false)?)?;
            let (amount0, amount1) = (amount0.into_raw(), amount1.into_raw());

            pool.pull(ledger, owner, Asset::Token0, amount0)?;
            pool.pull(ledger, owner, Asset::Token1, amount1)?;

            debug!(
                %owner, tick_lower, tick_upper, amount,
                %amount0, %amount1,
                "minted range position"
            );
            Ok((amount0, amount1))
        })
    }

    /// Removes `amount` of liquidity from a range position and credits the
    /// tokens it represents to the position's owed balances. A zero amount
    /// only accrues fees.
    pub fn burn(
        &mut self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), Error> {
        self.atomically("burn", |pool| {
            pool.require_initialized()?;
            pool.check_ticks(tick_lower, tick_upper)?;

            let (amount0, amount1) =
                pool.modify_position(owner, tick_lower, tick_upper, to_delta(amount, true)?)?;
            let (amount0, amount1) = (amount0.unsigned_abs(), amount1.unsigned_abs());

            if amount0 > U256::ZERO || amount1 > U256::ZERO {
                let key = PositionKey {
                    owner,
                    tick_lower,
                    tick_upper,
                };
                let position = pool
                    .positions
                    .get_mut(&key)
                    .ok_or(PoolError::PositionNotFound)?;
                position.tokens_owed0 = position.tokens_owed0.wrapping_add(to_u128(amount0)?);
                position.tokens_owed1 = position.tokens_owed1.wrapping_add(to_u128(amount1)?);
            }

            debug!(
                %owner, tick_lower, tick_upper, amount,
                %amount0, %amount1,
                "burned range position"
            );
            Ok((amount0, amount1))
        })
    }

    /// Pays out up to the requested amounts of what a range position is
    /// owed. The position is removed once it holds nothing.
    pub fn collect<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        self.transact(ledger, "collect", |pool, ledger| {
            let key = PositionKey {
                owner,
                tick_lower,
                tick_upper,
            };
            let position = pool
                .positions
                .get_mut(&key)
                .ok_or(PoolError::PositionNotFound)?;

            let amount0 = amount0_requested.min(position.tokens_owed0);
            let amount1 = amount1_requested.min(position.tokens_owed1);
            position.tokens_owed0 -= amount0;
            position.tokens_owed1 -= amount1;
            if position.is_empty() {
                pool.positions.remove(&key);
            }

            pool.push(ledger, owner, Asset::Token0, U256::from(amount0))?;
            pool.push(ledger, owner, Asset::Token1, U256::from(amount1))?;

            debug!(%owner, tick_lower, tick_upper, amount0, amount1, "collected range position");
            Ok((amount0, amount1))
        })
    }

    /// Applies `liquidity_delta` to a position and returns the signed token
    /// amounts owed to (positive) or by (negative) the pool.
    fn modify_position(
        &mut self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
    ) -> Result<(I256, I256), Error> {
        self.update_position(owner, tick_lower, tick_upper, liquidity_delta)?;

        let mut amount0 = I256::ZERO;
        let mut amount1 = I256::ZERO;
        if liquidity_delta != 0 {
            let tick = self.slot0.tick;
            let sqrt_price_x96 = self.slot0.sqrt_price_x96;
            let sqrt_lower = get_sqrt_ratio_at_tick(tick_lower)?;
            let sqrt_upper = get_sqrt_ratio_at_tick(tick_upper)?;

            if tick < tick_lower {
                // range is above the price, only token0 is needed
                amount0 = get_amount_0_delta(sqrt_lower, sqrt_upper, liquidity_delta)?;
            } else if tick < tick_upper {
                amount0 = get_amount_0_delta(sqrt_price_x96, sqrt_upper, liquidity_delta)?;
                amount1 = get_amount_1_delta(sqrt_lower, sqrt_price_x96, liquidity_delta)?;
                self.liquidity = add_delta(self.liquidity, liquidity_delta)?;
            } else {
                amount1 = get_amount_1_delta(sqrt_lower, sqrt_upper, liquidity_delta)?;
            }
        }
        Ok((amount0, amount1))
    }

    fn update_position(
        &mut self,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        liquidity_delta: i128,
    ) -> Result<(), Error> {
        let key = PositionKey {
            owner,
            tick_lower,
            tick_upper,
        };
        match self.positions.get(&key) {
            None if liquidity_delta <= 0 => return Err(PoolError::PositionNotFound.into()),
            Some(position) if liquidity_delta < 0 && position.liquidity < liquidity_delta.unsigned_abs() => {
                return Err(PoolError::InsufficientLiquidity.into());
            }
            _ => {}
        }

        let tick_current = self.slot0.tick;
        let fee_growth_global0_x128 = self.fee_growth_global0_x128;
        let fee_growth_global1_x128 = self.fee_growth_global1_x128;

        let mut flipped_lower = false;
        let mut flipped_upper = false;
        if liquidity_delta != 0 {
            flipped_lower = tick::update(
                &mut self.ticks,
                tick_lower,
                tick_current,
                liquidity_delta,
                fee_growth_global0_x128,
                fee_growth_global1_x128,
                false,
                self.max_liquidity_per_tick,
            )?;
            flipped_upper = tick::update(
                &mut self.ticks,
                tick_upper,
                tick_current,
                liquidity_delta,
                fee_growth_global0_x128,
                fee_growth_global1_x128,
                true,
                self.max_liquidity_per_tick,
            )?;
            if flipped_lower {
                flip_tick(&mut self.bitmap, tick_lower, self.config.tick_spacing)?;
            }
            if flipped_upper {
                flip_tick(&mut self.bitmap, tick_upper, self.config.tick_spacing)?;
            }
        }

        let (fee_growth_inside0_x128, fee_growth_inside1_x128) = tick::get_fee_growth_inside(
            &self.ticks,
            tick_lower,
            tick_upper,
            tick_current,
            fee_growth_global0_x128,
            fee_growth_global1_x128,
        );

        self.positions.entry(key).or_default().update(
            liquidity_delta,
            fee_growth_inside0_x128,
            fee_growth_inside1_x128,
        )?;

        // removed liquidity may leave ticks nothing references anymore
        if liquidity_delta < 0 {
            if flipped_lower {
                tick::clear(&mut self.ticks, tick_lower);
            }
            if flipped_upper {
                tick::clear(&mut self.ticks, tick_upper);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // limit orders
    // ---------------------------------------------------------------------

    /// Validates a limit order tick and returns its execution price.
    fn check_limit_tick(&self, tick: i32) -> Result<U256, Error> {
        if !(MIN_TICK_LO..=MAX_TICK_LO).contains(&tick) {
            return Err(PoolError::InvalidTickRange.into());
        }
        if tick % self.config.tick_spacing != 0 {
            return Err(PoolError::TickNotSpaced.into());
        }
        get_price_at_tick(tick)
    }

    /// Places `amount` of `asset` for sale at exactly `tick`'s price and
    /// pulls it from `owner`. Minting onto an existing, partially filled
    /// order keeps what it has already swapped.
    pub fn mint_limit_order<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        asset: Asset,
        tick: i32,
        amount: u128,
    ) -> Result<u128, Error> {
        self.transact(ledger, "mint_limit_order", |pool, ledger| {
            pool.require_initialized()?;
            if amount == 0 {
                return Err(PoolError::ZeroAmount.into());
            }
            pool.check_limit_tick(tick)?;

            let max_liquidity = pool.max_liquidity_per_tick;
            let tick_info = pool.limit_ticks.get_or_create(asset, tick);
            let position = pool
                .limit_positions
                .entry(LimitPositionKey { owner, asset, tick })
                .or_insert_with(|| LimitPositionInfo::new(tick_info));

            position.accrue_fees(asset, tick_info)?;
            position.mint(amount, tick_info)?;
            tick_info.add_liquidity(owner, amount, max_liquidity)?;

            pool.pull(ledger, owner, asset, U256::from(amount))?;

            debug!(%owner, ?asset, tick, amount, "minted limit order");
            Ok(amount)
        })
    }

    /// Burns `amount` of a limit order, crediting its unswapped share in
    /// the deposit token and its swapped share in the other token. Burning
    /// everything also collects everything owed and removes the position.
    /// A zero amount only accrues fees.
    pub fn burn_limit_order<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        asset: Asset,
        tick: i32,
        amount: u128,
    ) -> Result<LimitOrderBurn, Error> {
        self.transact(ledger, "burn_limit_order", |pool, ledger| {
            pool.require_initialized()?;
            pool.burn_limit_order_inner(ledger, owner, asset, tick, amount)
        })
    }

    pub(crate) fn burn_limit_order_inner<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        asset: Asset,
        tick: i32,
        amount: u128,
    ) -> Result<LimitOrderBurn, Error> {
        let price_x96 = get_price_at_tick(tick)?;
        let key = LimitPositionKey { owner, asset, tick };
        let position = self
            .limit_positions
            .get_mut(&key)
            .ok_or(PoolError::PositionNotFound)?;
        let tick_info = self
            .limit_ticks
            .get_mut(asset, tick)
            .ok_or(PoolError::InvariantViolation("limit position without a tick"))?;

        position.accrue_fees(asset, tick_info)?;
        if amount == 0 {
            debug!(%owner, ?asset, tick, "poked limit order");
            return Ok(LimitOrderBurn::default());
        }

        let split = position.burn(asset, amount, price_x96, tick_info)?;
        let closed = position.liquidity == 0;
        tick_info.remove_liquidity(owner, amount, split.unswapped, closed)?;
        if tick_info.liquidity_gross == 0 {
            self.limit_ticks.remove(asset, tick);
        }

        let (amount0, amount1) = match asset {
            Asset::Token0 => (split.unswapped, split.swapped_converted),
            Asset::Token1 => (split.swapped_converted, split.unswapped),
        };
        debug!(
            %owner, ?asset, tick, amount,
            unswapped = split.unswapped,
            swapped = split.swapped,
            "burned limit order"
        );

        let (collected0, collected1) = if closed {
            self.collect_limit_order_inner(ledger, owner, asset, tick, u128::MAX, u128::MAX)?
        } else {
            (0, 0)
        };

        Ok(LimitOrderBurn {
            amount0,
            amount1,
            collected0,
            collected1,
        })
    }

    /// Pays out up to the requested amounts of what a limit order is owed.
    pub fn collect_limit_order<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        asset: Asset,
        tick: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        self.transact(ledger, "collect_limit_order", |pool, ledger| {
            pool.collect_limit_order_inner(
                ledger,
                owner,
                asset,
                tick,
                amount0_requested,
                amount1_requested,
            )
        })
    }

    fn collect_limit_order_inner<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        owner: Address,
        asset: Asset,
        tick: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        let key = LimitPositionKey { owner, asset, tick };
        let position = self
            .limit_positions
            .get_mut(&key)
            .ok_or(PoolError::PositionNotFound)?;

        let amount0 = amount0_requested.min(position.tokens_owed0);
        let amount1 = amount1_requested.min(position.tokens_owed1);
        position.tokens_owed0 -= amount0;
        position.tokens_owed1 -= amount1;
        if position.is_empty() {
            self.limit_positions.remove(&key);
        }

        self.push(ledger, owner, Asset::Token0, U256::from(amount0))?;
        self.push(ledger, owner, Asset::Token1, U256::from(amount1))?;

        debug!(%owner, ?asset, tick, amount0, amount1, "collected limit order");
        Ok((amount0, amount1))
    }

    // ---------------------------------------------------------------------
    // protocol fees
    // ---------------------------------------------------------------------

    /// Sets the protocol's share of swap fees per token as `1 / value`.
    /// Each value is 0 (off) or between 4 and 10.
    pub fn set_fee_protocol(&mut self, fee_protocol0: u8, fee_protocol1: u8) -> Result<(), Error> {
        let valid = |fee: u8| fee == 0 || (4..=10).contains(&fee);
        if !valid(fee_protocol0) || !valid(fee_protocol1) {
            return Err(PoolError::InvalidFeeProtocol.into());
        }
        let old = self.slot0.fee_protocol;
        self.slot0.fee_protocol = fee_protocol0 | (fee_protocol1 << 4);
        debug!(
            old0 = old % 16,
            old1 = old >> 4,
            fee_protocol0,
            fee_protocol1,
            "set protocol fee"
        );
        Ok(())
    }

    /// Pays up to the requested amounts of accrued protocol fees to
    /// `recipient`.
    pub fn collect_protocol<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        recipient: Address,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), Error> {
        self.transact(ledger, "collect_protocol", |pool, ledger| {
            let amount0 = amount0_requested.min(pool.protocol_fees.token0);
            let amount1 = amount1_requested.min(pool.protocol_fees.token1);
            pool.protocol_fees.token0 -= amount0;
            pool.protocol_fees.token1 -= amount1;

            pool.push(ledger, recipient, Asset::Token0, U256::from(amount0))?;
            pool.push(ledger, recipient, Asset::Token1, U256::from(amount1))?;

            debug!(%recipient, amount0, amount1, "collected protocol fees");
            Ok((amount0, amount1))
        })
    }

    // ---------------------------------------------------------------------
    // accessors
    // ---------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[inline]
    pub fn slot0(&self) -> Slot0 {
        self.slot0
    }

    /// Range liquidity active at the current price.
    #[inline]
    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    #[inline]
    pub fn max_liquidity_per_tick(&self) -> u128 {
        self.max_liquidity_per_tick
    }

    #[inline]
    pub fn fee_growth_global(&self) -> (U256, U256) {
        (self.fee_growth_global0_x128, self.fee_growth_global1_x128)
    }

    #[inline]
    pub fn protocol_fees(&self) -> ProtocolFees {
        self.protocol_fees
    }

    pub fn position(&self, owner: Address, tick_lower: i32, tick_upper: i32) -> Option<&PositionInfo> {
        self.positions.get(&PositionKey {
            owner,
            tick_lower,
            tick_upper,
        })
    }

    pub fn tick(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn limit_position(&self, owner: Address, asset: Asset, tick: i32) -> Option<&LimitPositionInfo> {
        self.limit_positions.get(&LimitPositionKey { owner, asset, tick })
    }

    pub fn limit_tick(&self, asset: Asset, tick: i32) -> Option<&LimitTickInfo> {
        self.limit_ticks.get(asset, tick)
    }
}
