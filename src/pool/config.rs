use crate::FEE_DENOMINATOR;
use crate::error::PoolError;
use alloy_primitives::{Address, U160};

const MAX_TICK_SPACING: i32 = 16384;

/// Converts an `Address` into its `U160` numeric representation.
#[inline(always)]
pub fn address_to_u160(address: Address) -> U160 {
    address.into()
}

/// Returns the token pair sorted by numeric address, as used by Uniswap V3.
pub fn sort_tokens(token0: Address, token1: Address) -> (Address, Address) {
    if address_to_u160(token0) < address_to_u160(token1) {
        (token0, token1)
    } else {
        (token1, token0)
    }
}

/// Static parameters of a [`HybridPool`](crate::HybridPool).
///
/// Built through [`PoolConfig::new`] or one of the fee tier presets, which
/// sort the token pair and validate the parameters once up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub pool_address: Address,
    pub token0: Address,
    pub token1: Address,
    /// Swap fee in hundredths of a bip.
    pub fee_pips: u32,
    pub tick_spacing: i32,
}

impl PoolConfig {
    /// Creates a validated configuration. The tokens may be passed in any
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the tokens are equal or one
    /// of them is the pool itself, if `fee_pips` is not below `1_000_000`,
    /// or if `tick_spacing` is outside `1..=16384`.
    pub fn new(
        pool_address: Address,
        token0: Address,
        token1: Address,
        fee_pips: u32,
        tick_spacing: i32,
    ) -> Result<Self, PoolError> {
        let (token0, token1) = sort_tokens(token0, token1);
        let config = Self {
            pool_address,
            token0,
            token1,
            fee_pips,
            tick_spacing,
        };
        config.validate()?;
        Ok(config)
    }

    /// 0.05% fee, spacing 10.
    pub fn low(pool_address: Address, token0: Address, token1: Address) -> Result<Self, PoolError> {
        Self::new(pool_address, token0, token1, 500, 10)
    }

    /// 0.3% fee, spacing 60.
    pub fn medium(
        pool_address: Address,
        token0: Address,
        token1: Address,
    ) -> Result<Self, PoolError> {
        Self::new(pool_address, token0, token1, 3000, 60)
    }

    /// 1% fee, spacing 200.
    pub fn high(pool_address: Address, token0: Address, token1: Address) -> Result<Self, PoolError> {
        Self::new(pool_address, token0, token1, 10000, 200)
    }

    /// Checks the invariants [`PoolConfig::new`] enforces.
    ///
    /// # Errors
    ///
    /// See [`PoolConfig::new`].
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.token0 == self.token1 {
            return Err(PoolError::InvalidConfig("tokens must be distinct"));
        }
        if self.pool_address == self.token0 || self.pool_address == self.token1 {
            return Err(PoolError::InvalidConfig("pool address must not be a pool token"));
        }
        if self.fee_pips >= FEE_DENOMINATOR {
            return Err(PoolError::InvalidConfig("fee must be below 1_000_000 pips"));
        }
        if self.tick_spacing <= 0 || self.tick_spacing > MAX_TICK_SPACING {
            return Err(PoolError::InvalidConfig(
                "tick spacing must be between 1 and 16384",
            ));
        }
        Ok(())
    }
}
