//! Hybrid concentrated-liquidity and limit-order pool engine in pure Rust.
//!
//! A [`HybridPool`] prices trades against two kinds of liquidity that share
//! one tick axis:
//! - range liquidity spread over a tick interval, with Uniswap V3 math;
//! - limit orders placed in a single token at one exact tick price, which
//!   can be partially filled, topped up and burned at any time.
//!
//! This crate exposes:
//! - Low-level math primitives (`math::*`) for ticks, prices, bitmaps and
//!   swap steps.
//! - The pool itself (`pool::*`) with mint/burn/collect for both liquidity
//!   kinds and the swap state machine that interleaves them.
//! - A [`pool::ledger::Ledger`] abstraction for token custody, with an
//!   in-memory implementation.
//!
//! # Examples
//!
//! ## Pure math
//! ```no_run
//! use hybrid_swap_math::{math::tick_math, RESOLUTION, U256};
//!
//! let sqrt_price = tick_math::get_sqrt_ratio_at_tick(0).unwrap();
//! assert!(sqrt_price > U256::ZERO);
//! assert_eq!(RESOLUTION, 96);
//! ```
//!
//! ## Swapping through a limit order
//! ```no_run
//! use hybrid_swap_math::{
//!     math::tick_math::{get_sqrt_ratio_at_tick, MIN_SQRT_RATIO},
//!     pool::{config::PoolConfig, ledger::InMemoryLedger, Asset},
//!     Address, HybridPool, I256, U256,
//! };
//!
//! let token0 = Address::with_last_byte(1);
//! let token1 = Address::with_last_byte(2);
//! let maker = Address::with_last_byte(10);
//! let taker = Address::with_last_byte(11);
//!
//! let config = PoolConfig::medium(Address::with_last_byte(0xff), token0, token1).unwrap();
//! let mut pool = HybridPool::new(config);
//! pool.initialize(get_sqrt_ratio_at_tick(0).unwrap()).unwrap();
//!
//! let mut ledger = InMemoryLedger::default();
//! ledger.mint(maker, token1, U256::from(1_000_000u64));
//! ledger.mint(taker, token0, U256::from(1_000_000u64));
//!
//! pool.mint_limit_order(&mut ledger, maker, Asset::Token1, 0, 1_000_000).unwrap();
//!
//! let result = pool
//!     .swap(
//!         &mut ledger,
//!         taker,
//!         true,
//!         I256::from_raw(U256::from(10_000u64)),
//!         MIN_SQRT_RATIO + U256::ONE,
//!     )
//!     .unwrap();
//! println!("amount0: {}, amount1: {}", result.amount0, result.amount1);
//! ```

pub use alloy_primitives::{Address, I256, U256};

pub mod error;
mod hash;
pub mod math;

pub use hash::FastMap;

pub mod pool;

pub use pool::hybrid_pool::HybridPool;

const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);
const U256_128: U256 = U256::from_limbs([128, 0, 0, 0]);

const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);
const U256_E4: U256 = U256::from_limbs([10000, 0, 0, 0]);
const U256_E6: U256 = U256::from_limbs([1000000, 0, 0, 0]);

pub const RESOLUTION: u8 = 96;
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

/// Fees are expressed in hundredths of a bip.
pub const FEE_DENOMINATOR: u32 = 1_000_000;
