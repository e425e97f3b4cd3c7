//! Property-based tests using `proptest` for the pool's accounting bounds.
//!
//! 1. **Top-up replay**: minting onto a partially filled limit position and
//!    burning everything credits the old liquidity's swapped amount again,
//!    never more.
//! 2. **Repeated fills**: liquidity left never grows between mints, and
//!    after any number of partial fills a burn credits the filled amount
//!    within one unit, never more.
//! 3. **Range round trip**: mint then burn returns what was paid, less at
//!    most one unit of rounding per token, and clears both ticks.
//! 4. **Untouched limit round trip**: mint then burn returns the deposit.
//! 5. **Fills away from parity**: at any tick price, what a burned order is
//!    credited in the other token never exceeds what takers paid in.

use proptest::prelude::*;

use crate::math::fraction::UnswappedFraction;
use crate::math::tick_math::{
    MAX_SQRT_RATIO, MIN_SQRT_RATIO, get_price_at_tick, get_sqrt_ratio_at_tick,
};
use crate::pool::Asset;
use crate::pool::config::PoolConfig;
use crate::pool::hybrid_pool::HybridPool;
use crate::pool::ledger::{InMemoryLedger, Ledger};
use crate::pool::position::LimitPositionInfo;
use crate::pool::tick::LimitTickInfo;
use crate::{Address, I256, U256};
use alloy_primitives::address;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

const POOL: Address = address!("0x1000000000000000000000000000000000000000");
const TOKEN0: Address = address!("0x0000000000000000000000000000000000000001");
const TOKEN1: Address = address!("0x0000000000000000000000000000000000000002");
const MAKER: Address = address!("0x00000000000000000000000000000000000000a1");
const TAKER: Address = address!("0x00000000000000000000000000000000000000b0");

fn make_pool(tick: i32) -> HybridPool {
    let Ok(config) = PoolConfig::medium(POOL, TOKEN0, TOKEN1) else {
        panic!("valid config");
    };
    let mut pool = HybridPool::new(config);
    let Ok(sqrt_price) = get_sqrt_ratio_at_tick(tick) else {
        panic!("valid tick");
    };
    let Ok(()) = pool.initialize(sqrt_price) else {
        panic!("fresh pool");
    };
    pool
}

fn funded_ledger() -> InMemoryLedger {
    let mut ledger = InMemoryLedger::new();
    for account in [MAKER, TAKER] {
        ledger.mint(account, TOKEN0, U256::from(u128::MAX));
        ledger.mint(account, TOKEN1, U256::from(u128::MAX));
    }
    ledger
}

fn liquidity_strategy() -> impl Strategy<Value = u128> {
    1u128..=1_000_000_000_000_000_000_000_000
}

/// A deposit and how much of it has been filled, strictly less than all.
fn partial_fill_strategy() -> impl Strategy<Value = (u128, u128)> {
    (2u128..=1_000_000_000_000_000_000_000_000).prop_flat_map(|liquidity| (Just(liquidity), 1..liquidity))
}

fn spaced_tick_strategy() -> impl Strategy<Value = i32> {
    (-11_000i32..=11_000).prop_map(|compressed| compressed * 60)
}

// ---------------------------------------------------------------------------
// 1. Top-up replay
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_top_up_replays_swapped_amount(
        (liquidity, used) in partial_fill_strategy(),
        top_up in liquidity_strategy(),
    ) {
        let fresh = LimitTickInfo::default();
        let mut position = LimitPositionInfo::new(&fresh);
        let Ok(()) = position.mint(liquidity, &fresh) else {
            panic!("mint on a fresh tick");
        };

        let Ok(fraction) = UnswappedFraction::ONE.after_fill(used, liquidity) else {
            panic!("partial fill");
        };
        let filled = LimitTickInfo {
            liquidity_gross: liquidity,
            liquidity_left: liquidity - used,
            unswapped_fraction: fraction,
            ..LimitTickInfo::default()
        };

        let mut alone = position;
        let Ok(alone_split) = alone.burn(Asset::Token0, liquidity, crate::Q96, &filled) else {
            panic!("burn alone");
        };

        let Ok(()) = position.mint(top_up, &filled) else {
            panic!("top up");
        };
        prop_assert!(position.unswapped_fraction >= filled.unswapped_fraction);
        prop_assert!(position.unswapped_fraction <= UnswappedFraction::ONE);

        let total = liquidity + top_up;
        let Ok(split) = position.burn(Asset::Token0, total, crate::Q96, &filled) else {
            panic!("burn combined");
        };
        prop_assert!(split.unswapped + split.swapped <= total);
        prop_assert!(total - split.unswapped - split.swapped <= 1);
        prop_assert!(
            split.swapped <= alone_split.swapped && alone_split.swapped - split.swapped <= 1,
            "top-up changed the swapped amount: alone={} combined={}",
            alone_split.swapped, split.swapped
        );
    }
}

// ---------------------------------------------------------------------------
// 2. Repeated partial fills
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_repeated_fills_stay_within_one_unit(
        amounts in prop::collection::vec(1u128..=1_000_000, 1..24),
    ) {
        let mut pool = make_pool(0);
        let mut ledger = funded_ledger();
        let deposit: u128 = 1_000_000_000;
        let Ok(_) = pool.mint_limit_order(&mut ledger, MAKER, Asset::Token1, 0, deposit) else {
            panic!("mint limit order");
        };

        let mut filled: u128 = 0;
        let mut left_before = deposit;
        let mut fraction_before = UnswappedFraction::ONE;
        for amount in amounts {
            let Ok(result) = pool.swap(
                &mut ledger,
                TAKER,
                true,
                I256::from_raw(U256::from(amount)),
                MIN_SQRT_RATIO + U256::ONE,
            ) else {
                panic!("swap");
            };
            prop_assert_eq!(result.amount0, I256::from_raw(U256::from(amount)));
            filled += result.amount1.unsigned_abs().to::<u128>();

            let Some(tick) = pool.limit_tick(Asset::Token1, 0) else {
                panic!("tick is never fully consumed here");
            };
            prop_assert!(tick.liquidity_left <= left_before);
            prop_assert!(tick.unswapped_fraction <= fraction_before);
            prop_assert_eq!(tick.liquidity_left, deposit - filled);
            left_before = tick.liquidity_left;
            fraction_before = tick.unswapped_fraction;
        }

        // every token0 the maker receives came from the takers
        let Ok(burn) = pool.burn_limit_order(&mut ledger, MAKER, Asset::Token1, 0, deposit) else {
            panic!("burn after fills");
        };
        prop_assert!(burn.amount0 <= filled && filled - burn.amount0 <= 1,
            "filled={} credited={}",
            filled, burn.amount0
        );
        prop_assert!(burn.amount1 <= deposit - filled && deposit - filled - burn.amount1 <= 1);
        prop_assert!(pool.limit_position(MAKER, Asset::Token1, 0).is_none());
        // rounding dust stays behind
        prop_assert!(ledger.balance_of(POOL, TOKEN1) <= U256::ONE);
    }
}

// ---------------------------------------------------------------------------
// 3. Range round trip
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_range_mint_burn_round_trip(
        a in spaced_tick_strategy(),
        b in spaced_tick_strategy(),
        liquidity in 1u128..=1_000_000_000_000_000_000_000,
    ) {
        prop_assume!(a != b);
        let (tick_lower, tick_upper) = (a.min(b), a.max(b));
        let mut pool = make_pool(0);
        let mut ledger = funded_ledger();

        let Ok((paid0, paid1)) = pool.mint(&mut ledger, MAKER, tick_lower, tick_upper, liquidity) else {
            panic!("mint");
        };
        let Ok((burned0, burned1)) = pool.burn(MAKER, tick_lower, tick_upper, liquidity) else {
            panic!("burn");
        };
        prop_assert!(burned0 <= paid0 && paid0 - burned0 <= U256::ONE);
        prop_assert!(burned1 <= paid1 && paid1 - burned1 <= U256::ONE);
        prop_assert!(pool.tick(tick_lower).is_none());
        prop_assert!(pool.tick(tick_upper).is_none());
        prop_assert_eq!(pool.liquidity(), 0);

        let Ok(_) = pool.collect(&mut ledger, MAKER, tick_lower, tick_upper, u128::MAX, u128::MAX) else {
            panic!("collect");
        };
        prop_assert!(pool.position(MAKER, tick_lower, tick_upper).is_none());
    }
}

// ---------------------------------------------------------------------------
// 4. Untouched limit round trip
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_untouched_limit_round_trip(
        tick in spaced_tick_strategy(),
        token0 in any::<bool>(),
        amount in liquidity_strategy(),
    ) {
        let asset = if token0 { Asset::Token0 } else { Asset::Token1 };
        prop_assume!(get_price_at_tick(tick).is_ok_and(|price| !price.is_zero()));
        let mut pool = make_pool(0);
        let mut ledger = funded_ledger();

        let Ok(_) = pool.mint_limit_order(&mut ledger, MAKER, asset, tick, amount) else {
            panic!("mint limit order");
        };
        let Ok(burn) = pool.burn_limit_order(&mut ledger, MAKER, asset, tick, amount) else {
            panic!("burn limit order");
        };
        let (returned, other) = match asset {
            Asset::Token0 => (burn.collected0, burn.collected1),
            Asset::Token1 => (burn.collected1, burn.collected0),
        };
        prop_assert_eq!(returned, amount);
        prop_assert_eq!(other, 0);
        prop_assert!(pool.limit_tick(asset, tick).is_none());
        prop_assert!(pool.limit_position(MAKER, asset, tick).is_none());
    }
}

// ---------------------------------------------------------------------------
// 5. Fills away from parity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_credit_never_exceeds_taker_input(
        compressed in -1_600i32..=1_600,
        token0 in any::<bool>(),
        deposit in 100_000u128..=1_000_000_000_000,
        fills in prop::collection::vec(1u128..=1_000, 1..16),
    ) {
        let tick = compressed * 60;
        let asset = if token0 { Asset::Token0 } else { Asset::Token1 };
        // a token1 order waits for token0 sellers and a token0 order for
        // token1 sellers, both reachable from the order's own tick
        let zero_for_one = asset == Asset::Token1;
        let limit = if zero_for_one {
            MIN_SQRT_RATIO + U256::ONE
        } else {
            MAX_SQRT_RATIO - U256::ONE
        };
        let mut pool = make_pool(tick);
        let mut ledger = funded_ledger();
        let Ok(_) = pool.mint_limit_order(&mut ledger, MAKER, asset, tick, deposit) else {
            panic!("mint limit order");
        };

        let mut filled: u128 = 0;
        let mut paid_in = U256::ZERO;
        for amount in fills {
            let Ok(result) = pool.swap(
                &mut ledger,
                TAKER,
                zero_for_one,
                -I256::from_raw(U256::from(amount)),
                limit,
            ) else {
                panic!("swap");
            };
            prop_assert!(result.settlements.is_empty());
            let (amount_in, amount_out) = if zero_for_one {
                (result.amount0, result.amount1)
            } else {
                (result.amount1, result.amount0)
            };
            prop_assert_eq!(amount_out, -I256::from_raw(U256::from(amount)));
            paid_in += amount_in.unsigned_abs();
            filled += amount;
        }

        let Ok(burn) = pool.burn_limit_order(&mut ledger, MAKER, asset, tick, deposit) else {
            panic!("burn after fills");
        };
        let (returned, credited, collected_other) = match asset {
            Asset::Token0 => (burn.amount0, burn.amount1, burn.collected1),
            Asset::Token1 => (burn.amount1, burn.amount0, burn.collected0),
        };
        prop_assert!(U256::from(credited) <= paid_in);
        prop_assert!(U256::from(collected_other) <= paid_in);
        prop_assert!(returned <= deposit - filled && deposit - filled - returned <= 1);
        prop_assert!(pool.limit_position(MAKER, asset, tick).is_none());
    }
}
