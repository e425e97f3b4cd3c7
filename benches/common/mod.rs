#![allow(dead_code)]

use criterion::{BatchSize, BenchmarkId, Criterion};
use hybrid_swap_math::math::bit_math::{least_significant_bit, most_significant_bit};
use hybrid_swap_math::math::fraction::UnswappedFraction;
use hybrid_swap_math::math::math_helpers::{mul_div, mul_div_rounding_up};
use hybrid_swap_math::math::sqrt_price_math::{
    get_amount_0_delta, get_amount_1_delta, get_next_sqrt_price_from_input,
};
use hybrid_swap_math::math::swap_math::{compute_limit_swap_step, compute_swap_step};
use hybrid_swap_math::math::tick_bitmap::{flip_tick, next_initialized_tick_within_one_word};
use hybrid_swap_math::math::tick_math::{
    MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, get_price_at_tick, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio,
};
use hybrid_swap_math::pool::Asset;
use hybrid_swap_math::pool::config::PoolConfig;
use hybrid_swap_math::pool::ledger::InMemoryLedger;
use hybrid_swap_math::{Address, FastMap, HybridPool, I256, Q96, U256};
use std::hint::black_box;

const POOL: Address = Address::new([0x10; 20]);
const TOKEN0: Address = Address::new([0x01; 20]);
const TOKEN1: Address = Address::new([0x02; 20]);
const MAKER: Address = Address::new([0xa1; 20]);
const TAKER: Address = Address::new([0xb0; 20]);

const TICKS: [i32; 5] = [MIN_TICK, -200_000, 0, 200_000, MAX_TICK];

// ---------------------------------------------------------------------------
// math
// ---------------------------------------------------------------------------

pub fn bench_tick_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_math");
    for tick in TICKS {
        group.bench_with_input(BenchmarkId::new("sqrt_ratio_at_tick", tick), &tick, |b, &t| {
            b.iter(|| get_sqrt_ratio_at_tick(black_box(t)))
        });
    }
    for tick in TICKS {
        let Ok(sqrt_price) = get_sqrt_ratio_at_tick(tick) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::new("tick_at_sqrt_ratio", tick),
            &sqrt_price,
            |b, &p| b.iter(|| get_tick_at_sqrt_ratio(black_box(p))),
        );
    }
    for tick in [-600_000, 0, 600_000] {
        group.bench_with_input(BenchmarkId::new("price_at_tick", tick), &tick, |b, &t| {
            b.iter(|| get_price_at_tick(black_box(t)))
        });
    }
    group.finish();
}

pub fn bench_sqrt_price_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqrt_price_math");
    let lower = get_sqrt_ratio_at_tick(-600).unwrap_or(Q96);
    let upper = get_sqrt_ratio_at_tick(600).unwrap_or(Q96);
    let liquidity: u128 = 1_000_000_000_000_000_000;

    group.bench_function("amount_0_delta", |b| {
        b.iter(|| get_amount_0_delta(black_box(lower), black_box(upper), black_box(liquidity as i128)))
    });
    group.bench_function("amount_1_delta", |b| {
        b.iter(|| get_amount_1_delta(black_box(lower), black_box(upper), black_box(-(liquidity as i128))))
    });
    for zero_for_one in [true, false] {
        group.bench_with_input(
            BenchmarkId::new("next_sqrt_price_from_input", zero_for_one),
            &zero_for_one,
            |b, &zfo| {
                b.iter(|| {
                    get_next_sqrt_price_from_input(
                        black_box(Q96),
                        black_box(liquidity),
                        black_box(U256::from(1_000_000_000_000u64)),
                        zfo,
                    )
                })
            },
        );
    }
    group.finish();
}

pub fn bench_swap_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap_math");
    let target = get_sqrt_ratio_at_tick(-600).unwrap_or(MIN_SQRT_RATIO);
    let liquidity: u128 = 1_000_000_000_000_000_000;
    let exact_in = I256::from_raw(U256::from(1_000_000_000_000_000u64));
    let exact_out = -exact_in;

    group.bench_function("range_step_exact_in", |b| {
        b.iter(|| compute_swap_step(black_box(Q96), black_box(target), liquidity, exact_in, 3000))
    });
    group.bench_function("range_step_exact_out", |b| {
        b.iter(|| compute_swap_step(black_box(Q96), black_box(target), liquidity, exact_out, 3000))
    });

    let price_x96 = get_price_at_tick(-23040).unwrap_or(Q96);
    let fraction = UnswappedFraction::ONE;
    group.bench_function("limit_step_partial", |b| {
        b.iter(|| {
            compute_limit_swap_step(
                black_box(price_x96),
                black_box(u128::MAX >> 8),
                &fraction,
                exact_in,
                3000,
                false,
            )
        })
    });
    group.bench_function("limit_step_crossed", |b| {
        b.iter(|| {
            compute_limit_swap_step(black_box(price_x96), black_box(3161), &fraction, exact_in, 3000, false)
        })
    });
    group.finish();
}

pub fn bench_math_helpers(c: &mut Criterion) {
    let mut group = c.benchmark_group("math_helpers");
    let a = U256::MAX >> 1;
    let b = U256::MAX >> 3;
    let d = U256::MAX >> 2;
    group.bench_function("mul_div_wide", |bench| {
        bench.iter(|| mul_div(black_box(a), black_box(b), black_box(d)))
    });
    group.bench_function("mul_div_narrow", |bench| {
        bench.iter(|| mul_div(black_box(Q96), black_box(U256::from(997u32)), black_box(U256::from(1000u32))))
    });
    group.bench_function("mul_div_rounding_up", |bench| {
        bench.iter(|| mul_div_rounding_up(black_box(a), black_box(b), black_box(d)))
    });
    group.finish();
}

pub fn bench_fraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("unswapped_fraction");
    let Ok(fraction) = UnswappedFraction::from_ratio(U256::from(3u8), U256::from(7u8)) else {
        return;
    };
    group.bench_function("after_fill", |b| {
        b.iter(|| fraction.after_fill(black_box(1_234), black_box(1_000_000)))
    });
    group.bench_function("apply_to", |b| {
        b.iter(|| fraction.apply_to(black_box(u128::MAX >> 1), &UnswappedFraction::ONE, false))
    });
    group.finish();
}

pub fn bench_tick_bitmap(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_bitmap");
    let mut bitmap: FastMap<i16, U256> = FastMap::default();
    for tick in (-60_000..=60_000).step_by(6_000) {
        let _ = flip_tick(&mut bitmap, tick, 60);
    }
    for lte in [true, false] {
        group.bench_with_input(BenchmarkId::new("next_initialized", lte), &lte, |b, &lte| {
            b.iter(|| next_initialized_tick_within_one_word(&bitmap, black_box(30), 60, lte))
        });
    }
    group.bench_function("flip_twice", |b| {
        b.iter_batched(
            || bitmap.clone(),
            |mut map| {
                let _ = flip_tick(&mut map, 120, 60);
                let _ = flip_tick(&mut map, 120, 60);
                map
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_bit_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_math");
    for x in [U256::from(1u8), Q96, U256::MAX] {
        group.bench_with_input(BenchmarkId::new("msb", x), &x, |b, &x| {
            b.iter(|| most_significant_bit(black_box(x)))
        });
        group.bench_with_input(BenchmarkId::new("lsb", x), &x, |b, &x| {
            b.iter(|| least_significant_bit(black_box(x)))
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// pool
// ---------------------------------------------------------------------------

fn funded_ledger() -> InMemoryLedger {
    let mut ledger = InMemoryLedger::new();
    for account in [MAKER, TAKER] {
        ledger.mint(account, TOKEN0, U256::from(u128::MAX));
        ledger.mint(account, TOKEN1, U256::from(u128::MAX));
    }
    ledger
}

/// A medium-tier pool at tick 0 with nested ranges and a ladder of limit
/// orders on both sides.
fn seeded_pool(ledger: &mut InMemoryLedger) -> Option<HybridPool> {
    let config = PoolConfig::medium(POOL, TOKEN0, TOKEN1).ok()?;
    let mut pool = HybridPool::new(config);
    pool.initialize(get_sqrt_ratio_at_tick(0).ok()?).ok()?;
    for width in 1..=10 {
        let tick = width * 600;
        pool.mint(ledger, MAKER, -tick, tick, 1_000_000_000_000_000).ok()?;
    }
    for step in 1..=10 {
        let tick = step * 120;
        pool.mint_limit_order(ledger, MAKER, Asset::Token0, tick, 1_000_000_000_000)
            .ok()?;
        pool.mint_limit_order(ledger, MAKER, Asset::Token1, -tick, 1_000_000_000_000)
            .ok()?;
    }
    Some(pool)
}

pub fn bench_pool_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_swap");
    let mut ledger = funded_ledger();
    let Some(pool) = seeded_pool(&mut ledger) else {
        return;
    };

    for amount in [1_000_000u64, 10_000_000_000_000, 1_000_000_000_000_000] {
        for zero_for_one in [true, false] {
            let limit = if zero_for_one {
                get_sqrt_ratio_at_tick(-6_000)
            } else {
                get_sqrt_ratio_at_tick(6_000)
            };
            let Ok(limit) = limit else {
                continue;
            };
            group.bench_with_input(
                BenchmarkId::new(if zero_for_one { "zero_for_one" } else { "one_for_zero" }, amount),
                &amount,
                |b, &amount| {
                    b.iter_batched(
                        || (pool.clone(), ledger.clone()),
                        |(mut pool, mut ledger)| {
                            let result = pool.swap(
                                &mut ledger,
                                TAKER,
                                zero_for_one,
                                I256::from_raw(U256::from(amount)),
                                limit,
                            );
                            black_box(result)
                        },
                        BatchSize::LargeInput,
                    )
                },
            );
        }
    }
    group.finish();
}

pub fn bench_limit_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("limit_orders");
    let mut ledger = funded_ledger();
    let Some(pool) = seeded_pool(&mut ledger) else {
        return;
    };

    group.bench_function("mint_burn_round_trip", |b| {
        b.iter_batched(
            || (pool.clone(), ledger.clone()),
            |(mut pool, mut ledger)| {
                let minted = pool.mint_limit_order(&mut ledger, TAKER, Asset::Token0, 1_800, 1_000_000);
                let burned = pool.burn_limit_order(&mut ledger, TAKER, Asset::Token0, 1_800, 1_000_000);
                black_box((minted, burned))
            },
            BatchSize::LargeInput,
        )
    });
    group.bench_function("top_up_partially_filled", |b| {
        b.iter_batched(
            || {
                let mut pool = pool.clone();
                let mut ledger = ledger.clone();
                let _ = pool.swap(
                    &mut ledger,
                    TAKER,
                    false,
                    I256::from_raw(U256::from(1_000_000u64)),
                    get_sqrt_ratio_at_tick(6_000).unwrap_or(Q96),
                );
                (pool, ledger)
            },
            |(mut pool, mut ledger)| {
                black_box(pool.mint_limit_order(&mut ledger, MAKER, Asset::Token0, 120, 1_000_000))
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}
