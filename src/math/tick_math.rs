use crate::error::{Error, StateError};
use crate::math::math_helpers::mul_div;
use crate::{Q96, U256_128};
use alloy_primitives::{I256, U256};

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = -MIN_TICK;

/// Limit orders are restricted to a narrower band so that the squared
/// price stays representable in Q96 and conversions at the tick price
/// keep at least 48 bits of precision.
pub const MIN_TICK_LO: i32 = -665000;
pub const MAX_TICK_LO: i32 = -MIN_TICK_LO;

pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([6743328256752651558, 17280870778742802505, 4294805859, 0]);

pub const SQRT_10001: I256 = I256::from_raw(U256::from_limbs([11745905768312294533, 13863, 0, 0]));
pub const TICK_LOW: I256 = I256::from_raw(U256::from_limbs([
    6552757943157144234,
    184476617836266586,
    0,
    0,
]));
pub const TICK_HIGH: I256 = I256::from_raw(U256::from_limbs([
    4998474450511881007,
    15793544031827761793,
    0,
    0,
]));

/// Returns the Q64.96 sqrt price at `tick`, or
/// `StateError::TickOutOfBounds` outside `[MIN_TICK, MAX_TICK]`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, StateError> {
    let abs_tick = tick.unsigned_abs();

    if abs_tick > MAX_TICK as u32 {
        return Err(StateError::TickOutOfBounds);
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0])
    } else {
        U256::from_limbs([0, 0, 1, 0])
    };

    macro_rules! apply_multiplier {
        ($bit:expr, $l0:expr, $l1:expr) => {
            if abs_tick & $bit != 0 {
                ratio = ratio.wrapping_mul(U256::from_limbs([$l0, $l1, 0, 0])) >> 128;
            }
        };
    }

    apply_multiplier!(2, 6459403834229662010, 18444899583751176498);
    apply_multiplier!(4, 17226890335427755468, 18443055278223354162);
    apply_multiplier!(8, 2032852871939366096, 18439367220385604838);
    apply_multiplier!(16, 14545316742740207172, 18431993317065449817);
    apply_multiplier!(32, 5129152022828963008, 18417254355718160513);
    apply_multiplier!(64, 4894419605888772193, 18387811781193591352);
    apply_multiplier!(128, 1280255884321894483, 18329067761203520168);
    apply_multiplier!(256, 15924666964335305636, 18212142134806087854);
    apply_multiplier!(512, 8010504389359918676, 17980523815641551639);
    apply_multiplier!(1024, 10668036004952895731, 17526086738831147013);
    apply_multiplier!(2048, 4878133418470705625, 16651378430235024244);
    apply_multiplier!(4096, 9537173718739605541, 15030750278693429944);
    apply_multiplier!(8192, 9972618978014552549, 12247334978882834399);
    apply_multiplier!(16384, 10428997489610666743, 8131365268884726200);
    apply_multiplier!(32768, 9305304367709015974, 3584323654723342297);
    apply_multiplier!(65536, 14301143598189091785, 696457651847595233);
    apply_multiplier!(131072, 7393154844743099908, 26294789957452057);
    apply_multiplier!(262144, 2209338891292245656, 37481735321082);
    apply_multiplier!(524288, 10518117631919034274, 76158723);

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the round trip through
    // get_tick_at_sqrt_ratio is consistent
    let lower_32_bits = ratio.as_limbs()[0] & 0xFFFF_FFFF;
    Ok((ratio >> 32) + U256::from((lower_32_bits != 0) as u64))
}

/// Execution price of a limit order resting at `tick`, as
/// `sqrt_price^2 / 2^96` (a Q96 price of token0 in token1), rounded down.
///
/// Fails with `StateError::PriceIsZero` when the tick is so low that the
/// price rounds to zero.
pub fn get_price_at_tick(tick: i32) -> Result<U256, Error> {
    let sqrt_price_x96 = get_sqrt_ratio_at_tick(tick)?;
    let price_x96 = mul_div(sqrt_price_x96, sqrt_price_x96, Q96)?;
    if price_x96.is_zero() {
        return Err(StateError::PriceIsZero.into());
    }
    Ok(price_x96)
}

/// Largest amount of gross liquidity a single tick may reference so that
/// the in-range total can never overflow `u128`.
pub fn tick_spacing_to_max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
    u128::MAX / num_ticks
}

const SHIFT_32: usize = 32;

const MASK_128: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);
const MASK_64: U256 = U256::from_limbs([u64::MAX, 0, 0, 0]);
const MASK_32: U256 = U256::from_limbs([u32::MAX as u64, 0, 0, 0]);
const MASK_16: U256 = U256::from_limbs([u16::MAX as u64, 0, 0, 0]);

#[inline(always)]
fn compute_msb(mut r: U256) -> u32 {
    let mut msb: u32 = 0;

    macro_rules! msb_step {
        ($mask:expr, $bits:expr) => {
            if r > $mask {
                msb |= $bits;
                r >>= $bits as usize;
            }
        };
    }

    msb_step!(MASK_128, 128u32);
    msb_step!(MASK_64, 64u32);
    msb_step!(MASK_32, 32u32);
    msb_step!(MASK_16, 16u32);
    msb_step!(U256::from(255u64), 8u32);
    msb_step!(U256::from(15u64), 4u32);
    msb_step!(U256::from(3u64), 2u32);
    msb_step!(U256::ONE, 1u32);

    msb
}

/// Bits 128..160 of a Q128.128 log value, i.e. its integer part as a tick.
#[inline(always)]
fn integer_part(x: I256) -> i32 {
    (x.into_raw().as_limbs()[2] as u32) as i32
}

/// Returns the greatest tick whose sqrt price is `<= sqrt_price_x96`.
///
/// Bounds are `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`; anything outside fails
/// with `StateError::SqrtPriceOutOfBounds`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, StateError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(StateError::SqrtPriceOutOfBounds);
    }

    let ratio = sqrt_price_x96 << SHIFT_32;
    let msb = compute_msb(ratio);

    let mut r = if msb >= 128 {
        ratio >> (msb - 127) as usize
    } else {
        ratio << (127 - msb) as usize
    };

    // two's complement (msb - 128) << 64, accumulated in raw bits
    let mut log_2_raw: U256 = U256::from(msb).wrapping_sub(U256_128) << 64usize;

    macro_rules! log2_step {
        ($shift:expr) => {{
            r = r.wrapping_mul(r) >> 127usize;
            let f = r >> 128usize;
            log_2_raw |= f << ($shift as usize);
            if !f.is_zero() {
                r >>= 1usize;
            }
        }};
    }

    log2_step!(63);
    log2_step!(62);
    log2_step!(61);
    log2_step!(60);
    log2_step!(59);
    log2_step!(58);
    log2_step!(57);
    log2_step!(56);
    log2_step!(55);
    log2_step!(54);
    log2_step!(53);
    log2_step!(52);
    log2_step!(51);
    log2_step!(50);

    let log_sqrt10001 = I256::from_raw(log_2_raw).wrapping_mul(SQRT_10001);
    let tick_low = integer_part(log_sqrt10001.wrapping_sub(TICK_LOW));
    let tick_high = integer_part(log_sqrt10001.wrapping_add(TICK_HIGH));

    Ok(if tick_low == tick_high {
        tick_low
    } else if get_sqrt_ratio_at_tick(tick_high)? <= sqrt_price_x96 {
        tick_high
    } else {
        tick_low
    })
}
