use crate::error::MathError;
use alloy_primitives::U256;

const U256_ONE: U256 = U256::ONE;
const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

#[inline(always)]
#[cold]
fn cold_path() {}

/// Branch hint for the common path; stable replacement for the
/// `core::intrinsics` hint.
#[inline(always)]
pub(crate) fn likely(b: bool) -> bool {
    if !b {
        cold_path();
    }
    b
}

/// Branch hint for error and edge paths.
#[inline(always)]
pub(crate) fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}

/// Computes `a * b / denominator` with a 512-bit intermediate product,
/// rounding down. Fails on division by zero or when the quotient does
/// not fit in 256 bits.
///
/// Every price, amount and fee-growth computation in the pool funnels
/// through this function.
#[inline(always)]
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if unlikely(denominator.is_zero()) {
        return Err(MathError::DivisionByZero);
    }

    // [prod1 prod0] = a * b as a 512-bit number
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);

    let (mut prod1, borrow1) = mm.overflowing_sub(prod0);
    if borrow1 {
        prod1 = prod1.wrapping_sub(U256_ONE);
    }

    if likely(prod1.is_zero()) {
        return Ok(prod0.wrapping_div(denominator));
    }

    if unlikely(denominator <= prod1) {
        return Err(MathError::Overflow);
    }

    let remainder = a.mul_mod(b, denominator);
    let (prod0_new, borrow2) = prod0.overflowing_sub(remainder);
    prod0 = prod0_new;
    if borrow2 {
        prod1 = prod1.wrapping_sub(U256_ONE);
    }

    // factor powers of two out of the denominator
    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);

    let twos_adj = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256_ONE);
    prod0 |= prod1.wrapping_mul(twos_adj);

    // modular inverse of the odd denominator mod 2^256
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;

    macro_rules! newton_iteration {
        () => {
            inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)))
        };
    }

    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();
    newton_iteration!();

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], but rounds up on a non-zero remainder.
#[inline(always)]
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator) > U256::ZERO {
        if result == U256::MAX {
            return Err(MathError::Overflow);
        }
        return Ok(result + U256_ONE);
    }
    Ok(result)
}

/// `mul_div` with the rounding direction chosen at the call site.
#[inline(always)]
pub fn mul_div_round(
    a: U256,
    b: U256,
    denominator: U256,
    round_up: bool,
) -> Result<U256, MathError> {
    if round_up {
        mul_div_rounding_up(a, b, denominator)
    } else {
        mul_div(a, b, denominator)
    }
}

/// Divides `a` by `b`, rounding up when there is a remainder.
#[inline(always)]
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if unlikely(b.is_zero()) {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256_ONE)
    }
}

/// Narrows a `U256` into `u128`, failing if any upper bit is set.
#[inline(always)]
pub fn to_u128(x: U256) -> Result<u128, MathError> {
    let l = x.as_limbs();
    if l[2] != 0 || l[3] != 0 {
        return Err(MathError::Overflow);
    }
    Ok(l[0] as u128 | (l[1] as u128) << 64)
}
