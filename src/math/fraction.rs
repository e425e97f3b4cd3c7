//! High-precision fraction in `[0, 1]` tracking how much of a limit tick is
//! still unswapped.
//!
//! The value is stored as a normalised binary float,
//! `mantissa * 2^-(255 + exponent)`, where the 256-bit mantissa has its top
//! bit set (or is zero for the fully consumed state). Every operation is
//! evaluated on a 512-bit intermediate and rounded exactly once in the
//! direction the caller asks for, so each result is within `2^-255`
//! relative error of the exact value. Because the exponent is unbounded in
//! practice, repeated partial fills shrink the value without ever
//! underflowing to zero the way a fixed-point fraction would.

use crate::error::MathError;
use alloy_primitives::U256;
use alloy_primitives::aliases::U512;
use std::cmp::Ordering;

const TOP_BIT: usize = 255;

#[inline(always)]
fn widen(x: U256) -> U512 {
    let l = x.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

#[inline(always)]
fn narrow(x: U512) -> Result<U256, MathError> {
    let l = x.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return Err(MathError::Overflow);
    }
    Ok(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

#[inline(always)]
fn narrow_u128(x: U512) -> Result<u128, MathError> {
    let l = x.as_limbs();
    if l[2..].iter().any(|&limb| limb != 0) {
        return Err(MathError::Overflow);
    }
    Ok(l[0] as u128 | (l[1] as u128) << 64)
}

/// `x / 2^shift`, rounded as requested.
#[inline(always)]
fn shr_round(x: U512, shift: usize, round_up: bool) -> U512 {
    if shift >= 512 {
        return if round_up && !x.is_zero() {
            U512::from(1u8)
        } else {
            U512::ZERO
        };
    }
    let q = x >> shift;
    if round_up && (q << shift) != x {
        q + U512::from(1u8)
    } else {
        q
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnswappedFraction {
    mantissa: U256,
    exponent: u32,
}

impl UnswappedFraction {
    pub const ZERO: Self = Self {
        mantissa: U256::ZERO,
        exponent: 0,
    };

    pub const ONE: Self = Self {
        mantissa: U256::from_limbs([0, 0, 0, 1 << 63]),
        exponent: 0,
    };

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    #[inline]
    pub fn mantissa(&self) -> U256 {
        self.mantissa
    }

    #[inline]
    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    /// Builds `q * 2^-(255 + exponent)` in normalised form, clamped to one.
    fn normalize(q: U512, exponent: i64, round_up: bool) -> Result<Self, MathError> {
        if q.is_zero() {
            return Ok(Self::ZERO);
        }
        let bits = 512 - q.leading_zeros() as i64;
        let shift = bits - (TOP_BIT as i64 + 1);

        let (mantissa, shift) = if shift > 0 {
            let m = shr_round(q, shift as usize, round_up);
            // rounding up may carry into bit 256
            if m.bit(TOP_BIT + 1) {
                (m >> 1usize, shift + 1)
            } else {
                (m, shift)
            }
        } else {
            (q << (-shift) as usize, shift)
        };

        let exponent = exponent - shift;
        if exponent <= 0 {
            // the value is at least one
            return Ok(Self::ONE);
        }
        let exponent = u32::try_from(exponent).map_err(|_| MathError::Underflow)?;
        let mantissa = narrow(mantissa)?;
        Ok(Self { mantissa, exponent })
    }

    /// `self * numerator / denominator`, rounded down or up once.
    pub fn mul_ratio(
        &self,
        numerator: U256,
        denominator: U256,
        round_up: bool,
    ) -> Result<Self, MathError> {
        if denominator.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        if self.is_zero() || numerator.is_zero() {
            return Ok(Self::ZERO);
        }
        let product = widen(self.mantissa) * widen(numerator);
        let (mut q, r) = product.div_rem(widen(denominator));
        if round_up && !r.is_zero() {
            q += U512::from(1u8);
        }
        Self::normalize(q, self.exponent as i64, round_up)
    }

    /// `self - ceil(self * used / available)` evaluated as the single
    /// rounded-down product `self * (available - used) / available`.
    ///
    /// This is the fraction left after `used` of `available` liquidity has
    /// been filled. Filling everything yields zero.
    pub fn after_fill(&self, used: u128, available: u128) -> Result<Self, MathError> {
        if used > available {
            return Err(MathError::Underflow);
        }
        if used == available {
            return Ok(Self::ZERO);
        }
        self.mul_ratio(U256::from(available - used), U256::from(available), false)
    }

    /// `amount * self / reference`, the share of `amount` that is still
    /// unswapped for a position that captured `reference` at mint time.
    ///
    /// `self` must not exceed `reference`.
    pub fn apply_to(
        &self,
        amount: u128,
        reference: &Self,
        round_up: bool,
    ) -> Result<u128, MathError> {
        if reference.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        if self.is_zero() || amount == 0 {
            return Ok(0);
        }
        if self > reference {
            return Err(MathError::Overflow);
        }
        // self <= reference implies self.exponent >= reference.exponent
        let shift = (self.exponent - reference.exponent) as usize;

        let product = widen(U256::from(amount)) * widen(self.mantissa);
        let (mut q, r) = product.div_rem(widen(reference.mantissa));
        if round_up && !r.is_zero() {
            q += U512::from(1u8);
        }
        narrow_u128(shr_round(q, shift, round_up))
    }

    /// The exact fraction `numerator / denominator`, rounded down.
    pub fn from_ratio(numerator: U256, denominator: U256) -> Result<Self, MathError> {
        if numerator > denominator {
            return Err(MathError::Overflow);
        }
        Self::ONE.mul_ratio(numerator, denominator, false)
    }
}

impl Default for UnswappedFraction {
    fn default() -> Self {
        Self::ONE
    }
}

impl Ord for UnswappedFraction {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            // a larger exponent is a smaller value
            (false, false) => other
                .exponent
                .cmp(&self.exponent)
                .then(self.mantissa.cmp(&other.mantissa)),
        }
    }
}

impl PartialOrd for UnswappedFraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
