//! Integer helpers for witness generation.
//!
//! Witnesses are computed over [`BigInt`] and only converted into the field
//! when written to the trace, so that intermediate products never wrap.

use ark_ff::PrimeField;
use num_bigint::{BigInt, BigUint};
use num_integer::{Integer, Roots};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::Error;

/// Width of a single limb.
pub const LIMB_BITS: usize = 16;

/// Interprets a field element as a signed integer in `[-(p-1)/2, (p-1)/2]`.
pub fn to_bigint<F: PrimeField>(value: F) -> BigInt {
    let unsigned: BigUint = value.into();
    let half: BigUint = F::MODULUS_MINUS_ONE_DIV_TWO.into();
    if unsigned > half {
        let modulus: BigUint = F::MODULUS.into();
        BigInt::from(unsigned) - BigInt::from(modulus)
    } else {
        BigInt::from(unsigned)
    }
}

pub fn from_bigint<F: PrimeField>(value: &BigInt) -> F {
    let magnitude = F::from(value.magnitude().clone());
    if value.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Returns the sign (`true` if negative) and little-endian 16-bit limbs of
/// `|value|`, padded to a whole number of 64-bit words.
pub fn decompose(value: &BigInt) -> (bool, Vec<u16>) {
    let mut limbs: Vec<u16> = value
        .magnitude()
        .to_u64_digits()
        .into_iter()
        .flat_map(|word| (0..4).map(move |i| (word >> (LIMB_BITS * i)) as u16))
        .collect();
    if limbs.is_empty() {
        limbs.resize(4, 0);
    }
    (value.is_negative(), limbs)
}

/// Same as [`decompose`], but with exactly `limbs` limbs.
pub fn decompose_into(value: &BigInt, limbs: usize) -> Result<(bool, Vec<u16>), Error> {
    let (negative, mut digits) = decompose(value);
    if digits.len() > limbs {
        if digits[limbs..].iter().any(|&digit| digit != 0) {
            return Err(Error::DecompositionOverflow { limbs });
        }
        digits.truncate(limbs);
    }
    digits.resize(limbs, 0);
    Ok((negative, digits))
}

/// Limbs of a value that must be non-negative.
pub fn decompose_unsigned(value: &BigInt, limbs: usize) -> Result<Vec<u16>, Error> {
    if value.is_negative() {
        return Err(Error::NegativeValue);
    }
    decompose_into(value, limbs).map(|(_, digits)| digits)
}

pub fn compose(limbs: &[u16]) -> BigInt {
    limbs
        .iter()
        .rev()
        .fold(BigInt::zero(), |acc, &limb| (acc << LIMB_BITS) + limb)
}

/// Rounding division: `q = round(x / y)` with ties towards +inf, and
/// `r = x + floor(y / 2) - q * y`, so that `0 <= r < y`.
///
/// Equivalently `2x + y - b = 2qy + 2r`, where `b` is the parity of `y`.
pub fn round_div_mod(x: &BigInt, y: &BigInt) -> Result<(BigInt, BigInt), Error> {
    if !y.is_positive() {
        return Err(Error::NonPositiveDivisor);
    }
    let shifted = x + (y >> 1u32);
    let (q, r) = shifted.div_mod_floor(y);
    Ok((q, r))
}

pub fn round_div(x: &BigInt, y: &BigInt) -> Result<BigInt, Error> {
    round_div_mod(x, y).map(|(q, _)| q)
}

/// Lowest bit of `value`.
pub fn parity(value: &BigInt) -> BigInt {
    if value.is_odd() {
        BigInt::one()
    } else {
        BigInt::zero()
    }
}

/// `-1` for negative values, `1` otherwise.
pub fn sign(value: &BigInt) -> BigInt {
    if value.is_negative() {
        -BigInt::one()
    } else {
        BigInt::one()
    }
}

pub fn pow2(bits: usize) -> BigInt {
    BigInt::one() << bits
}

pub fn isqrt(value: &BigInt) -> Result<BigInt, Error> {
    if value.is_negative() {
        return Err(Error::NegativeValue);
    }
    Ok(value.sqrt())
}

/// Index of a lookup-table row, if `value` is a small non-negative integer.
pub fn to_index(value: &BigInt) -> Option<usize> {
    if value.is_negative() {
        return None;
    }
    value.to_usize()
}
