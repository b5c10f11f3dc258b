use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::utils::from_bigint;

/// Key of `e^0` in the integer-part tables.
pub const EXP_KEY_OFFSET: i64 = 23;

/// Integer exponents `-23..=22` cover every input whose result fits into
/// four limbs or rounds to a non-zero value.
pub const EXP_INTEGER_KEYS: usize = 46;

/// `(k, e^(k - 23) * 2^(16 * (m2 + 1)))`.
pub(super) fn integer_part<F: PrimeField>(m2: i32) -> Vec<Vec<F>> {
    let scale = 2f64.powi(16 * (m2 + 1));
    let keys = (0..EXP_INTEGER_KEYS as u64).map(F::from).collect();
    let values = (0..EXP_INTEGER_KEYS as i64)
        .map(|key| scaled(((key - EXP_KEY_OFFSET) as f64).exp() * scale))
        .collect();
    vec![keys, values]
}

/// `(k, e^(k / 2^16) * 2^(16 * m2))` for every 16-bit `k`.
pub(super) fn fractional_part<F: PrimeField>(m2: i32) -> Vec<Vec<F>> {
    let scale = 2f64.powi(16 * m2);
    let keys = (0..1u64 << 16).map(F::from).collect();
    let values = (0..1u64 << 16)
        .map(|key| scaled((key as f64 / 65536.0).exp() * scale))
        .collect();
    vec![keys, values]
}

fn scaled<F: PrimeField>(value: f64) -> F {
    from_bigint(&BigInt::from_f64(value.round()).unwrap_or_default())
}
