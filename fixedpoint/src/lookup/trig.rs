use ark_ff::PrimeField;
use num_bigint::BigInt;

use crate::utils::from_bigint;

/// `(k, sin, cos)` for every 16-bit `k`, where the angle of `k` is
/// `k * 2^-unit_bits` radians and values are scaled by `2^bits`.
pub(super) fn sin_cos<F: PrimeField>(bits: i32, unit_bits: i32) -> Vec<Vec<F>> {
    let weight = 2f64.powi(-unit_bits);
    let scale = 2f64.powi(bits);

    let mut keys = Vec::with_capacity(1 << 16);
    let mut sin = Vec::with_capacity(1 << 16);
    let mut cos = Vec::with_capacity(1 << 16);
    for key in 0..1u64 << 16 {
        let angle = key as f64 * weight;
        keys.push(F::from(key));
        sin.push(from_bigint(&BigInt::from((angle.sin() * scale).round() as i64)));
        cos.push(from_bigint(&BigInt::from((angle.cos() * scale).round() as i64)));
    }
    vec![keys, sin, cos]
}
