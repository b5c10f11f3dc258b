use ark_ff::PrimeField;

pub(super) fn range_16<F: PrimeField>() -> Vec<Vec<F>> {
    vec![(0..1u64 << 16).map(F::from).collect()]
}
