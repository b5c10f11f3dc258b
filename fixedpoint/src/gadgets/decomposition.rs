use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;

use super::{
    check_field, compose, place_gates, range_lookups, sign, CellLayout, Columns, Gadget, Region,
    RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Gate},
    lookup::TableKind,
    utils, Error, LOG_TARGET,
};

/// Sign and limb cells of a decomposed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompositionOutput {
    pub sign: Cell,
    pub limbs: Vec<Cell>,
}

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    sign: Slot,
    limbs: Vec<Slot>,
}

/// Proves `x = sign * sum(limb_i * 2^(16 i))` with `sign = ±1` and every limb
/// in `[0, 2^16)`.
///
/// ```text
/// | x | sign | limb_0 | ... | limb_{n-1} |
/// ```
///
/// Wraps onto a second row when fewer than `n + 2` columns are available.
#[derive(Debug, Clone)]
pub struct Decomposition<F: PrimeField> {
    columns: Columns,
    limbs: usize,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> Decomposition<F> {
    pub fn new(columns: Columns, limbs: usize) -> Self {
        check_field::<F>();
        assert!(limbs > 0, "decomposition needs at least one limb");
        columns.require("decomposition", Self::witness_columns(limbs), 0);

        let row_layout = RowLayout::choose(Self::cells(limbs), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            sign: slots.next(),
            limbs: slots.take(limbs),
        };
        Self {
            columns,
            limbs,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(limbs: usize) -> usize {
        RowLayout::min_width(Self::cells(limbs))
    }

    pub fn rows_amount(witness_amount: usize, limbs: usize) -> usize {
        RowLayout::choose(Self::cells(limbs), witness_amount).rows()
    }

    fn cells(limbs: usize) -> usize {
        limbs + 2
    }
}

impl<F: PrimeField> Gadget<F> for Decomposition<F> {
    type Input = Cell;
    type Output = DecompositionOutput;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let q = |slot| self.columns.query::<F>(slot, 0);
        let limbs = self.columns.queries::<F>(&self.layout.limbs, 0);

        let constraints = vec![
            q(self.layout.x) - q(self.layout.sign) * compose(limbs.clone()),
            sign(q(self.layout.sign)),
        ];
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(range_lookups(&limbs))),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        vec![TableKind::Range16]
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let mut layout = CellLayout::default();
        layout.push("x", vec![self.columns.cell(self.layout.x, start_row)]);
        layout.push("sign", vec![self.columns.cell(self.layout.sign, start_row)]);
        layout.push("limbs", self.columns.cells(&self.layout.limbs, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<DecompositionOutput, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "decomposition", start_row).entered();

        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let (negative, limbs) = utils::decompose_into(&x, self.limbs)?;

        region.assign(self.layout.x, &x);
        region.assign(self.layout.sign, &BigInt::from(if negative { -1 } else { 1 }));
        region.assign_limbs(&self.layout.limbs, &limbs);

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> DecompositionOutput {
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(*input, self.columns.cell(self.layout.x, start_row));
        self.output(start_row)
    }
}

impl<F: PrimeField> Decomposition<F> {
    fn output(&self, start_row: usize) -> DecompositionOutput {
        DecompositionOutput {
            sign: self.columns.cell(self.layout.sign, start_row),
            limbs: self.columns.cells(&self.layout.limbs, start_row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ark_std::{rand::Rng, test_rng};

    use crate::test_utils::{setup_logger, Fr, Harness};

    #[test]
    fn decomposes_signed_values() {
        setup_logger();

        let mut rng = test_rng();
        for _ in 0..20 {
            let value = BigInt::from(rng.gen::<i64>());
            let mut harness = Harness::<Fr>::new(6);
            let gadget = Decomposition::<Fr>::new(harness.columns(), 4);
            assert_eq!(gadget.rows(), 1);

            let input = harness.input(value.clone());
            let output = harness.synthesize(&gadget, &input, 0).unwrap();
            assert_eq!(harness.is_satisfied(), Ok(()));

            let limbs: Vec<u16> = output
                .limbs
                .iter()
                .map(|&cell| u16::try_from(harness.value(cell)).unwrap())
                .collect();
            let magnitude = utils::compose(&limbs);
            let signed = harness.value(output.sign) * magnitude;
            assert_eq!(signed, value);
        }
    }

    #[test]
    fn wraps_onto_second_row() {
        let mut harness = Harness::<Fr>::new(3);
        let gadget = Decomposition::<Fr>::new(harness.columns(), 4);
        assert_eq!(gadget.rows(), 2);
        assert_eq!(Decomposition::<Fr>::rows_amount(3, 4), 2);

        let input = harness.input(-0x1234_5678_9abci64);
        let output = harness.synthesize(&gadget, &input, 4).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));
        assert_eq!(output.limbs[3].row, 5);
        assert_eq!(harness.value(output.sign), BigInt::from(-1));

        let cells: Vec<Cell> = gadget.cell_layout(4).cells().collect();
        assert_eq!(cells.len(), 6);
    }

    #[test]
    fn rejects_overflow_and_tampering() {
        let mut harness = Harness::<Fr>::new(4);
        let gadget = Decomposition::<Fr>::new(harness.columns(), 2);
        let input = harness.input(1i64 << 32);
        assert_eq!(
            harness.synthesize(&gadget, &input, 0),
            Err(Error::DecompositionOverflow { limbs: 2 })
        );

        let mut harness = Harness::<Fr>::new(4);
        let input = harness.input(70000);
        let output = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));

        // moving 2^16 from the high limb into the low one breaks the range check.
        harness.set(output.limbs[0], &BigInt::from(70000));
        harness.set(output.limbs[1], &BigInt::from(0));
        assert!(harness.is_satisfied().is_err());
    }
}
