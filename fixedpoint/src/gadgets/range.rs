use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_traits::{One, Zero};

use super::{
    boolean, check_field, compose, constant, place_gates, range_lookups, CellLayout, Columns,
    Gadget, Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Expression, Gate},
    lookup::TableKind,
    Error, Precision, LOG_TARGET,
};

/// Flags of a range check: `lt` is set iff `x < lo`, `gt` iff `x > hi`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RangeOutput {
    pub lt: Cell,
    pub gt: Cell,
}

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    lt: Slot,
    gt: Slot,
    below: Vec<Slot>,
    above: Vec<Slot>,
}

/// Compares `x` against the constant interval `[lo, hi]`.
///
/// ```text
/// | x | lt | gt | d1_0..m | d2_0..m |
/// ```
///
/// ```text
/// d1 = lt (lo - x - 1) + (1 - lt)(x - lo)
/// d2 = gt (x - hi - 1) + (1 - gt)(hi - x)
/// lt * gt = 0
/// ```
///
/// The differences get one limb more than an input, since they span twice
/// the representable range.
#[derive(Debug, Clone)]
pub struct Range<F: PrimeField> {
    columns: Columns,
    lo: BigInt,
    hi: BigInt,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

impl<F: PrimeField> Range<F> {
    pub fn new(columns: Columns, precision: Precision, lo: BigInt, hi: BigInt) -> Self {
        check_field::<F>();
        assert!(lo <= hi, "empty range [{lo}, {hi}]");
        columns.require("range", Self::witness_columns(precision), 0);

        let limbs = precision.m() + 1;
        let row_layout = RowLayout::choose(Self::cells(precision), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            lt: slots.next(),
            gt: slots.next(),
            below: slots.take(limbs),
            above: slots.take(limbs),
        };
        Self {
            columns,
            lo,
            hi,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        RowLayout::min_width(Self::cells(precision))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        RowLayout::choose(Self::cells(precision), witness_amount).rows()
    }

    fn cells(precision: Precision) -> usize {
        3 + 2 * (precision.m() + 1)
    }

    pub fn bounds(&self) -> (&BigInt, &BigInt) {
        (&self.lo, &self.hi)
    }

    /// `(lt, gt)` flags of `x`.
    pub fn evaluate(&self, x: &BigInt) -> (bool, bool) {
        (x < &self.lo, x > &self.hi)
    }

    fn output(&self, start_row: usize) -> RangeOutput {
        RangeOutput {
            lt: self.columns.cell(self.layout.lt, start_row),
            gt: self.columns.cell(self.layout.gt, start_row),
        }
    }
}

fn flag(value: bool) -> BigInt {
    if value {
        BigInt::one()
    } else {
        BigInt::zero()
    }
}

impl<F: PrimeField> Gadget<F> for Range<F> {
    type Input = Cell;
    type Output = RangeOutput;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot| self.columns.query::<F>(slot, 0);
        let below = self.columns.queries::<F>(&l.below, 0);
        let above = self.columns.queries::<F>(&l.above, 0);

        let x = q(l.x);
        let lt = q(l.lt);
        let gt = q(l.gt);
        let lo = Expression::constant(constant::<F>(&self.lo));
        let hi = Expression::constant(constant::<F>(&self.hi));

        let constraints = vec![
            boolean(lt.clone()),
            boolean(gt.clone()),
            lt.clone() * gt.clone(),
            lt.clone() * (lo.clone() - x.clone() - F::ONE)
                + (Expression::one() - lt) * (x.clone() - lo)
                - compose(below.clone()),
            gt.clone() * (x.clone() - hi.clone() - F::ONE) + (Expression::one() - gt) * (hi - x)
                - compose(above.clone()),
        ];
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(range_lookups(&[below, above].concat()))),
        ]
    }

    fn lookup_tables(&self) -> Vec<TableKind> {
        vec![TableKind::Range16]
    }

    fn cell_layout(&self, start_row: usize) -> CellLayout {
        let l = &self.layout;
        let cell = |slot| vec![self.columns.cell(slot, start_row)];
        let mut layout = CellLayout::default();
        layout.push("x", cell(l.x));
        layout.push("lt", cell(l.lt));
        layout.push("gt", cell(l.gt));
        layout.push("below", self.columns.cells(&l.below, start_row));
        layout.push("above", self.columns.cells(&l.above, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> Result<RangeOutput, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "range", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(*input);
        let (lt, gt) = self.evaluate(&x);

        let below = if lt { &self.lo - &x - 1u32 } else { &x - &self.lo };
        let above = if gt { &x - &self.hi - 1u32 } else { &self.hi - &x };

        region.assign(l.x, &x);
        region.assign(l.lt, &flag(lt));
        region.assign(l.gt, &flag(gt));
        region.assign_unsigned(&l.below, &below)?;
        region.assign_unsigned(&l.above, &above)?;

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &Cell,
        start_row: usize,
    ) -> RangeOutput {
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(*input, self.columns.cell(self.layout.x, start_row));
        self.output(start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{setup_logger, Fr, Harness};

    fn flags(gadget: &Range<Fr>, width: usize, x: i64) -> (BigInt, BigInt) {
        let mut harness = Harness::<Fr>::new(width);
        let input = harness.input(x);
        let output = harness.synthesize(gadget, &input, 0).unwrap();
        assert_eq!(harness.is_satisfied(), Ok(()));
        (harness.value(output.lt), harness.value(output.gt))
    }

    #[test]
    fn flags_outside_bounds() {
        setup_logger();

        let precision = Precision::new(1, 1);
        let width = Range::<Fr>::witness_columns(precision);
        assert_eq!(width, 5);
        let gadget = Range::<Fr>::new(
            Columns::contiguous(width, 1, 1),
            precision,
            BigInt::from(-10),
            BigInt::from(10),
        );
        assert_eq!(gadget.rows(), 2);

        let (zero, one) = (BigInt::zero(), BigInt::one());
        assert_eq!(flags(&gadget, width, -11), (one.clone(), zero.clone()));
        assert_eq!(flags(&gadget, width, -10), (zero.clone(), zero.clone()));
        assert_eq!(flags(&gadget, width, 10), (zero.clone(), zero.clone()));
        assert_eq!(flags(&gadget, width, 11), (zero.clone(), one.clone()));
        assert_eq!(flags(&gadget, width, -(1 << 31)), (one, zero));
    }

    #[test]
    fn detects_tampering() {
        let precision = Precision::new(1, 1);
        let mut harness = Harness::<Fr>::new(9);
        let gadget = Range::<Fr>::new(
            harness.columns(),
            precision,
            BigInt::from(0),
            BigInt::from(65536),
        );
        let input = harness.input(70000);
        let output = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.value(output.gt), BigInt::one());

        harness.assert_tamper_detected(output.gt);
        harness.assert_tamper_detected(output.lt);
        harness.assert_tamper_detected(gadget.cell_layout(0).cell("x").unwrap());
    }

    #[test]
    #[should_panic]
    fn empty_range() {
        Range::<Fr>::new(
            Columns::contiguous(9, 1, 1),
            Precision::new(1, 1),
            BigInt::from(1),
            BigInt::from(0),
        );
    }
}
