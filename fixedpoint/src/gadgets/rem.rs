use std::marker::PhantomData;

use ark_ff::PrimeField;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use super::{
    check_field, compose, constant, place_gates, range_lookups, sign, CellLayout, Columns, Gadget,
    Region, RowLayout, Slot, SlotAllocator,
};
use crate::{
    circuit::{Assignment, Cell, ConstraintSystem, Gate},
    lookup::TableKind,
    utils, Error, Precision, LOG_TARGET,
};

#[derive(Debug, Clone)]
struct Layout {
    x: Slot,
    y: Slot,
    z: Slot,
    quotient_sign: Slot,
    divisor_sign: Slot,
    quotient: Vec<Slot>,
    divisor: Vec<Slot>,
    remainder: Vec<Slot>,
    gap: Vec<Slot>,
}

/// Floored remainder `z = x * scaler mod y`, taking the sign of `y`.
///
/// ```text
/// | x | y | z | s_a | s_y | a_0..m-1 | Y_0..m-1 | Z_0..m-1 | G_0..m-1 |
/// ```
///
/// ```text
/// x * scaler = s_a * a * y + z
/// y = s_y * Y
/// z = s_y * Z
/// Y - Z - 1 = G
/// ```
///
/// so `0 <= |z| < |y|` and `z` shares the sign of `y`. The scaler lifts `x`
/// to the precision of `y` when the two are encoded differently.
#[derive(Debug, Clone)]
pub struct Rem<F: PrimeField> {
    columns: Columns,
    precision: Precision,
    scaler: BigInt,
    row_layout: RowLayout,
    layout: Layout,
    _field: PhantomData<F>,
}

#[derive(Debug, Clone)]
struct RemWitness {
    quotient_sign: BigInt,
    quotient: BigInt,
    divisor_sign: BigInt,
    divisor: BigInt,
    z: BigInt,
    remainder: BigInt,
    gap: BigInt,
}

impl<F: PrimeField> Rem<F> {
    pub fn new(columns: Columns, precision: Precision) -> Self {
        Self::with_scaler(columns, precision, BigInt::one())
    }

    pub fn with_scaler(columns: Columns, precision: Precision, scaler: BigInt) -> Self {
        Self::with_limbs(columns, precision, scaler, precision.m())
    }

    /// Remainder with `limbs` limbs per decomposed value, for dividends that
    /// outgrow `m` limbs once scaled.
    pub(crate) fn with_limbs(
        columns: Columns,
        precision: Precision,
        scaler: BigInt,
        limbs: usize,
    ) -> Self {
        check_field::<F>();
        columns.require("rem", RowLayout::min_width(Self::cells(limbs)), 0);

        let m = limbs;
        let row_layout = RowLayout::choose(Self::cells(limbs), columns.witness_amount());
        let mut slots = SlotAllocator::new(columns.witness_amount());
        let layout = Layout {
            x: slots.next(),
            y: slots.next(),
            z: slots.next(),
            quotient_sign: slots.next(),
            divisor_sign: slots.next(),
            quotient: slots.take(m),
            divisor: slots.take(m),
            remainder: slots.take(m),
            gap: slots.take(m),
        };
        Self {
            columns,
            precision,
            scaler,
            row_layout,
            layout,
            _field: PhantomData,
        }
    }

    pub fn witness_columns(precision: Precision) -> usize {
        RowLayout::min_width(Self::cells(precision.m()))
    }

    pub fn rows_amount(witness_amount: usize, precision: Precision) -> usize {
        RowLayout::choose(Self::cells(precision.m()), witness_amount).rows()
    }

    pub(crate) fn cells(limbs: usize) -> usize {
        5 + 4 * limbs
    }

    pub fn evaluate(&self, x: &BigInt, y: &BigInt) -> Result<BigInt, Error> {
        Ok(self.witness(x, y)?.z)
    }

    fn witness(&self, x: &BigInt, y: &BigInt) -> Result<RemWitness, Error> {
        if y.is_zero() {
            return Err(Error::DivisionByZero);
        }
        let (quotient, z) = (x * &self.scaler).div_mod_floor(y);
        let divisor = y.abs();
        let remainder = z.abs();
        let gap = &divisor - &remainder - 1u32;
        Ok(RemWitness {
            quotient_sign: utils::sign(&quotient),
            quotient: quotient.abs(),
            divisor_sign: utils::sign(y),
            divisor,
            z,
            remainder,
            gap,
        })
    }

    fn output(&self, start_row: usize) -> Cell {
        self.columns.cell(self.layout.z, start_row)
    }
}

impl<F: PrimeField> Gadget<F> for Rem<F> {
    type Input = (Cell, Cell);
    type Output = Cell;

    fn rows(&self) -> usize {
        self.row_layout.rows()
    }

    fn gates(&self) -> Vec<(usize, Gate<F>)> {
        let l = &self.layout;
        let q = |slot| self.columns.query::<F>(slot, 0);
        let quotient = self.columns.queries::<F>(&l.quotient, 0);
        let divisor = self.columns.queries::<F>(&l.divisor, 0);
        let remainder = self.columns.queries::<F>(&l.remainder, 0);
        let gap = self.columns.queries::<F>(&l.gap, 0);

        let constraints = vec![
            q(l.x) * constant::<F>(&self.scaler)
                - q(l.quotient_sign) * compose(quotient.clone()) * q(l.y)
                - q(l.z),
            q(l.y) - q(l.divisor_sign) * compose(divisor.clone()),
            q(l.z) - q(l.divisor_sign) * compose(remainder.clone()),
            compose(divisor.clone()) - compose(remainder.clone()) - F::ONE - compose(gap.clone()),
            sign(q(l.quotient_sign)),
            sign(q(l.divisor_sign)),
        ];
        let lookups = range_lookups(&[quotient, divisor, remainder, gap].concat());
        vec![
            (0, Gate::Polynomial(constraints)),
            (0, Gate::Lookup(lookups)),
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
        layout.push("y", cell(l.y));
        layout.push("z", cell(l.z));
        layout.push("quotient_sign", cell(l.quotient_sign));
        layout.push("divisor_sign", cell(l.divisor_sign));
        layout.push("quotient", self.columns.cells(&l.quotient, start_row));
        layout.push("divisor", self.columns.cells(&l.divisor, start_row));
        layout.push("remainder", self.columns.cells(&l.remainder, start_row));
        layout.push("gap", self.columns.cells(&l.gap, start_row));
        layout
    }

    fn assign(
        &self,
        assignment: &mut Assignment<F>,
        input: &(Cell, Cell),
        start_row: usize,
    ) -> Result<Cell, Error> {
        let _span = tracing::debug_span!(target: LOG_TARGET, "rem", start_row).entered();

        let l = &self.layout;
        let mut region = Region::new(assignment, &self.columns, start_row);
        let x = region.read(input.0);
        let y = region.read(input.1);
        let w = self.witness(&x, &y)?;

        region.assign(l.x, &x);
        region.assign(l.y, &y);
        region.assign(l.z, &w.z);
        region.assign(l.quotient_sign, &w.quotient_sign);
        region.assign(l.divisor_sign, &w.divisor_sign);
        region.assign_unsigned(&l.quotient, &w.quotient)?;
        region.assign_unsigned(&l.divisor, &w.divisor)?;
        region.assign_unsigned(&l.remainder, &w.remainder)?;
        region.assign_unsigned(&l.gap, &w.gap)?;

        Ok(self.output(start_row))
    }

    fn build_circuit(
        &self,
        cs: &mut ConstraintSystem<F>,
        assignment: &mut Assignment<F>,
        input: &(Cell, Cell),
        start_row: usize,
    ) -> Cell {
        place_gates(cs, assignment, self.gates(), start_row);
        cs.add_copy_constraint(input.0, self.columns.cell(self.layout.x, start_row));
        cs.add_copy_constraint(input.1, self.columns.cell(self.layout.y, start_row));
        self.output(start_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{eval_binary, setup_logger, Fr, Harness, PRECISIONS};

    const ONE: i64 = 1 << 16;

    #[test]
    fn floored_remainder() {
        setup_logger();

        let precision = Precision::new(1, 1);
        let width = Rem::<Fr>::witness_columns(precision);
        let gadget = Rem::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
        assert_eq!(width, 7);
        assert_eq!(gadget.rows(), 2);

        let rem = |x: i64, y: i64| eval_binary(&gadget, width, x, y);
        assert_eq!(rem(7 * ONE, 2 * ONE), Ok(BigInt::from(ONE)));
        assert_eq!(rem(-7 * ONE, 2 * ONE), Ok(BigInt::from(ONE)));
        assert_eq!(rem(7 * ONE, -2 * ONE), Ok(BigInt::from(-ONE)));
        assert_eq!(rem(-7 * ONE, -2 * ONE), Ok(BigInt::from(-ONE)));
        assert_eq!(rem(6 * ONE, 2 * ONE), Ok(BigInt::from(0)));
        assert_eq!(rem(ONE / 2, 3 * ONE), Ok(BigInt::from(ONE / 2)));
    }

    #[test]
    fn scaled_dividend() {
        // x at scale 2^16, y at scale 2^32.
        let precision = Precision::new(2, 1);
        let width = Rem::<Fr>::witness_columns(precision);
        let gadget =
            Rem::<Fr>::with_scaler(Columns::contiguous(width, 1, 1), precision, BigInt::from(ONE));
        let two_pi = BigInt::from(26986075409i64);

        let z = eval_binary(&gadget, width, 7 * ONE, two_pi.clone()).unwrap();
        let expected = BigInt::from(7i64 << 32) - &two_pi;
        assert_eq!(z, expected);
    }

    #[test]
    fn wide_limbs() {
        // x at scale 2^32 lifted to 2^64 leaves values of up to five limbs.
        let precision = Precision::new(2, 2);
        let two_pi = precision.trig_modulus().unwrap();
        let width = RowLayout::min_width(Rem::<Fr>::cells(5));
        assert_eq!(width, 13);
        let gadget = Rem::<Fr>::with_limbs(
            Columns::contiguous(width, 1, 1),
            precision,
            BigInt::one() << 32u32,
            5,
        );
        assert_eq!(gadget.rows(), 2);

        let x = precision.encode(-1000.0);
        let z = eval_binary(&gadget, width, x.clone(), two_pi.clone()).unwrap();
        assert!(!z.is_negative() && z < two_pi);
        assert!(((x << 32u32) - &z).is_multiple_of(&two_pi));
    }

    #[test]
    fn all_precisions() {
        for (m1, m2) in PRECISIONS {
            let precision = Precision::new(m1, m2);
            let width = Rem::<Fr>::witness_columns(precision);
            let gadget = Rem::<Fr>::new(Columns::contiguous(width, 1, 1), precision);
            let x = precision.encode(-5.25);
            let y = precision.encode(1.5);
            let z = eval_binary(&gadget, width, x, y).unwrap();
            assert_eq!(precision.decode(&z), 0.75);
        }
    }

    #[test]
    fn division_by_zero() {
        let precision = Precision::new(1, 1);
        let gadget = Rem::<Fr>::new(Columns::contiguous(7, 1, 1), precision);
        let mut harness = Harness::<Fr>::new(7);
        let input = (harness.input(ONE), harness.input(0));
        assert_eq!(
            harness.synthesize(&gadget, &input, 0),
            Err(Error::DivisionByZero)
        );
    }

    #[test]
    fn detects_tampering() {
        let precision = Precision::new(1, 1);
        let mut harness = Harness::<Fr>::new(13);
        let gadget = Rem::<Fr>::new(harness.columns(), precision);
        let input = (harness.input(-3 * ONE), harness.input(2 * ONE));
        let z = harness.synthesize(&gadget, &input, 0).unwrap();
        assert_eq!(harness.value(z), BigInt::from(ONE));

        harness.assert_tamper_detected(z);
        let layout = gadget.cell_layout(0);
        harness.assert_tamper_detected(layout.cell("quotient_sign").unwrap());
        harness.assert_tamper_detected(layout.get("gap").unwrap()[0]);
    }
}
